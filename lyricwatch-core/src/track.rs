//! Identity of the song currently playing.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// A song as reported by the player.
///
/// Two tracks are the same song iff both fields match exactly. No case folding
/// or trimming happens here; providers normalize for their own searches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Track {
    /// Track name
    pub name: String,
    /// Artist name(s)
    pub artist: String,
}

impl Track {
    /// Create a new track
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
        }
    }

    /// A track without a name can't be searched for or cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Free-text search query for providers.
    ///
    /// Drops bracketed decorations such as `(feat. X)` or `[Live]` and
    /// starred-out profanity from the name, and spells `P!nk` style artist
    /// names with an `i`.
    #[must_use]
    pub fn query(&self) -> String {
        let name = strip_profanity(&strip_brackets(&self.name));
        let artist = self.artist.replace('!', "i");
        format!("{} {}", name.trim(), artist.trim())
            .trim()
            .to_string()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.artist)
    }
}

/// `(feat. X)`, `[Live]`: an opening bracket up to the nearest closing one
#[allow(clippy::expect_used)]
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[|\().+?(\]|\))").expect("bracket pattern compiles"));

/// `fuck` and its censored spellings (`f**k`, `f*ck`)
#[allow(clippy::expect_used)]
static PROFANITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)f[uc*]{2}k").expect("profanity pattern compiles"));

fn strip_brackets(input: &str) -> String {
    collapse_whitespace(&BRACKETED.replace_all(input, ""))
}

fn strip_profanity(input: &str) -> String {
    collapse_whitespace(&PROFANITY.replace_all(input, ""))
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
