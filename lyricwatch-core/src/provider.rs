use crate::error::CoreError;
use crate::track::Track;
use async_trait::async_trait;

/// Result from a lyrics provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsResult {
    /// Plain text lyrics
    Found(String),
    /// No lyrics found
    NotFound,
}

impl LyricsResult {
    /// Wrap provider text, treating blank text as no result.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self::NotFound
        } else {
            Self::Found(text)
        }
    }

    /// Check if lyrics were found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Get the lyrics text, if any
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Found(text) => Some(text),
            Self::NotFound => None,
        }
    }
}

/// Trait for lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Cache key for a track, or `None` when the track must not be cached.
    ///
    /// Only the first configured provider is asked, so every provider after it
    /// can keep the default.
    fn cache_key(&self, _track: &Track) -> Option<String> {
        None
    }

    /// Fetch lyrics for a track
    async fn fetch(&self, track: &Track) -> Result<LyricsResult, CoreError>;
}

/// Canonical cache key: `<artist>/<name>.txt` using lowercase ASCII
/// alphanumerics only.
///
/// Returns `None` when nothing of the name survives, since such a file name
/// would collide for every untitled track.
#[must_use]
pub fn cache_key_for(track: &Track) -> Option<String> {
    let name = slug(&track.name);
    if name.is_empty() {
        return None;
    }

    let artist = slug(&track.artist);
    let artist = if artist.is_empty() {
        "unknown".to_string()
    } else {
        artist
    };

    Some(format!("{artist}/{name}.txt"))
}

fn slug(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
