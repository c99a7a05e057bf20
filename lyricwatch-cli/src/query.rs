//! `[of] NAME [by ARTIST]` song queries from the command line.

use lyricwatch_core::Track;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("You need to specify the name of the song.")]
    MissingName,
}

/// Parse the positional arguments into a track.
///
/// Returns `Ok(None)` when no words were given at all, which selects watch mode.
pub fn parse_query(words: &[String]) -> Result<Option<Track>, QueryError> {
    if words.is_empty() {
        return Ok(None);
    }

    let words = match words.split_first() {
        Some((first, rest)) if first.trim().eq_ignore_ascii_case("of") => rest,
        _ => words,
    };

    let mut name = Vec::new();
    let mut artist = Vec::new();
    let mut seen_by = false;

    for (index, word) in words.iter().enumerate() {
        let word = word.trim();
        if word.is_empty() {
            continue;
        }

        if seen_by {
            artist.push(word);
        } else if word.eq_ignore_ascii_case("by") || (index > 0 && word.eq_ignore_ascii_case("of"))
        {
            seen_by = true;
        } else {
            name.push(word);
        }
    }

    if name.is_empty() {
        return Err(QueryError::MissingName);
    }

    Ok(Some(Track::new(name.join(" "), artist.join(" "))))
}
