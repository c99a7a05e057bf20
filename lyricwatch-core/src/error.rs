use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    // Player errors
    #[error("Couldn't get information from {player}: {reason}")]
    PlayerUnreachable { player: String, reason: String },

    // Lyrics errors
    #[error("No lyrics found for {name} - {artist}.")]
    NoLyricsFound { name: String, artist: String },

    #[error("Lyrics provider {provider} failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    // Cache errors
    #[error("Invalid cache key: {key}")]
    CacheKey { key: String },

    // Streaming errors
    #[error("The pager stopped reading before the stream was finished")]
    SinkClosed,

    #[error("Can't execute {program}: {reason}")]
    ConsumerLaunch { program: String, reason: String },

    // Network errors
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network request failed: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the error only means the player had nothing to report.
    #[must_use]
    pub const fn is_player_unreachable(&self) -> bool {
        matches!(self, Self::PlayerUnreachable { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
