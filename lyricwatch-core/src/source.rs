//! Track source: polls the media player and detects track changes.

use crate::error::Result;
use crate::track::Track;
use async_trait::async_trait;
use tracing::{debug, info};

/// Synchronous query against a media player.
///
/// Implementations should return [`CoreError::PlayerUnreachable`](crate::CoreError::PlayerUnreachable)
/// when no player is running or nothing is playing.
#[async_trait]
pub trait PlayerQuery: Send + Sync {
    /// Returns a human-readable name for the player backend.
    fn name(&self) -> &'static str;

    /// Ask the player for the song it is playing right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the player cannot be reached or reports no track.
    async fn current_track(&self) -> Result<Track>;
}

/// Result of a successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPoll {
    /// Whether the track differs from the previous poll
    pub changed: bool,
    /// The track reported by the player
    pub track: Track,
}

/// Remembers the last known track of a single player.
pub struct TrackSource {
    query: Box<dyn PlayerQuery>,
    last: Option<Track>,
}

impl TrackSource {
    /// Create a new track source with no track recorded yet
    pub fn new(query: Box<dyn PlayerQuery>) -> Self {
        Self { query, last: None }
    }

    /// Name of the player backend
    #[must_use]
    pub fn player_name(&self) -> &'static str {
        self.query.name()
    }

    /// The last track seen, if any
    #[must_use]
    pub const fn last_track(&self) -> Option<&Track> {
        self.last.as_ref()
    }

    /// Poll the player once.
    ///
    /// # Errors
    ///
    /// Returns the player error unchanged; the recorded track is left as is.
    pub async fn poll(&mut self) -> Result<TrackPoll> {
        let track = self.query.current_track().await?;
        let changed = self.last.as_ref() != Some(&track);

        if changed {
            info!("Track changed: {}", track);
            self.last = Some(track.clone());
        } else {
            debug!("Still playing: {}", track);
        }

        Ok(TrackPoll { changed, track })
    }
}
