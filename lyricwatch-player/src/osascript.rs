//! Music / iTunes through `osascript`.

use crate::command;
use async_trait::async_trait;
use lyricwatch_core::{PlayerQuery, Result, Track};

const PROGRAM: &str = "osascript";

/// Asks a scriptable macOS music app for its current track.
#[derive(Debug, Clone)]
pub struct OsascriptQuery {
    app: String,
}

impl OsascriptQuery {
    /// Create a query against the application called `app` ("Music", or "iTunes" on older systems).
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    fn script(&self) -> String {
        let app = self.app.replace('"', "");
        format!(
            "tell application \"{app}\" to (get name of current track) & \"\\n\" & (get artist of current track)"
        )
    }
}

impl Default for OsascriptQuery {
    fn default() -> Self {
        Self::new("Music")
    }
}

#[async_trait]
impl PlayerQuery for OsascriptQuery {
    fn name(&self) -> &'static str {
        PROGRAM
    }

    async fn current_track(&self) -> Result<Track> {
        let args = ["-e".to_string(), self.script()];
        let stdout = command::run(PROGRAM, PROGRAM, &args).await?;
        command::parse_track(PROGRAM, &stdout)
    }
}
