//! MPRIS players through `playerctl`.

use crate::command;
use async_trait::async_trait;
use lyricwatch_core::{PlayerQuery, Result, Track};

const PROGRAM: &str = "playerctl";
const FORMAT: &str = "{{title}}\n{{artist}}";

/// Asks `playerctl` for the title and artist of the current track.
#[derive(Debug, Clone, Default)]
pub struct PlayerctlQuery {
    /// Player to query; `None` lets playerctl pick the active one
    player: Option<String>,
}

impl PlayerctlQuery {
    /// Create a query, optionally restricted to the player called `name`.
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            player: (!name.is_empty()).then(|| name.to_string()),
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if let Some(player) = &self.player {
            args.push("-p".to_string());
            args.push(player.clone());
        }
        args.extend(["metadata", "--format", FORMAT].map(String::from));
        args
    }
}

#[async_trait]
impl PlayerQuery for PlayerctlQuery {
    fn name(&self) -> &'static str {
        PROGRAM
    }

    async fn current_track(&self) -> Result<Track> {
        let stdout = command::run(PROGRAM, PROGRAM, &self.args()).await?;
        command::parse_track(PROGRAM, &stdout)
    }
}
