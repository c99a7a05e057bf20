mod command;
pub mod osascript;
pub mod playerctl;

pub use osascript::OsascriptQuery;
pub use playerctl::PlayerctlQuery;

use lyricwatch_core::{PlayerBackend, PlayerConfig, PlayerQuery};
use tracing::info;

/// Build the player query selected by the `[player]` config section.
#[must_use]
pub fn create_player(config: &PlayerConfig) -> Box<dyn PlayerQuery> {
    match config.backend {
        PlayerBackend::Playerctl => {
            info!("Using playerctl (player: {:?})", config.name);
            Box::new(PlayerctlQuery::new(&config.name))
        }
        PlayerBackend::Osascript => {
            info!("Using osascript (app: {})", config.app);
            Box::new(OsascriptQuery::new(config.app.clone()))
        }
    }
}
