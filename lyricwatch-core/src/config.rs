use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricwatchConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub pager: PagerConfig,
    #[serde(default)]
    pub colorizer: ColorizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerBackend {
    /// MPRIS players through `playerctl`
    Playerctl,
    /// iTunes / Music through `osascript`
    Osascript,
}

impl Default for PlayerBackend {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Osascript
        } else {
            Self::Playerctl
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub backend: PlayerBackend,
    /// `playerctl -p` player name; empty means whichever player is active
    #[serde(default)]
    pub name: String,
    /// Application scripted by `osascript`
    #[serde(default = "default_player_app")]
    pub app: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_player_app() -> String {
    "Music".to_string()
}

const fn default_poll_interval() -> u64 {
    500
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: PlayerBackend::default(),
            name: String::new(),
            app: default_player_app(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Provider priority: providers are tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<LyricsProviderType>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Cache directory; empty means `~/.lyrics`
    #[serde(default)]
    pub cache_dir: String,
}

fn default_providers() -> Vec<LyricsProviderType> {
    vec![LyricsProviderType::Azlyrics, LyricsProviderType::Lrclib]
}

const fn default_true() -> bool {
    true
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            cache_enabled: true,
            cache_dir: String::new(),
        }
    }
}

impl LyricsConfig {
    /// Resolved cache directory
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache_dir.trim().is_empty() {
            crate::paths::lyrics_cache_dir()
        } else {
            PathBuf::from(&self.cache_dir)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsProviderType {
    Azlyrics,
    Lrclib,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerConfig {
    #[serde(default = "default_pager_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_ready_poll")]
    pub ready_poll_ms: u64,
    #[serde(default = "default_buffer_bytes")]
    pub buffer_bytes: usize,
}

fn default_pager_command() -> String {
    "less".to_string()
}

const fn default_ready_poll() -> u64 {
    100
}

const fn default_buffer_bytes() -> usize {
    crate::sink::DEFAULT_SINK_CAPACITY
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            command: default_pager_command(),
            args: vec![],
            ready_poll_ms: default_ready_poll(),
            buffer_bytes: default_buffer_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorizerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_colorizer_command")]
    pub command: String,
    #[serde(default = "default_spread")]
    pub spread: f64,
    #[serde(default = "default_freq")]
    pub freq: f64,
    /// 0 = random
    #[serde(default)]
    pub seed: i64,
}

fn default_colorizer_command() -> String {
    "lolcat".to_string()
}

const fn default_spread() -> f64 {
    3.0
}

const fn default_freq() -> f64 {
    0.1
}

impl Default for ColorizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_colorizer_command(),
            spread: default_spread(),
            freq: default_freq(),
            seed: 0,
        }
    }
}

impl ColorizerConfig {
    /// Arguments passed to the colorizer command
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            "--force".to_string(),
            "--spread".to_string(),
            format!("{:.2}", self.spread),
            "--freq".to_string(),
            format!("{:.2}", self.freq),
            "--seed".to_string(),
            self.seed.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to ~/.config/lyricwatch/lyricwatch.log
    #[serde(default)]
    pub enabled: bool,
}

impl LyricwatchConfig {
    /// Get the config file path (~/.config/lyricwatch/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load the config at `path`, writing a template there on first run.
    ///
    /// A missing file yields the defaults. Failing to write the template is
    /// only logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Err(e) = write_template(path) {
                warn!("Failed to write config template to {:?}: {}", path, e);
            } else {
                info!("Wrote config template to {:?}", path);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse and validate config file content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or fails validation.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but can't work.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(CoreError::ConfigInvalid {
                message: message.to_string(),
            })
        };

        if self.lyrics.providers.is_empty() {
            return invalid("lyrics.providers must list at least one provider");
        }
        if self.player.poll_interval_ms == 0 {
            return invalid("player.poll_interval_ms must be greater than 0");
        }
        if self.pager.ready_poll_ms == 0 {
            return invalid("pager.ready_poll_ms must be greater than 0");
        }
        if self.pager.buffer_bytes == 0 {
            return invalid("pager.buffer_bytes must be greater than 0");
        }
        if self.pager.command.trim().is_empty() {
            return invalid("pager.command must not be empty");
        }
        if self.colorizer.enabled && self.colorizer.command.trim().is_empty() {
            return invalid("colorizer.command must not be empty");
        }
        Ok(())
    }

    /// Interval between player polls
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.player.poll_interval_ms)
    }

    /// Interval between pager readiness checks
    #[must_use]
    pub const fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pager.ready_poll_ms)
    }
}

fn write_template(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, CONFIG_TEMPLATE)
}

pub const CONFIG_TEMPLATE: &str = r#"# lyricwatch configuration
# ~/.config/lyricwatch/config.toml

[player]
# "playerctl" (MPRIS, Linux) or "osascript" (Music / iTunes, macOS)
# backend = "playerctl"
# playerctl player name, empty = whichever player is active
name = ""
# Application asked by osascript ("Music", or "iTunes" on older systems)
app = "Music"
poll_interval_ms = 500

[lyrics]
# Provider priority: "azlyrics", "lrclib"
# Providers are tried in order; first successful result wins.
# The first provider decides the cache file name.
providers = ["azlyrics", "lrclib"]
cache_enabled = true
# Empty = ~/.lyrics
cache_dir = ""

[pager]
command = "less"
args = []
ready_poll_ms = 100
buffer_bytes = 8192

[colorizer]
# Pipe lyrics through lolcat before the pager (gem install lolcat)
enabled = false
command = "lolcat"
spread = 3.0
freq = 0.1
# 0 = random
seed = 0

[logging]
# Write logs to ~/.config/lyricwatch/lyricwatch.log
enabled = false
"#;
