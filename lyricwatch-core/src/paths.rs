//! Path constants for configuration, log and cache files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "lyricwatch";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "lyricwatch.log";

/// The name of the lyrics cache directory under the home directory
pub const LYRICS_CACHE_DIR_NAME: &str = ".lyrics";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration directory path (~/.config/lyricwatch/)
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/lyricwatch/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the log file path (~/.config/lyricwatch/lyricwatch.log)
#[must_use]
pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE_NAME)
}

/// Get the default lyrics cache directory (~/.lyrics/)
#[must_use]
pub fn lyrics_cache_dir() -> PathBuf {
    home_dir().join(LYRICS_CACHE_DIR_NAME)
}
