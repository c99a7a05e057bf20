pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pager;
pub mod paths;
pub mod provider;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod track;

pub use cache::{FsLyricsCache, LyricsCache};
pub use config::{
    ColorizerConfig, LoggingConfig, LyricsConfig, LyricsProviderType, LyricwatchConfig,
    PagerConfig, PlayerBackend, PlayerConfig, CONFIG_TEMPLATE,
};
pub use coordinator::{Coordinator, Mode, PollOutcome, PollState, Producer, WatchSettings};
pub use error::{CoreError, Result};
pub use pager::{launch_error, Consumer, ConsumerExit, ConsumerLauncher, PagerHandle, PagerSupervisor};
pub use paths::{
    config_dir, config_path, log_file_path, lyrics_cache_dir, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME, LYRICS_CACHE_DIR_NAME,
};
pub use provider::{cache_key_for, LyricsProvider, LyricsResult};
pub use resolver::LyricsResolver;
pub use sink::{stream_sink, SinkReader, SinkWriter, DEFAULT_SINK_CAPACITY};
pub use source::{PlayerQuery, TrackPoll, TrackSource};
pub use track::Track;
