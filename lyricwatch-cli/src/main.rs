mod process;
mod query;

use crate::process::PagerLauncher;
use clap::Parser;
use lyricwatch_core::{
    Coordinator, FsLyricsCache, LyricsCache, LyricsProvider, LyricsProviderType, LyricsResolver,
    LyricwatchConfig, Mode, TrackSource, WatchSettings,
};
use lyricwatch_lyrics_azlyrics::AzlyricsProvider;
use lyricwatch_lyrics_lrclib::LrclibProvider;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "lyricwatch", version)]
#[command(about = "Show the lyrics of the song playing on your media player")]
struct Args {
    /// Print to stdout instead of following the player in a pager
    #[arg(short = 'P', long)]
    no_pager: bool,

    /// Neither read nor write the lyrics cache
    #[arg(short = 'C', long)]
    no_cache: bool,

    /// Only ask the first configured provider
    #[arg(short = 'A', long, alias = "azlyrics-only")]
    primary_only: bool,

    /// Pipe the lyrics through lolcat
    #[arg(short = 'l', long)]
    lolcat: bool,

    /// lolcat rainbow spread [default: 3.0]
    #[arg(short = 'p', long)]
    spread: Option<f64>,

    /// lolcat rainbow frequency [default: 0.1]
    #[arg(short = 'F', long)]
    freq: Option<f64>,

    /// lolcat rainbow seed, 0 = random [default: 0]
    #[arg(short = 'S', long)]
    seed: Option<i64>,

    /// Config file [default: ~/.config/lyricwatch/config.toml]
    #[arg(long, env = "LYRICWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Song to look up: [of] NAME [by ARTIST]
    #[arg(value_name = "QUERY", trailing_var_arg = true)]
    query: Vec<String>,
}

impl Args {
    /// Fold command line flags into the loaded config
    fn apply(&self, config: &mut LyricwatchConfig) {
        if self.no_cache {
            config.lyrics.cache_enabled = false;
        }
        if self.primary_only {
            config.lyrics.providers.truncate(1);
        }
        if self.lolcat {
            config.colorizer.enabled = true;
        }
        if let Some(spread) = self.spread {
            config.colorizer.spread = spread;
        }
        if let Some(freq) = self.freq {
            config.colorizer.freq = freq;
        }
        if let Some(seed) = self.seed {
            config.colorizer.seed = seed;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(LyricwatchConfig::config_path);

    let query = match query::parse_query(&args.query) {
        Ok(query) => query,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mode = Mode::select(query, !args.no_pager);

    // Tracing goes up before the config so config problems are logged too
    init_tracing(
        check_file_logging_enabled(&config_path),
        console_log_level(&mode),
    );

    let mut config = match LyricwatchConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);

    info!("Starting in {:?} mode", mode);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(mode, &config)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the selected mode; `Ok(false)` means nothing could be shown.
async fn run(mode: Mode, config: &LyricwatchConfig) -> lyricwatch_core::Result<bool> {
    let coordinator = Coordinator::new(build_resolver(config), watch_settings(config));
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    match mode {
        Mode::OneShot(track) => {
            coordinator
                .run_one_shot(&track, &mut stdout, &mut stderr)
                .await
        }
        Mode::Once => {
            let mut source = TrackSource::new(lyricwatch_player::create_player(&config.player));
            coordinator.run_once(&mut source, &mut stdout, &mut stderr).await
        }
        Mode::Watch => {
            install_interrupt_hint();
            let source = TrackSource::new(lyricwatch_player::create_player(&config.player));
            let colorizer = config
                .colorizer
                .enabled
                .then(|| config.colorizer.clone());
            let launcher = Arc::new(PagerLauncher::new(config.pager.clone(), colorizer));
            coordinator.run_watch(source, launcher).await?;
            Ok(true)
        }
    }
}

fn watch_settings(config: &LyricwatchConfig) -> WatchSettings {
    WatchSettings {
        poll_interval: config.poll_interval(),
        ready_poll_interval: config.ready_poll_interval(),
        sink_capacity: config.pager.buffer_bytes,
    }
}

fn build_resolver(config: &LyricwatchConfig) -> LyricsResolver {
    let providers = create_providers(config);

    let provider_names: Vec<_> = providers.iter().map(|p| p.name()).collect();
    info!(
        "Initialized {} lyrics provider(s): {:?}",
        providers.len(),
        provider_names
    );

    let cache = config.lyrics.cache_enabled.then(|| {
        Arc::new(FsLyricsCache::open(config.lyrics.cache_dir())) as Arc<dyn LyricsCache>
    });

    LyricsResolver::new(providers, cache)
}

fn create_providers(config: &LyricwatchConfig) -> Vec<Box<dyn LyricsProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn LyricsProvider>> {
            match provider_type {
                LyricsProviderType::Azlyrics => {
                    info!("Initializing AZLyrics provider");
                    match AzlyricsProvider::new() {
                        Ok(provider) => Some(Box::new(provider)),
                        Err(e) => {
                            error!("Failed to create AZLyrics provider: {}", e);
                            None
                        }
                    }
                }
                LyricsProviderType::Lrclib => {
                    info!("Initializing LRCLIB provider");
                    match LrclibProvider::new() {
                        Ok(provider) => Some(Box::new(provider)),
                        Err(e) => {
                            error!("Failed to create LRCLIB provider: {}", e);
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

/// Ctrl+C belongs to the pager; only remind the user how to leave.
fn install_interrupt_hint() {
    if let Err(e) = ctrlc::set_handler(|| {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, " You can press 'q' to exit. ");
        let _ = stdout.flush();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Default stderr log level for a mode.
///
/// `None` in watch mode: the terminal belongs to the pager there, so
/// diagnostics only reach the log file.
fn console_log_level(mode: &Mode) -> Option<&'static str> {
    match mode {
        Mode::Watch => None,
        Mode::OneShot(_) | Mode::Once => Some("warn"),
    }
}

/// Initialize tracing with optional stderr output and optional file logging.
///
/// `RUST_LOG` overrides the level of whichever layers are enabled. The log
/// file gets `info` by default.
fn init_tracing(file_logging_enabled: bool, console_level: Option<&str>) {
    let fmt_layer = console_level.map(|level| {
        let console_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
    });

    if file_logging_enabled {
        let log_path = lyricwatch_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_filter = EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"));
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_filter(file_filter);

                tracing_subscriber::registry()
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry().with(fmt_layer).init();
}
