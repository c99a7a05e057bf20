//! Poll -> resolve -> stream orchestration.
//!
//! Three ways to run:
//! - [`Coordinator::run_one_shot`]: lyrics for a track named on the command line, to stdout.
//! - [`Coordinator::run_once`]: lyrics for whatever is playing right now, to stdout.
//! - [`Coordinator::run_watch`]: follow the player and stream every new track into the pager.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::pager::{ConsumerLauncher, PagerHandle, PagerSupervisor};
use crate::resolver::LyricsResolver;
use crate::sink::DEFAULT_SINK_CAPACITY;
use crate::source::{TrackPoll, TrackSource};
use crate::track::Track;

/// Timing knobs of watch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Pause between player polls
    pub poll_interval: Duration,
    /// Pause between checks for a ready pager
    pub ready_poll_interval: Duration,
    /// Buffer size of each stream sink
    pub sink_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            ready_poll_interval: Duration::from_millis(100),
            sink_capacity: DEFAULT_SINK_CAPACITY,
        }
    }
}

/// Top-level run mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Lyrics for a track named on the command line, printed once
    OneShot(Track),
    /// Lyrics for the current track, printed once
    Once,
    /// Follow the player through the pager
    Watch,
}

impl Mode {
    /// A query always means one-shot; otherwise the pager decides.
    #[must_use]
    pub fn select(query: Option<Track>, pager_enabled: bool) -> Self {
        match query {
            Some(track) => Self::OneShot(track),
            None if pager_enabled => Self::Watch,
            None => Self::Once,
        }
    }
}

/// What a single poll means for the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new track is playing
    Changed(Track),
    /// Same track as before
    Unchanged,
    /// The player could not be queried; `report` is set for the first
    /// failure of a streak only
    Unreachable { report: Option<String> },
}

/// Error-throttling state carried across polls.
#[derive(Debug, Default)]
pub struct PollState {
    has_failed_once: bool,
}

impl PollState {
    /// Turn a poll result into what the producer should do about it.
    pub fn observe(&mut self, poll: Result<TrackPoll>) -> PollOutcome {
        match poll {
            Ok(TrackPoll { changed, track }) => {
                if self.has_failed_once {
                    info!("Player reachable again");
                }
                self.has_failed_once = false;
                if changed {
                    PollOutcome::Changed(track)
                } else {
                    PollOutcome::Unchanged
                }
            }
            Err(e) => {
                debug!("Player poll failed: {}", e);
                let report = (!self.has_failed_once).then(|| e.to_string());
                self.has_failed_once = true;
                PollOutcome::Unreachable { report }
            }
        }
    }

    /// Whether the current failure streak has already been reported
    #[must_use]
    pub const fn has_failed_once(&self) -> bool {
        self.has_failed_once
    }
}

/// Hint shown under a player error
fn player_hint(player: &str) -> String {
    format!("Are you sure {player} is running and playing some music?")
}

fn not_found_message(track: &Track) -> String {
    CoreError::NoLyricsFound {
        name: track.name.clone(),
        artist: track.artist.clone(),
    }
    .to_string()
}

/// Background activity of watch mode: polls the player and feeds the pager.
pub struct Producer {
    source: TrackSource,
    resolver: Arc<LyricsResolver>,
    pager: PagerHandle,
    settings: WatchSettings,
    poll_state: PollState,
    started: bool,
    cancel_token: CancellationToken,
}

impl Producer {
    /// Create a new producer
    ///
    /// # Arguments
    /// * `source` - Track source to poll
    /// * `resolver` - Lyrics resolver
    /// * `pager` - Handle to the pager supervisor's state
    /// * `settings` - Poll and readiness intervals
    /// * `cancel_token` - Stops the producer when the session ends
    pub fn new(
        source: TrackSource,
        resolver: Arc<LyricsResolver>,
        pager: PagerHandle,
        settings: WatchSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            resolver,
            pager,
            settings,
            poll_state: PollState::default(),
            started: false,
            cancel_token,
        }
    }

    /// Start the producer in a background task
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the poll loop until cancelled
    pub async fn run(mut self) {
        info!(
            "Watching {} (poll interval: {:?})",
            self.source.player_name(),
            self.settings.poll_interval
        );

        let cancel_token = self.cancel_token.clone();
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = self.tick() => {}
            }
            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!("Producer shutting down");
    }

    /// One poll, and a full cycle if the track changed
    async fn tick(&mut self) {
        let poll = self.source.poll().await;
        match self.poll_state.observe(poll) {
            PollOutcome::Changed(track) => self.serve(&track).await,
            PollOutcome::Unchanged => {}
            PollOutcome::Unreachable { report: Some(message) } => {
                self.pager.report_error(&message).await;
                self.pager
                    .report_error(&player_hint(self.source.player_name()))
                    .await;
            }
            PollOutcome::Unreachable { report: None } => {}
        }
    }

    /// Replace whatever the pager shows with the lyrics of `track`.
    async fn serve(&mut self, track: &Track) {
        if self.started {
            self.pager.terminate();
        }

        let mut writer = self
            .pager
            .acquire_writer(self.settings.ready_poll_interval)
            .await;
        self.started = true;

        let body = match self.resolver.resolve(track).await {
            Some(lyrics) => format!("{lyrics}\n"),
            None => format!("Error: {}\n", not_found_message(track)),
        };

        if let Err(e) = writer.write(body.as_bytes()).await {
            // The pager went away mid-cycle; the next change starts over
            debug!("Stream for {} cut short: {}", track, e);
        }
        writer.close().await;
        info!("Finished streaming {}", track);
    }
}

/// Ties the track source, resolver and pager together.
pub struct Coordinator {
    resolver: Arc<LyricsResolver>,
    settings: WatchSettings,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(resolver: LyricsResolver, settings: WatchSettings) -> Self {
        Self {
            resolver: Arc::new(resolver),
            settings,
        }
    }

    /// Resolve `track` once and print the lyrics to `out`.
    ///
    /// Returns whether lyrics were found. The not-found message goes to `err`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` or `err` fails.
    pub async fn run_one_shot<W, E>(&self, track: &Track, out: &mut W, err: &mut E) -> Result<bool>
    where
        W: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        if let Some(lyrics) = self.resolver.resolve(track).await {
            out.write_all(format!("{lyrics}\n").as_bytes()).await?;
            out.flush().await?;
            Ok(true)
        } else {
            let line = format!("Error: {}\n", not_found_message(track));
            err.write_all(line.as_bytes()).await?;
            err.flush().await?;
            Ok(false)
        }
    }

    /// Ask the player once and print the lyrics of the current track to `out`.
    ///
    /// Returns whether lyrics were found.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` or `err` fails.
    pub async fn run_once<W, E>(
        &self,
        source: &mut TrackSource,
        out: &mut W,
        err: &mut E,
    ) -> Result<bool>
    where
        W: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        match source.poll().await {
            Ok(poll) => self.run_one_shot(&poll.track, out, err).await,
            Err(e) => {
                let message = format!(
                    "Error: {e}\nError: {}\n",
                    player_hint(source.player_name())
                );
                err.write_all(message.as_bytes()).await?;
                err.flush().await?;
                Ok(false)
            }
        }
    }

    /// Follow the player and stream lyrics into the pager until the user quits it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConsumerLaunch`] if the pager or colorizer cannot be started.
    pub async fn run_watch(
        &self,
        source: TrackSource,
        launcher: Arc<dyn ConsumerLauncher>,
    ) -> Result<()> {
        let supervisor = PagerSupervisor::new(launcher, self.settings.sink_capacity);
        let cancel_token = CancellationToken::new();

        let producer = Producer::new(
            source,
            Arc::clone(&self.resolver),
            supervisor.handle(),
            self.settings,
            cancel_token.clone(),
        )
        .start();

        let result = supervisor.run().await;

        cancel_token.cancel();
        if let Err(e) = producer.await {
            warn!("Producer task failed: {}", e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::{launch_error, Consumer, ConsumerExit};
    use crate::provider::{LyricsProvider, LyricsResult};
    use crate::sink::SinkReader;
    use crate::source::PlayerQuery;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::sync::watch;

    // ---- collaborators -------------------------------------------------

    struct StubProvider {
        lyrics: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LyricsProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, track: &Track) -> Result<LyricsResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.lyrics.map_or(LyricsResult::NotFound, |text| {
                LyricsResult::Found(format!("{text} ({})", track.name))
            }))
        }
    }

    fn resolver(lyrics: Option<&'static str>) -> (LyricsResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider {
            lyrics,
            calls: Arc::clone(&calls),
        };
        (LyricsResolver::new(vec![Box::new(provider)], None), calls)
    }

    /// Player whose replies are fed by the test; repeats the last reply.
    struct ScriptedPlayer {
        replies: Mutex<VecDeque<Option<Track>>>,
        current: Mutex<Option<Track>>,
    }

    impl ScriptedPlayer {
        fn new(replies: Vec<Option<Track>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                current: Mutex::new(None),
            })
        }

        fn play(&self, track: Option<Track>) {
            self.replies.lock().unwrap().push_back(track);
        }
    }

    struct PlayerRef(Arc<ScriptedPlayer>);

    #[async_trait]
    impl PlayerQuery for PlayerRef {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn current_track(&self) -> Result<Track> {
            let mut current = self.0.current.lock().unwrap();
            if let Some(next) = self.0.replies.lock().unwrap().pop_front() {
                *current = next;
            }
            current.clone().ok_or_else(|| CoreError::PlayerUnreachable {
                player: "scripted".to_string(),
                reason: "nothing playing".to_string(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Launched(usize),
        Killed(usize),
        Received(usize, String),
    }

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<Event>>,
    }

    impl Journal {
        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn received(&self) -> Vec<(usize, String)> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Received(cycle, text) => Some((cycle, text)),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
            self.events().iter().filter(|event| matches(event)).count()
        }
    }

    struct FakePager {
        cycle: usize,
        quit: watch::Receiver<bool>,
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl Consumer for FakePager {
        async fn wait(&mut self) -> Result<ConsumerExit> {
            let _ = self.quit.wait_for(|quit| *quit).await;
            Ok(ConsumerExit::Quit)
        }

        async fn kill(&mut self) {
            self.journal.push(Event::Killed(self.cycle));
        }
    }

    struct FakeLauncher {
        launches: AtomicUsize,
        quit: watch::Receiver<bool>,
        journal: Arc<Journal>,
        fail: bool,
    }

    #[async_trait]
    impl ConsumerLauncher for FakeLauncher {
        async fn launch(&self, mut reader: SinkReader) -> Result<Box<dyn Consumer>> {
            if self.fail {
                return Err(launch_error("lolcat", "No such file or directory"));
            }
            let cycle = self.launches.fetch_add(1, Ordering::SeqCst);
            self.journal.push(Event::Launched(cycle));

            let journal = Arc::clone(&self.journal);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if reader.read_to_end(&mut buf).await.is_ok() && !buf.is_empty() {
                    journal.push(Event::Received(
                        cycle,
                        String::from_utf8_lossy(&buf).into_owned(),
                    ));
                }
            });

            Ok(Box::new(FakePager {
                cycle,
                quit: self.quit.clone(),
                journal: Arc::clone(&self.journal),
            }))
        }
    }

    struct Session {
        player: Arc<ScriptedPlayer>,
        journal: Arc<Journal>,
        quit: watch::Sender<bool>,
        provider_calls: Arc<AtomicUsize>,
        run: tokio::task::JoinHandle<Result<()>>,
    }

    fn settings() -> WatchSettings {
        WatchSettings {
            poll_interval: Duration::from_millis(500),
            ready_poll_interval: Duration::from_millis(100),
            sink_capacity: 64,
        }
    }

    fn start_session(replies: Vec<Option<Track>>, lyrics: Option<&'static str>) -> Session {
        let player = ScriptedPlayer::new(replies);
        let journal = Arc::new(Journal::default());
        let (quit, quit_rx) = watch::channel(false);
        let (resolver, provider_calls) = resolver(lyrics);
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            quit: quit_rx,
            journal: Arc::clone(&journal),
            fail: false,
        });

        let coordinator = Coordinator::new(resolver, settings());
        let source = TrackSource::new(Box::new(PlayerRef(Arc::clone(&player))));
        let run = tokio::spawn(async move { coordinator.run_watch(source, launcher).await });

        Session {
            player,
            journal,
            quit,
            provider_calls,
            run,
        }
    }

    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn queen() -> Track {
        Track::new("Bohemian Rhapsody", "Queen")
    }

    // ---- mode ----------------------------------------------------------

    #[test]
    fn test_mode_select() {
        assert_eq!(Mode::select(Some(queen()), true), Mode::OneShot(queen()));
        assert_eq!(Mode::select(Some(queen()), false), Mode::OneShot(queen()));
        assert_eq!(Mode::select(None, true), Mode::Watch);
        assert_eq!(Mode::select(None, false), Mode::Once);
    }

    // ---- poll state ----------------------------------------------------

    fn unreachable() -> Result<TrackPoll> {
        Err(CoreError::PlayerUnreachable {
            player: "playerctl".to_string(),
            reason: "No players found".to_string(),
        })
    }

    #[test]
    fn test_unreachable_streak_reported_once() {
        let mut state = PollState::default();

        assert!(matches!(
            state.observe(unreachable()),
            PollOutcome::Unreachable { report: Some(_) }
        ));
        for _ in 0..5 {
            assert_eq!(
                state.observe(unreachable()),
                PollOutcome::Unreachable { report: None }
            );
        }
        assert!(state.has_failed_once());
    }

    #[test]
    fn test_recovery_resets_streak() {
        let mut state = PollState::default();
        let _ = state.observe(unreachable());

        let outcome = state.observe(Ok(TrackPoll {
            changed: true,
            track: queen(),
        }));
        assert_eq!(outcome, PollOutcome::Changed(queen()));
        assert!(!state.has_failed_once());

        assert!(matches!(
            state.observe(unreachable()),
            PollOutcome::Unreachable { report: Some(_) }
        ));
    }

    #[test]
    fn test_unchanged_poll() {
        let mut state = PollState::default();
        let outcome = state.observe(Ok(TrackPoll {
            changed: false,
            track: queen(),
        }));
        assert_eq!(outcome, PollOutcome::Unchanged);
    }

    // ---- one-shot ------------------------------------------------------

    struct Exact;

    #[async_trait]
    impl LyricsProvider for Exact {
        fn name(&self) -> &'static str {
            "exact"
        }

        async fn fetch(&self, _track: &Track) -> Result<LyricsResult> {
            Ok(LyricsResult::Found("Queen lyrics text".to_string()))
        }
    }

    #[tokio::test]
    async fn test_one_shot_prints_lyrics() {
        let coordinator = Coordinator::new(
            LyricsResolver::new(vec![Box::new(Exact)], None),
            WatchSettings::default(),
        );
        let mut out = Vec::new();
        let mut err = Vec::new();

        let found = coordinator
            .run_one_shot(&queen(), &mut out, &mut err)
            .await
            .unwrap();

        assert!(found);
        assert_eq!(out, b"Queen lyrics text\n");
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_one_shot_not_found() {
        let (resolver, _) = resolver(None);
        let coordinator = Coordinator::new(resolver, WatchSettings::default());
        let mut out = Vec::new();
        let mut err = Vec::new();

        let found = coordinator
            .run_one_shot(&queen(), &mut out, &mut err)
            .await
            .unwrap();

        assert!(!found);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Error: No lyrics found for Bohemian Rhapsody - Queen.\n"
        );
    }

    #[tokio::test]
    async fn test_once_uses_current_track() {
        let (resolver, _) = resolver(Some("words"));
        let coordinator = Coordinator::new(resolver, WatchSettings::default());
        let player = ScriptedPlayer::new(vec![Some(queen())]);
        let mut source = TrackSource::new(Box::new(PlayerRef(player)));
        let mut out = Vec::new();
        let mut err = Vec::new();

        assert!(coordinator.run_once(&mut source, &mut out, &mut err).await.unwrap());
        assert_eq!(out, b"words (Bohemian Rhapsody)\n");
    }

    #[tokio::test]
    async fn test_once_reports_unreachable_player() {
        let (resolver, calls) = resolver(Some("words"));
        let coordinator = Coordinator::new(resolver, WatchSettings::default());
        let mut source = TrackSource::new(Box::new(PlayerRef(ScriptedPlayer::new(vec![]))));
        let mut out = Vec::new();
        let mut err = Vec::new();

        assert!(!coordinator.run_once(&mut source, &mut out, &mut err).await.unwrap());
        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert!(err.starts_with("Error: Couldn't get information from scripted"));
        assert!(err.contains("Are you sure scripted is running"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    // ---- watch mode ----------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_watch_streams_first_track_and_quits() {
        let session = start_session(vec![Some(queen())], Some("words"));

        advance(Duration::from_secs(2)).await;

        assert_eq!(
            session.journal.received(),
            vec![(0, "words (Bohemian Rhapsody)\n".to_string())]
        );
        // Polling the same track again does not restart anything
        assert_eq!(session.provider_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.journal.count(|e| matches!(e, Event::Launched(_))), 1);

        session.quit.send(true).unwrap();
        session.run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_change_kills_old_pager_before_writing() {
        let session = start_session(vec![Some(queen())], Some("words"));
        advance(Duration::from_secs(1)).await;

        session.player.play(Some(Track::new("Under Pressure", "Queen")));
        advance(Duration::from_secs(2)).await;

        let events = session.journal.events();
        let killed = events
            .iter()
            .position(|e| *e == Event::Killed(0))
            .expect("first pager killed");
        let second = events
            .iter()
            .position(|e| matches!(e, Event::Received(1, _)))
            .expect("second pager received lyrics");
        assert!(killed < second);

        assert_eq!(
            session.journal.received(),
            vec![
                (0, "words (Bohemian Rhapsody)\n".to_string()),
                (1, "words (Under Pressure)\n".to_string()),
            ]
        );

        session.quit.send(true).unwrap();
        session.run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_track_means_no_write_and_no_restart() {
        let session = start_session(vec![None, None], Some("words"));

        advance(Duration::from_secs(2)).await;

        assert_eq!(session.provider_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.journal.count(|e| matches!(e, Event::Launched(_))), 1);
        assert_eq!(session.journal.count(|e| matches!(e, Event::Killed(_))), 0);

        session.quit.send(true).unwrap();
        session.run.await.unwrap().unwrap();
        advance(Duration::from_millis(10)).await;

        // Only the one error report made it into the untouched stream
        let received = session.journal.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].1.matches("Error: Couldn't get information").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_unreachable_player() {
        let session = start_session(vec![None, None, None], Some("words"));
        advance(Duration::from_secs(2)).await;

        session.player.play(Some(queen()));
        advance(Duration::from_secs(2)).await;

        assert_eq!(session.provider_calls.load(Ordering::SeqCst), 1);

        session.quit.send(true).unwrap();
        session.run.await.unwrap().unwrap();
        advance(Duration::from_millis(10)).await;

        let received = session.journal.received();
        assert_eq!(received.len(), 1);
        let text = &received[0].1;
        assert_eq!(text.matches("Error: Couldn't get information").count(), 1);
        assert!(text.ends_with("words (Bohemian Rhapsody)\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_message_goes_into_stream() {
        let session = start_session(vec![Some(queen())], None);
        advance(Duration::from_secs(1)).await;

        assert_eq!(
            session.journal.received(),
            vec![(
                0,
                "Error: No lyrics found for Bohemian Rhapsody - Queen.\n".to_string()
            )]
        );

        session.quit.send(true).unwrap();
        session.run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_ends_watch() {
        let (_quit, quit_rx) = watch::channel(false);
        let (resolver, calls) = resolver(Some("words"));
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            quit: quit_rx,
            journal: Arc::new(Journal::default()),
            fail: true,
        });
        let coordinator = Coordinator::new(resolver, settings());
        let source = TrackSource::new(Box::new(PlayerRef(ScriptedPlayer::new(vec![Some(
            queen(),
        )]))));

        let result = coordinator.run_watch(source, launcher).await;

        assert!(matches!(result, Err(CoreError::ConsumerLaunch { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
