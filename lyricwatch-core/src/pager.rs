//! Pager supervision: keeps one consumer process alive per stream sink.
//!
//! The supervisor owns the consumer side. Each cycle it builds a fresh
//! [`stream_sink`], launches the consumer on the reader end and publishes the
//! writer end through a [`PagerHandle`]. The producer picks up the writer once
//! the cycle is running, and ends the cycle early with
//! [`PagerHandle::terminate`] when it has something new to show.
//!
//! A consumer that quits cleanly ends the session. Any other exit, including
//! being terminated, starts a new cycle.

use crate::error::{CoreError, Result};
use crate::sink::{stream_sink, SinkReader, SinkWriter};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// How a consumer run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// The user quit the pager
    Quit,
    /// The pager exited with a failure status (or a signal, as `None`)
    Abnormal(Option<i32>),
    /// The producer terminated the pager to start a new cycle
    Killed,
}

impl ConsumerExit {
    /// Only a clean quit ends the session
    #[must_use]
    pub const fn is_quit(self) -> bool {
        matches!(self, Self::Quit)
    }
}

/// A running consumer (pager) attached to a sink reader.
#[async_trait]
pub trait Consumer: Send {
    /// Wait for the consumer to exit on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit status cannot be collected.
    async fn wait(&mut self) -> Result<ConsumerExit>;

    /// Forcibly stop the consumer and anything spliced in front of it.
    async fn kill(&mut self);
}

/// Starts consumers. The process-spawning implementation lives in the binary.
#[async_trait]
pub trait ConsumerLauncher: Send + Sync {
    /// Launch a consumer reading from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConsumerLaunch`] if the consumer or its filter
    /// cannot be started. The supervisor treats this as fatal.
    async fn launch(&self, reader: SinkReader) -> Result<Box<dyn Consumer>>;
}

#[derive(Debug, Default)]
struct Cycle {
    id: u64,
    writer: Option<SinkWriter>,
    kill: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
struct PagerState {
    running: AtomicBool,
    cycles: AtomicU64,
    cycle: Mutex<Cycle>,
}

/// Shared view of the pager state for the producer side.
#[derive(Debug, Clone, Default)]
pub struct PagerHandle {
    state: Arc<PagerState>,
}

impl PagerHandle {
    fn cycle(&self) -> MutexGuard<'_, Cycle> {
        // The guarded data stays consistent even if a holder panicked
        self.state
            .cycle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether a consumer is attached to the current sink
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Number of sinks created so far
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.state.cycles.load(Ordering::SeqCst)
    }

    /// Poll every `interval` until a consumer is running.
    pub async fn wait_ready(&self, interval: Duration) {
        while !self.is_running() {
            tokio::time::sleep(interval).await;
        }
    }

    /// Take the writer of the current cycle, if it is running and nobody took it yet.
    #[must_use]
    pub fn take_writer(&self) -> Option<SinkWriter> {
        let mut cycle = self.cycle();
        if self.is_running() {
            cycle.writer.take()
        } else {
            None
        }
    }

    /// Wait for a running cycle and take its writer.
    pub async fn acquire_writer(&self, interval: Duration) -> SinkWriter {
        loop {
            self.wait_ready(interval).await;
            if let Some(writer) = self.take_writer() {
                return writer;
            }
            // The cycle ended or its writer is already out; wait for the next one
            tokio::time::sleep(interval).await;
        }
    }

    /// Kill the current consumer so the supervisor starts a new cycle.
    ///
    /// The old writer is dropped here, so nothing more reaches the old consumer.
    pub fn terminate(&self) {
        let mut cycle = self.cycle();
        self.state.running.store(false, Ordering::SeqCst);
        cycle.writer = None;
        if let Some(kill) = cycle.kill.take() {
            debug!("Terminating pager cycle {}", cycle.id);
            let _ = kill.send(());
        }
    }

    /// Show an error message to the user.
    ///
    /// Goes into the current stream while its writer is still unclaimed.
    /// Once the writer is claimed the pager owns the terminal and the message
    /// is only logged; with no pager on screen it goes to stderr.
    pub async fn report_error(&self, message: &str) {
        let line = format!("Error: {message}\n");

        let claimed = {
            let mut cycle = self.cycle();
            let writer = if self.is_running() {
                cycle.writer.take()
            } else {
                None
            };
            writer.map(|writer| (cycle.id, writer))
        };

        match claimed {
            Some((id, mut writer)) => {
                if let Err(e) = writer.write(line.as_bytes()).await {
                    debug!("Failed to show error in pager: {}", e);
                }
                let mut cycle = self.cycle();
                if cycle.id == id && self.is_running() && cycle.writer.is_none() {
                    cycle.writer = Some(writer);
                }
            }
            // The pager owns the terminal; only the log file sees this
            None if self.is_running() => info!("Not shown in pager: {}", message),
            None => eprint!("{line}"),
        }
    }

    fn begin_cycle(&self) -> u64 {
        self.state.cycles.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, id: u64, writer: SinkWriter, kill: oneshot::Sender<()>) {
        let mut cycle = self.cycle();
        *cycle = Cycle {
            id,
            writer: Some(writer),
            kill: Some(kill),
        };
        self.state.running.store(true, Ordering::SeqCst);
    }

    fn retire(&self) {
        let mut cycle = self.cycle();
        self.state.running.store(false, Ordering::SeqCst);
        cycle.writer = None;
        cycle.kill = None;
    }
}

/// Runs consumer cycles until the user quits.
pub struct PagerSupervisor {
    launcher: Arc<dyn ConsumerLauncher>,
    handle: PagerHandle,
    sink_capacity: usize,
}

impl PagerSupervisor {
    /// Create a new supervisor
    ///
    /// # Arguments
    /// * `launcher` - Starts a consumer for each cycle
    /// * `sink_capacity` - Buffer size of each cycle's stream sink
    pub fn new(launcher: Arc<dyn ConsumerLauncher>, sink_capacity: usize) -> Self {
        Self {
            launcher,
            handle: PagerHandle::default(),
            sink_capacity,
        }
    }

    /// Get a handle for the producer side
    #[must_use]
    pub fn handle(&self) -> PagerHandle {
        self.handle.clone()
    }

    /// Run cycles until the consumer quits cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConsumerLaunch`] if a consumer cannot be started.
    /// Launch failures are not retried.
    pub async fn run(&self) -> Result<()> {
        loop {
            let id = self.handle.begin_cycle();
            let (writer, reader) = stream_sink(self.sink_capacity);

            let mut consumer = match self.launcher.launch(reader).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    // Dropping the writer here leaves nothing for the producer to write to
                    self.handle.retire();
                    return Err(e);
                }
            };

            let (kill_tx, kill_rx) = oneshot::channel();
            self.handle.publish(id, writer, kill_tx);
            debug!("Pager cycle {} ready", id);

            let exit = tokio::select! {
                exit = consumer.wait() => exit.unwrap_or_else(|e| {
                    warn!("Failed to collect pager exit status: {}", e);
                    ConsumerExit::Abnormal(None)
                }),
                Ok(()) = kill_rx => {
                    consumer.kill().await;
                    ConsumerExit::Killed
                }
            };

            self.handle.retire();

            if exit.is_quit() {
                info!("Pager quit, ending session");
                return Ok(());
            }

            debug!("Pager cycle {} ended ({:?}), restarting", id, exit);
        }
    }
}

/// Launch error helper for [`ConsumerLauncher`] implementations
pub fn launch_error(program: &str, reason: impl ToString) -> CoreError {
    CoreError::ConsumerLaunch {
        program: program.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::AsyncReadExt;
    use tokio::sync::watch;

    /// Consumer that drains its reader and exits as scripted.
    struct ScriptedConsumer {
        exit: Option<ConsumerExit>,
        quit: watch::Receiver<bool>,
        killed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Consumer for ScriptedConsumer {
        async fn wait(&mut self) -> Result<ConsumerExit> {
            if let Some(exit) = self.exit {
                return Ok(exit);
            }
            let _ = self.quit.wait_for(|quit| *quit).await;
            Ok(ConsumerExit::Quit)
        }

        async fn kill(&mut self) {
            self.killed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedLauncher {
        exits: Mutex<VecDeque<ConsumerExit>>,
        launches: AtomicUsize,
        fail_on_launch: bool,
        quit: watch::Receiver<bool>,
        killed: Arc<AtomicUsize>,
        received: Arc<Mutex<Vec<u8>>>,
    }

    impl ScriptedLauncher {
        fn new(exits: Vec<ConsumerExit>, quit: watch::Receiver<bool>) -> Self {
            Self {
                exits: Mutex::new(exits.into()),
                launches: AtomicUsize::new(0),
                fail_on_launch: false,
                quit,
                killed: Arc::new(AtomicUsize::new(0)),
                received: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ConsumerLauncher for ScriptedLauncher {
        async fn launch(&self, mut reader: SinkReader) -> Result<Box<dyn Consumer>> {
            if self.fail_on_launch {
                return Err(launch_error("lolcat", "No such file or directory"));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);

            let received = Arc::clone(&self.received);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = reader.read_to_end(&mut buf).await;
                received.lock().unwrap().extend_from_slice(&buf);
            });

            Ok(Box::new(ScriptedConsumer {
                exit: self.exits.lock().unwrap().pop_front(),
                quit: self.quit.clone(),
                killed: Arc::clone(&self.killed),
            }))
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_clean_quit_ends_session() {
        let (_quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(vec![ConsumerExit::Quit], quit_rx));
        let supervisor = PagerSupervisor::new(launcher.clone(), 64);

        supervisor.run().await.unwrap();

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.handle().cycles(), 1);
        assert!(!supervisor.handle().is_running());
    }

    #[tokio::test]
    async fn test_abnormal_exit_restarts_exactly_once() {
        let (quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(
            vec![ConsumerExit::Abnormal(Some(2))],
            quit_rx,
        ));
        let supervisor = Arc::new(PagerSupervisor::new(launcher.clone(), 64));
        let handle = supervisor.handle();

        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        handle.wait_ready(Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(handle.cycles(), 2);
        assert!(handle.take_writer().is_some());

        quit_tx.send(true).unwrap();
        run.await.unwrap().unwrap();
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminate_kills_and_restarts() {
        let (quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(vec![], quit_rx));
        let supervisor = Arc::new(PagerSupervisor::new(launcher.clone(), 64));
        let handle = supervisor.handle();

        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        let mut writer = handle.acquire_writer(Duration::from_millis(1)).await;
        writer.write(b"first cycle\n").await.unwrap();
        writer.close().await;

        handle.terminate();
        assert!(!handle.is_running());

        let mut writer = handle.acquire_writer(Duration::from_millis(1)).await;
        assert_eq!(launcher.killed.load(Ordering::SeqCst), 1);
        assert_eq!(handle.cycles(), 2);
        writer.write(b"second cycle\n").await.unwrap();
        writer.close().await;

        quit_tx.send(true).unwrap();
        run.await.unwrap().unwrap();
        settle().await;

        assert_eq!(
            launcher.received.lock().unwrap().as_slice(),
            b"first cycle\nsecond cycle\n"
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let (_quit_tx, quit_rx) = watch::channel(false);
        let mut launcher = ScriptedLauncher::new(vec![], quit_rx);
        launcher.fail_on_launch = true;
        let supervisor = PagerSupervisor::new(Arc::new(launcher), 64);

        let result = supervisor.run().await;

        assert!(matches!(result, Err(CoreError::ConsumerLaunch { .. })));
        assert!(!supervisor.handle().is_running());
        assert!(supervisor.handle().take_writer().is_none());
    }

    #[tokio::test]
    async fn test_writer_is_handed_out_once_per_cycle() {
        let (quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(vec![], quit_rx));
        let supervisor = Arc::new(PagerSupervisor::new(launcher, 64));
        let handle = supervisor.handle();

        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        handle.wait_ready(Duration::from_millis(1)).await;
        assert!(handle.take_writer().is_some());
        assert!(handle.take_writer().is_none());

        quit_tx.send(true).unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_report_error_goes_into_open_stream() {
        let (quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(vec![], quit_rx));
        let supervisor = Arc::new(PagerSupervisor::new(launcher.clone(), 64));
        let handle = supervisor.handle();

        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        handle.wait_ready(Duration::from_millis(1)).await;
        handle.report_error("Couldn't get information from playerctl").await;

        // The writer is put back for the lyrics that follow
        let mut writer = handle.take_writer().unwrap();
        writer.write(b"lyrics\n").await.unwrap();
        writer.close().await;
        settle().await;

        quit_tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        assert_eq!(
            launcher.received.lock().unwrap().as_slice(),
            b"Error: Couldn't get information from playerctl\nlyrics\n"
        );
    }

    #[tokio::test]
    async fn test_report_error_skips_claimed_stream() {
        let (quit_tx, quit_rx) = watch::channel(false);
        let launcher = Arc::new(ScriptedLauncher::new(vec![], quit_rx));
        let supervisor = Arc::new(PagerSupervisor::new(launcher.clone(), 64));
        let handle = supervisor.handle();

        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        handle.wait_ready(Duration::from_millis(1)).await;
        let mut writer = handle.take_writer().unwrap();
        handle.report_error("Couldn't get information from playerctl").await;
        assert!(handle.take_writer().is_none());

        writer.write(b"lyrics\n").await.unwrap();
        writer.close().await;
        settle().await;

        quit_tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        assert_eq!(launcher.received.lock().unwrap().as_slice(), b"lyrics\n");
    }

    #[test]
    fn test_consumer_exit_is_quit() {
        assert!(ConsumerExit::Quit.is_quit());
        assert!(!ConsumerExit::Killed.is_quit());
        assert!(!ConsumerExit::Abnormal(Some(1)).is_quit());
        assert!(!ConsumerExit::Abnormal(None).is_quit());
    }
}
