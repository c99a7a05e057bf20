//! Pager processes: `less`, optionally behind a `lolcat` filter.

use async_trait::async_trait;
use lyricwatch_core::{
    launch_error, ColorizerConfig, Consumer, ConsumerExit, ConsumerLauncher, CoreError,
    PagerConfig, Result, SinkReader,
};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Starts the configured pager for each cycle.
#[derive(Debug, Clone)]
pub struct PagerLauncher {
    pager: PagerConfig,
    colorizer: Option<ColorizerConfig>,
}

impl PagerLauncher {
    /// Create a launcher; `colorizer` is spliced in front of the pager when given.
    pub const fn new(pager: PagerConfig, colorizer: Option<ColorizerConfig>) -> Self {
        Self { pager, colorizer }
    }

    fn spawn_colorizer(colorizer: &ColorizerConfig) -> Result<(Child, ChildStdin, Stdio)> {
        let mut child = Command::new(&colorizer.command)
            .args(colorizer.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| colorizer_error(&colorizer.command, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch_error(&colorizer.command, "stdin was not captured"))?;
        let stdout: Stdio = child
            .stdout
            .take()
            .ok_or_else(|| launch_error(&colorizer.command, "stdout was not captured"))?
            .try_into()
            .map_err(|e: std::io::Error| launch_error(&colorizer.command, e))?;

        Ok((child, stdin, stdout))
    }
}

/// `lolcat` is a gem; say how to get it.
fn colorizer_error(program: &str, error: std::io::Error) -> CoreError {
    if program == "lolcat" && error.kind() == std::io::ErrorKind::NotFound {
        launch_error(
            program,
            format!("{error}\nYou can install it via `gem install -V lolcat`."),
        )
    } else {
        launch_error(program, error)
    }
}

#[async_trait]
impl ConsumerLauncher for PagerLauncher {
    async fn launch(&self, reader: SinkReader) -> Result<Box<dyn Consumer>> {
        let colorizer = self
            .colorizer
            .as_ref()
            .map(Self::spawn_colorizer)
            .transpose()?;

        let (colorizer, pager_stdin, feed) = match colorizer {
            Some((child, feed, stdout)) => (Some(child), stdout, Some(feed)),
            None => (None, Stdio::piped(), None),
        };

        let mut pager = Command::new(&self.pager.command)
            .args(&self.pager.args)
            .stdin(pager_stdin)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| launch_error(&self.pager.command, e))?;

        let feed = match feed {
            Some(feed) => feed,
            None => pager
                .stdin
                .take()
                .ok_or_else(|| launch_error(&self.pager.command, "stdin was not captured"))?,
        };

        info!(
            "Started {}{}",
            self.pager.command,
            self.colorizer
                .as_ref()
                .map(|c| format!(" behind {}", c.command))
                .unwrap_or_default()
        );

        Ok(Box::new(PagerProcess {
            pager,
            colorizer,
            pump: Some(tokio::spawn(pump(reader, feed))),
        }))
    }
}

/// Copy the sink into the first process of the chain until either side ends.
async fn pump(mut reader: SinkReader, mut stdin: ChildStdin) {
    match tokio::io::copy(&mut reader, &mut stdin).await {
        Ok(bytes) => debug!("Pager input finished after {} bytes", bytes),
        Err(e) => debug!("Pager input cut short: {}", e),
    }
    let _ = stdin.shutdown().await;
}

/// A running pager chain.
struct PagerProcess {
    pager: Child,
    colorizer: Option<Child>,
    pump: Option<JoinHandle<()>>,
}

impl PagerProcess {
    /// Stop everything that is still feeding the pager.
    async fn tear_down(&mut self) {
        if let Some(pump) = self.pump.take() {
            // Dropping the reader lets a blocked producer see a closed sink
            pump.abort();
        }
        if let Some(mut colorizer) = self.colorizer.take() {
            let _ = colorizer.start_kill();
            let _ = colorizer.wait().await;
        }
    }
}

fn exit_of(status: ExitStatus) -> ConsumerExit {
    if status.success() {
        ConsumerExit::Quit
    } else {
        ConsumerExit::Abnormal(status.code())
    }
}

#[async_trait]
impl Consumer for PagerProcess {
    async fn wait(&mut self) -> Result<ConsumerExit> {
        let status = self.pager.wait().await?;
        debug!("Pager exited with {}", status);
        self.tear_down().await;
        Ok(exit_of(status))
    }

    async fn kill(&mut self) {
        if let Err(e) = self.pager.start_kill() {
            debug!("Pager already gone: {}", e);
        }
        let _ = self.pager.wait().await;
        self.tear_down().await;
    }
}
