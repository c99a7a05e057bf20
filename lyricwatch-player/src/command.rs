//! Shared plumbing for players queried through a helper program.

use lyricwatch_core::{CoreError, Result, Track};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Upper bound for a single player query
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn unreachable(player: &str, reason: impl Into<String>) -> CoreError {
    CoreError::PlayerUnreachable {
        player: player.to_string(),
        reason: reason.into(),
    }
}

/// Run `program` and return its stdout if it exits successfully.
pub(crate) async fn run(player: &str, program: &str, args: &[String]) -> Result<String> {
    debug!("Querying {}: {} {:?}", player, program, args);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(QUERY_TIMEOUT, output)
        .await
        .map_err(|_| unreachable(player, format!("{program} did not answer in time")))?
        .map_err(|e| unreachable(player, format!("can't execute {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.trim();
        return Err(unreachable(
            player,
            if reason.is_empty() {
                format!("{program} exited with {}", output.status)
            } else {
                reason.to_string()
            },
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the two-line `name\nartist` answer both helpers are asked for.
pub(crate) fn parse_track(player: &str, stdout: &str) -> Result<Track> {
    let mut lines = stdout.trim_matches(['\r', '\n']).lines();
    let name = lines.next().unwrap_or_default().trim();
    let artist = lines.next().unwrap_or_default().trim();

    if name.is_empty() {
        return Err(unreachable(player, "no track is playing"));
    }

    Ok(Track::new(name, artist))
}
