//! Process spawning and output capture for the simulator
//!
//! Runs one simulator invocation under a wall-clock deadline and reports what
//! happened without interpreting it.

use std::io;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::types::RawOutcome;
use crate::workspace::ProcessInvocation;

/// Bytes read from one output stream
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Run the simulator and wait for it, at most until the deadline
///
/// Never fails: spawn problems come back as [`RawOutcome::SpawnFailed`] and an
/// expired deadline as [`RawOutcome::TimedOut`], after the child has been
/// killed and reaped.
#[instrument(skip(invocation), fields(program = %invocation.program))]
pub async fn invoke(invocation: &ProcessInvocation) -> RawOutcome {
    debug!(args = ?invocation.args, dir = ?invocation.working_dir, "spawning simulator");

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The simulator leads its own group so anything it forks can be killed with it
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return RawOutcome::SpawnFailed {
                reason: format!("failed to start simulator '{}': {e}", invocation.program),
            };
        }
    };
    let group = child.id();

    // Both pipes are drained concurrently so a chatty child never blocks on a full pipe
    let limit = invocation.max_output_bytes;
    let mut stdout_task = tokio::spawn(read_capped(child.stdout.take(), limit));
    let mut stderr_task = tokio::spawn(read_capped(child.stderr.take(), limit));

    let finished = tokio::time::timeout(invocation.timeout, async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.map_err(io::Error::other)??;
        let stderr = (&mut stderr_task).await.map_err(io::Error::other)??;
        Ok::<_, io::Error>((status, stdout, stderr))
    })
    .await;

    match finished {
        Ok(Ok((status, stdout, stderr))) => {
            // Leftover background processes must not outlive the workspace
            kill_process_group(group);
            let truncated = stdout.truncated || stderr.truncated;
            debug!(
                code = ?status.code(),
                stdout_len = stdout.bytes.len(),
                stderr_len = stderr.bytes.len(),
                truncated,
                elapsed = ?started.elapsed(),
                "simulator exited"
            );
            RawOutcome::Completed {
                exit_code: status.code(),
                stdout: stdout.bytes,
                stderr: stderr.bytes,
                truncated,
            }
        }
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            kill_process_group(group);
            if let Err(kill_err) = child.kill().await {
                warn!(error = %kill_err, "failed to kill simulator after wait error");
            }
            RawOutcome::SpawnFailed {
                reason: format!("failed waiting for simulator: {e}"),
            }
        }
        Err(_) => {
            kill_process_group(group);
            // kill() also reaps the child
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed out simulator");
            }
            stdout_task.abort();
            stderr_task.abort();
            let elapsed = started.elapsed();
            warn!(?elapsed, timeout = ?invocation.timeout, "simulator timed out");
            RawOutcome::TimedOut { elapsed }
        }
    }
}

/// Send SIGKILL to every process in the simulator's process group
#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    let Some(pgid) = group
        .and_then(|id| libc::pid_t::try_from(id).ok())
        .filter(|&id| id > 0)
    else {
        return;
    };

    // SAFETY: kill(2) only delivers a signal; no memory is shared with the callee
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(error = %err, pgid, "failed to kill simulator process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// Bytes past the limit are still read so the writer is never blocked.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(captured)
}
