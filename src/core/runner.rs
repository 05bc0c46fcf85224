// src/core/runner.rs

//! Launches local reconnaissance executables.
//!
//! Programs are always started directly with an argument vector, never through
//! a shell. On Unix every tool leads its own process group, and the whole group
//! is killed when the job is done with it, so nothing the tool forked outlives
//! the job.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::core::error::JobError;

/// Lines produced by a running tool, in the order it wrote them.
///
/// Dropping the stream kills the underlying process.
pub type LineStream = BoxStream<'static, Result<String, JobError>>;

/// The seam between job handlers and the operating system.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Starts `program` and yields each stdout line as soon as it is written.
    /// A non-zero exit status is reported as a final error item.
    fn run_streaming(&self, program: &str, args: &[String]) -> LineStream;

    /// Runs `program` to completion and returns its whole stdout, killing it
    /// if it is still running after `limit`.
    async fn run_bounded(
        &self,
        program: &str,
        args: &[String],
        limit: Duration,
    ) -> Result<String, JobError>;
}

/// Kills the tool's whole process group when dropped.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    leader: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { leader: child.id() }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            let Some(pgid) = self.leader.take().and_then(|id| i32::try_from(id).ok()) else {
                return;
            };
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                // Already gone.
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "Failed to kill process group."),
            }
        }
    }
}

/// Builds the command for `program`, detached into its own process group.
fn command(program: &str, args: &[String]) -> Command {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    command
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn run_streaming(&self, program: &str, args: &[String]) -> LineStream {
        let program = program.to_string();
        let args = args.to_vec();

        Box::pin(async_stream::stream! {
            debug!(%program, ?args, "Spawning streaming tool.");
            let spawned = command(&program, &args)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    warn!(%program, error = %e, "Failed to spawn tool.");
                    yield Err(JobError::from_spawn(&program, e));
                    return;
                }
            };

            // Declared after `child` so the group is killed before the leader is dropped.
            let _group = ProcessGroup::of(&child);

            let Some(stdout) = child.stdout.take() else {
                yield Err(JobError::ExternalToolFailure(format!("{program} has no stdout")));
                return;
            };

            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            let mut count = 0usize;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        count += 1;
                        yield Ok(String::from_utf8_lossy(&buf).trim().to_string());
                    }
                    Err(e) => {
                        warn!(%program, error = %e, "Error reading tool output.");
                        yield Err(JobError::ExternalToolFailure(format!(
                            "Error reading {program} output: {e}"
                        )));
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(%program, lines = count, "Tool finished.");
                }
                Ok(status) => {
                    warn!(%program, %status, "Tool exited unsuccessfully.");
                    yield Err(JobError::ExternalToolFailure(format!(
                        "{program} exited with {status}"
                    )));
                }
                Err(e) => {
                    yield Err(JobError::ExternalToolFailure(format!(
                        "Failed to wait for {program}: {e}"
                    )));
                }
            }
        })
    }

    async fn run_bounded(
        &self,
        program: &str,
        args: &[String],
        limit: Duration,
    ) -> Result<String, JobError> {
        debug!(%program, ?args, timeout = ?limit, "Spawning bounded tool.");
        let mut child = command(program, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| JobError::from_spawn(program, e))?;
        let group = ProcessGroup::of(&child);

        // The limit covers the pipes too: a forked helper holding stdout open
        // keeps the run going just like the tool itself.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = async { tokio::join!(child.wait(), read_all(stdout), read_all(stderr)) };
        let finished = tokio::time::timeout(limit, run).await;

        let (status, stdout, stderr) = match finished {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => {
                return Err(JobError::ExternalToolFailure(format!(
                    "Failed to wait for {program}: {e}"
                )));
            }
            Err(_) => {
                warn!(%program, timeout = ?limit, "Tool exceeded its time limit, killing it.");
                drop(group);
                // kill() also waits, so the leader is reaped before we return.
                if let Err(e) = child.kill().await {
                    warn!(%program, error = %e, "Failed to kill timed out tool.");
                }
                return Err(JobError::ExternalToolTimeout {
                    program: program.to_string(),
                    seconds: limit.as_secs(),
                });
            }
        };
        // Leftover helpers die with the group.
        drop(group);

        if status.success() {
            info!(%program, bytes = stdout.len(), "Bounded tool finished.");
            Ok(stdout)
        } else {
            warn!(%program, %status, "Bounded tool exited unsuccessfully.");
            let detail = stderr.trim();
            Err(JobError::ExternalToolFailure(if detail.is_empty() {
                format!("{program} exited with {status}")
            } else {
                format!("{program} exited with {status}: {detail}")
            }))
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut bytes).await {
            debug!(error = %e, "Pipe read ended with an error.");
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
