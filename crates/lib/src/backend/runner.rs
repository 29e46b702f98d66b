//! Stage process execution.
//!
//! [`StageRunner`] is the seam between the driver and the outside world. The
//! production [`ProcessRunner`] spawns one child process per stage with the
//! stage's own environment overlay, optionally capturing its output to a log
//! file and enforcing a timeout.

use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

#[cfg(unix)]
use rustix::process::{Pid, Signal, kill_process_group};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::stage::{StageCommand, StageOutcome};
use crate::consts::CONFIGURATION_FAILURE_CODE;
use crate::execute::types::ExecuteError;

/// Lines of captured stderr echoed to the debug log on failure.
const FAILURE_TAIL_LINES: usize = 20;

/// How long to keep reading a killed stage's output.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs prepared stage commands.
pub trait StageRunner: Send + Sync + 'static {
  fn run(&self, command: &StageCommand) -> impl Future<Output = Result<StageOutcome, ExecuteError>> + Send;
}

/// Runs stages as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
  capture_output: bool,
  timeout: Option<Duration>,
}

impl ProcessRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Capture stdout/stderr into each stage's log file instead of inheriting
  /// the terminal. Used when several combinations build at once.
  pub fn capture_output(mut self, capture: bool) -> Self {
    self.capture_output = capture;
    self
  }

  /// Kill a stage that runs longer than `timeout`.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }
}

impl StageRunner for ProcessRunner {
  async fn run(&self, command: &StageCommand) -> Result<StageOutcome, ExecuteError> {
    info!(stage = %command.stage, combination = %command.label, "running stage");

    let mut process = Command::new(&command.program);
    process
      .args(&command.args)
      .current_dir(&command.cwd)
      .stdin(Stdio::null())
      .kill_on_drop(true);
    command.env.apply(&mut process);

    // A timed-out stage is killed as a whole process group, so the backend's
    // own children (generators, compilers) go with it.
    #[cfg(unix)]
    if self.timeout.is_some() {
      process.process_group(0);
    }

    if self.capture_output {
      process.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    debug!(cmd = %command.command_line(), working_dir = ?command.cwd, "spawning process");

    let mut child = process.spawn().map_err(|source| ExecuteError::Spawn {
      program: command.program.clone(),
      source,
    })?;

    let stdout = child.stdout.take().map(read_pipe);
    let stderr = child.stderr.take().map(read_pipe);

    let status = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(waited) => Some(waited?),
        Err(_) => {
          warn!(
            stage = %command.stage,
            combination = %command.label,
            timeout = ?limit,
            "stage timed out"
          );
          kill_stage(&mut child).await;
          None
        }
      },
      None => Some(child.wait().await?),
    };

    // after a kill, only wait briefly for pipes held open by escaped processes
    let grace = status.is_none().then_some(PIPE_DRAIN_GRACE);
    let captured = Captured {
      stdout: collect_pipe(stdout, grace).await,
      stderr: collect_pipe(stderr, grace).await,
    };

    let Some(status) = status else {
      if self.capture_output {
        write_log(&command.log_path, command, &captured, Some("stage timed out")).await?;
      }
      return Ok(StageOutcome::TimedOut);
    };

    let code = exit_code(&status);

    if self.capture_output {
      write_log(&command.log_path, command, &captured, None).await?;

      if code != 0 {
        let stderr = String::from_utf8_lossy(&captured.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(FAILURE_TAIL_LINES)..].join("\n");
        if !tail.is_empty() {
          debug!(stderr = %tail, log = %command.log_path.display(), "stage stderr");
        }
      }
    }

    Ok(StageOutcome::Exited(code))
  }
}

/// Output read from a stage's pipes.
#[derive(Debug, Default)]
struct Captured {
  stdout: Vec<u8>,
  stderr: Vec<u8>,
}

fn read_pipe(mut pipe: impl AsyncRead + Unpin + Send + 'static) -> JoinHandle<Vec<u8>> {
  tokio::spawn(async move {
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
      debug!(error = %e, "failed reading stage output");
    }
    buf
  })
}

async fn collect_pipe(reader: Option<JoinHandle<Vec<u8>>>, grace: Option<Duration>) -> Vec<u8> {
  let Some(reader) = reader else {
    return Vec::new();
  };
  let joined = match grace {
    Some(limit) => match tokio::time::timeout(limit, reader).await {
      Ok(joined) => joined,
      Err(_) => return Vec::new(),
    },
    None => reader.await,
  };
  joined.unwrap_or_default()
}

/// Kill the stage's process group, then the child itself.
async fn kill_stage(child: &mut Child) {
  #[cfg(unix)]
  if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()).and_then(Pid::from_raw) {
    if let Err(e) = kill_process_group(pid, Signal::KILL) {
      debug!(error = %e, "failed to kill stage process group");
    }
  }

  if let Err(e) = child.kill().await {
    debug!(error = %e, "failed to kill stage process");
  }
}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;

  status
    .code()
    .or_else(|| status.signal().map(|signal| -signal))
    .unwrap_or(CONFIGURATION_FAILURE_CODE)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
  status.code().unwrap_or(CONFIGURATION_FAILURE_CODE)
}

async fn write_log(
  path: &Path,
  command: &StageCommand,
  captured: &Captured,
  note: Option<&str>,
) -> Result<(), ExecuteError> {
  let to_error = |e: std::io::Error| ExecuteError::WriteLog {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
  }

  let mut content = format!("$ {}\n", command.command_line()).into_bytes();
  content.extend_from_slice(&captured.stdout);
  content.extend_from_slice(&captured.stderr);
  if let Some(note) = note {
    content.extend_from_slice(format!("\n[buildmatrix] {}\n", note).as_bytes());
  }

  tokio::fs::write(path, content).await.map_err(to_error)
}
