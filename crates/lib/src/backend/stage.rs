use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::backend::env::EnvOverlay;

/// The staged operations of the build backend, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Configure,
  Build,
  Install,
  Package,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Configure => "configure",
      Self::Build => "build",
      Self::Install => "install",
      Self::Package => "package",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One fully prepared backend process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
  pub stage: Stage,
  /// The combination this stage belongs to, for logs.
  pub label: String,
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub env: EnvOverlay,
  /// Where captured output goes when the runner captures.
  pub log_path: PathBuf,
}

impl StageCommand {
  /// The command line as a single string, for logs.
  pub fn command_line(&self) -> String {
    let mut line = self.program.clone();
    for arg in &self.args {
      line.push(' ');
      line.push_str(arg);
    }
    line
  }
}

/// How a stage process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
  /// The process exited. Processes killed by a signal report `-signal`.
  Exited(i32),
  /// The process outlived the stage timeout and was killed.
  TimedOut,
}

impl StageOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Exited(0))
  }
}
