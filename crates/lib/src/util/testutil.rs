//! Test utilities for buildmatrix-lib.
//!
//! Cross-platform shell helpers plus a scripted [`StageRunner`] that replays
//! configured outcomes instead of spawning a backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{Stage, StageCommand, StageOutcome, StageRunner};
use crate::execute::types::ExecuteError;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Create empty toolchain files named `<name>.cmake` in `dir`.
pub fn write_toolchains(dir: &Path, names: &[&str]) {
  std::fs::create_dir_all(dir).unwrap();
  for name in names {
    std::fs::write(dir.join(format!("{}.cmake", name)), "").unwrap();
  }
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptedStep {
  Exit(i32),
  TimeOut,
  Error,
  Panic,
}

/// A runner that answers from a script keyed by (combination label, stage).
///
/// Unscripted stages exit 0.
#[derive(Default)]
pub struct ScriptedRunner {
  script: HashMap<(String, Stage), ScriptedStep>,
  delay: Option<Duration>,
  calls: Mutex<Vec<(String, Stage)>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(mut self, label: &str, stage: Stage, step: ScriptedStep) -> Self {
    self.script.insert((label.to_string(), stage), step);
    self
  }

  /// Sleep this long inside every stage.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Every (label, stage) run so far, in call order.
  pub fn calls(&self) -> Vec<(String, Stage)> {
    self.calls.lock().unwrap().clone()
  }

  /// Labels of combinations whose configure stage ran, in call order.
  pub fn attempted(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter(|(_, stage)| *stage == Stage::Configure)
      .map(|(label, _)| label)
      .collect()
  }

  /// Highest number of stages observed running at once.
  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }
}

impl StageRunner for ScriptedRunner {
  async fn run(&self, command: &StageCommand) -> Result<StageOutcome, ExecuteError> {
    self.calls.lock().unwrap().push((command.label.clone(), command.stage));

    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }

    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    match self.script.get(&(command.label.clone(), command.stage)) {
      None => Ok(StageOutcome::Exited(0)),
      Some(ScriptedStep::Exit(code)) => Ok(StageOutcome::Exited(*code)),
      Some(ScriptedStep::TimeOut) => Ok(StageOutcome::TimedOut),
      Some(ScriptedStep::Error) => Err(ExecuteError::Io(std::io::Error::other("scripted failure"))),
      Some(ScriptedStep::Panic) => panic!("scripted panic in {}", command.label),
    }
  }
}
