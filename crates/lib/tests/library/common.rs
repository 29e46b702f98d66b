//! Shared helpers for library integration tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use buildmatrix_lib::backend::{
  BackendDriver, BackendSettings, DriverOptions, HostEnv, Stage, StageCommand, StageOutcome, StageRunner,
};
use buildmatrix_lib::execute::ExecuteError;
use buildmatrix_lib::matrix::MatrixRequest;
use buildmatrix_lib::platform::paths::OutputLayout;
use buildmatrix_lib::platform::{Host, ToolchainResolver, ToolchainTable};

/// Records every stage command and answers with scripted exit codes.
///
/// Stages with no scripted code exit 0.
#[derive(Default)]
pub struct RecordingRunner {
  codes: HashMap<(String, Stage), i32>,
  commands: Mutex<Vec<StageCommand>>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn exit(mut self, label: &str, stage: Stage, code: i32) -> Self {
    self.codes.insert((label.to_string(), stage), code);
    self
  }

  pub fn commands(&self) -> Vec<StageCommand> {
    self.commands.lock().unwrap().clone()
  }
}

impl StageRunner for RecordingRunner {
  async fn run(&self, command: &StageCommand) -> Result<StageOutcome, ExecuteError> {
    self.commands.lock().unwrap().push(command.clone());
    let code = self
      .codes
      .get(&(command.label.clone(), command.stage))
      .copied()
      .unwrap_or(0);
    Ok(StageOutcome::Exited(code))
  }
}

/// Project directory with toolchain files in place.
pub struct Project {
  pub root: tempfile::TempDir,
}

impl Project {
  pub fn new(toolchains: &[&str]) -> Self {
    let root = tempfile::TempDir::new().unwrap();
    let dir = root.path().join("toolchains");
    std::fs::create_dir_all(&dir).unwrap();
    for name in toolchains {
      std::fs::write(dir.join(format!("{}.cmake", name)), "").unwrap();
    }
    Self { root }
  }

  pub fn path(&self) -> &Path {
    self.root.path()
  }

  /// Toolchains for every platform in `request`, resolved once.
  pub fn toolchains(&self, host: Host, request: &MatrixRequest) -> Arc<ToolchainTable> {
    let resolver = ToolchainResolver::new(self.path().join("toolchains"));
    Arc::new(resolver.table(host, request.platforms.iter().copied()))
  }

  pub fn driver(&self, runner: RecordingRunner, host: Host, options: DriverOptions) -> BackendDriver<RecordingRunner> {
    BackendDriver::new(
      runner,
      host,
      HostEnv::default(),
      BackendSettings {
        program: "cmake".to_string(),
        generator: "Ninja".to_string(),
        layout: OutputLayout::new(self.path(), self.path().join("out")),
      },
      options,
    )
  }
}
