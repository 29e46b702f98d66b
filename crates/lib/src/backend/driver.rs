//! Single combination realization.
//!
//! The driver turns one combination and its resolved toolchain into the
//! backend's staged invocations and runs them in order, stopping at the first
//! stage that does not exit cleanly.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::backend::env::{EnvOverlay, HostEnv, LlvmPaths, MINGW_TRIPLE_DIR};
use crate::backend::runner::StageRunner;
use crate::backend::stage::{Stage, StageCommand, StageOutcome};
use crate::consts::CONFIGURATION_FAILURE_CODE;
use crate::execute::types::{BuildStatus, ExecuteError, FailureCause};
use crate::matrix::{BuildType, Combination};
use crate::platform::paths::OutputLayout;
use crate::platform::{Host, Platform, ToolchainDescriptor};

/// Options shared by every combination in a run.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
  /// Parallelism hint passed to the backend's build and package stages.
  pub parallel_jobs: Option<usize>,
  pub install: bool,
  pub package: bool,
  pub verbose: bool,
  pub clang_tidy: bool,
  /// Extra configure arguments, appended verbatim.
  pub extra_args: Vec<String>,
}

/// Backend program settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
  pub program: String,
  pub generator: String,
  pub layout: OutputLayout,
}

pub struct BackendDriver<R> {
  runner: R,
  host: Host,
  env: HostEnv,
  settings: BackendSettings,
  options: DriverOptions,
}

impl<R: StageRunner> BackendDriver<R> {
  pub fn new(runner: R, host: Host, env: HostEnv, settings: BackendSettings, options: DriverOptions) -> Self {
    Self {
      runner,
      host,
      env,
      settings,
      options,
    }
  }

  pub fn host(&self) -> Host {
    self.host
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  pub fn layout(&self) -> &OutputLayout {
    &self.settings.layout
  }

  /// Build one combination.
  ///
  /// Returns a configuration failure without spawning anything when the
  /// toolchain is unsupported or its file is missing. Otherwise runs
  /// configure, build, then install and package when enabled.
  pub async fn execute(
    &self,
    combination: &Combination,
    toolchain: &ToolchainDescriptor,
  ) -> Result<BuildStatus, ExecuteError> {
    let toolchain_file = match toolchain {
      ToolchainDescriptor::Unsupported { reason } => {
        warn!(combination = %combination, reason = %reason, "compatible toolchain not found");
        return Ok(configuration_failure(reason.clone()));
      }
      ToolchainDescriptor::Native { file, .. } | ToolchainDescriptor::Cross { file, .. } => file,
    };

    if !tokio::fs::try_exists(toolchain_file).await.unwrap_or(false) {
      warn!(combination = %combination, file = %toolchain_file.display(), "toolchain file missing");
      return Ok(configuration_failure(format!(
        "toolchain file not found: {}",
        toolchain_file.display()
      )));
    }

    let llvm = self.detect_llvm(combination.platform).await;
    let commands = self.stage_commands(combination, toolchain_file, llvm.as_ref());

    for command in &commands {
      match self.runner.run(command).await? {
        StageOutcome::Exited(0) => debug!(combination = %combination, stage = %command.stage, "stage succeeded"),
        StageOutcome::Exited(code) => {
          warn!(combination = %combination, stage = %command.stage, code, "stage failed");
          return Ok(BuildStatus::Failure {
            cause: FailureCause::Stage(command.stage),
            code,
          });
        }
        StageOutcome::TimedOut => {
          return Ok(BuildStatus::Failure {
            cause: FailureCause::Timeout(command.stage),
            code: CONFIGURATION_FAILURE_CODE,
          });
        }
      }
    }

    info!(combination = %combination, "all stages succeeded");
    Ok(BuildStatus::Success)
  }

  /// The stage invocations for a combination, in execution order.
  pub fn stage_commands(
    &self,
    combination: &Combination,
    toolchain_file: &Path,
    llvm: Option<&LlvmPaths>,
  ) -> Vec<StageCommand> {
    let layout = &self.settings.layout;
    let build_dir = layout.build_dir(combination);
    let env = self.env_overlay(llvm);

    let make = |stage: Stage, args: Vec<String>| StageCommand {
      stage,
      label: combination.to_string(),
      program: self.settings.program.clone(),
      args,
      cwd: layout.source_dir().to_path_buf(),
      env: env.clone(),
      log_path: build_dir.join("logs").join(format!("{}.log", stage)),
    };

    let mut commands = vec![
      make(Stage::Configure, self.configure_args(combination, toolchain_file, llvm)),
      make(Stage::Build, self.with_parallel(vec!["--build".into(), path_arg(&build_dir)])),
    ];

    if self.options.install {
      commands.push(make(Stage::Install, vec!["--install".into(), path_arg(&build_dir)]));
    }

    if self.options.package {
      commands.push(make(
        Stage::Package,
        self.with_parallel(vec![
          "--build".into(),
          path_arg(&build_dir),
          "--target".into(),
          "package".into(),
        ]),
      ));
    }

    commands
  }

  fn configure_args(&self, combination: &Combination, toolchain_file: &Path, llvm: Option<&LlvmPaths>) -> Vec<String> {
    let layout = &self.settings.layout;
    let options = &self.options;

    let mut args = vec![
      "-S".to_string(),
      path_arg(layout.source_dir()),
      "-B".to_string(),
      path_arg(&layout.build_dir(combination)),
      "-G".to_string(),
      self.settings.generator.clone(),
      "--toolchain".to_string(),
      path_arg(toolchain_file),
      "--install-prefix".to_string(),
      path_arg(&layout.install_dir(combination)),
      define("BUILD_DEBUG", bool_str(combination.build_type == BuildType::Debug)),
      define("TARGET_OS_NAME", combination.platform.as_str()),
      define("TARGET_ARCH", combination.arch.as_str()),
      define("DO_CLANG_TIDY", bool_str(options.clang_tidy)),
      define("ENABLE_VERBOSE", bool_str(options.verbose)),
    ];

    args.extend(options.extra_args.iter().cloned());
    args.extend(combination.flag_definitions());

    if let Some(llvm) = llvm {
      args.push(define("LLVM_INCLUDE_DIRS", &path_arg(&llvm.include)));
      args.push(define("LLVM_LIBRARY_DIRS", &path_arg(&llvm.lib)));
    }

    args.push(define("ADDITIONAL_INCLUDE_DIRECTORIES", &self.env.include));
    args.push(define("ADDITIONAL_LINK_DIRECTORIES", &self.env.lib));

    args
  }

  fn with_parallel(&self, mut args: Vec<String>) -> Vec<String> {
    if let Some(jobs) = self.options.parallel_jobs {
      args.push("--parallel".into());
      args.push(jobs.to_string());
    }
    args
  }

  /// The environment overlay for every stage of one combination.
  pub fn env_overlay(&self, llvm: Option<&LlvmPaths>) -> EnvOverlay {
    let mut overlay = if self.options.verbose {
      EnvOverlay::new().set("VERBOSE", "true")
    } else {
      EnvOverlay::new().remove("VERBOSE")
    };

    if let Some(bin) = llvm.and_then(|l| l.bin.as_deref()) {
      overlay = overlay.set("PATH", self.env.path_with(bin));
    }

    overlay
  }

  /// LLVM search paths for `target`, if an install is present on this host.
  async fn detect_llvm(&self, target: Platform) -> Option<LlvmPaths> {
    let (root, paths) = match (self.host, target) {
      (Host::Windows, _) => {
        let root = self.env.llvm_dir();
        (root.clone(), LlvmPaths::under(&root))
      }
      (Host::Linux, Platform::Windows | Platform::Mingw) => {
        let mingw = self.env.llvm_mingw_dir();
        let root = mingw.join(MINGW_TRIPLE_DIR);
        let mut paths = LlvmPaths::under(&root);
        paths.bin = Some(mingw.join("bin"));
        (root, paths)
      }
      _ => return None,
    };

    if tokio::fs::try_exists(&root).await.unwrap_or(false) {
      debug!(root = %root.display(), "using llvm search paths");
      Some(paths)
    } else {
      None
    }
  }
}

fn configuration_failure(reason: String) -> BuildStatus {
  BuildStatus::Failure {
    cause: FailureCause::Configuration(reason),
    code: CONFIGURATION_FAILURE_CODE,
  }
}

fn define(name: &str, value: &str) -> String {
  format!("-D{}={}", name, value)
}

fn bool_str(value: bool) -> &'static str {
  if value { "true" } else { "false" }
}

fn path_arg(path: &Path) -> String {
  path.display().to_string()
}
