//! Implementation of the `buildmatrix build` command.
//!
//! Expands the selected matrix and drives every combination through the
//! backend, then prints the summary table.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use buildmatrix_lib::backend::{BackendDriver, BackendSettings, DriverOptions, HostEnv, ProcessRunner};
use buildmatrix_lib::execute::{self, RunOptions};
use buildmatrix_lib::platform::default_workers;

use crate::cmd::{SelectionArgs, Session};
use crate::output::{OutputFormat, print_error, print_json, print_success, print_warning};

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  #[command(flatten)]
  pub selection: SelectionArgs,

  /// Run clang-tidy during the build (default)
  #[arg(long, overrides_with = "no_clang_tidy")]
  pub clang_tidy: bool,

  /// Skip clang-tidy
  #[arg(long, overrides_with = "clang_tidy")]
  pub no_clang_tidy: bool,

  /// Build several combinations at once
  #[arg(long)]
  pub build_async: bool,

  /// Number of combinations to build at once with --build-async
  /// (default: half the available CPUs)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Run the install stage after building
  #[arg(long)]
  pub install: bool,

  /// Run the package stage after building
  #[arg(long)]
  pub package: bool,

  /// Stop starting new builds after the first failure
  #[arg(long)]
  pub fail_fast: bool,

  /// Comma-separated extra arguments for the configure stage
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  pub extra_args: Vec<String>,

  /// Kill any stage that runs longer than this (e.g. "30m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub stage_timeout: Option<Duration>,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  pub output: OutputFormat,

  /// Extra configure arguments after `--`
  #[arg(last = true)]
  pub trailing: Vec<String>,
}

impl BuildArgs {
  fn workers(&self) -> usize {
    if self.build_async {
      self.jobs.unwrap_or_else(default_workers).max(1)
    } else {
      1
    }
  }
}

/// Execute the build command and return the process exit status.
pub fn cmd_build(args: BuildArgs, config_path: &Path, verbose: bool) -> Result<i32> {
  let session = Session::prepare(config_path, &args.selection)?;
  let matrix_mode = session.request.matrix_mode;

  if session.combinations.is_empty() {
    print_warning("No combinations to build");
    return Ok(0);
  }

  let mut extra_args = Vec::new();
  if matrix_mode {
    extra_args.extend(session.config.matrix.common_args.iter().cloned());
  }
  extra_args.extend(args.extra_args.iter().cloned());
  extra_args.extend(args.trailing.iter().cloned());

  let workers = args.workers();
  let options = DriverOptions {
    parallel_jobs: args.build_async.then(default_workers),
    // matrix runs only build
    install: args.install && !matrix_mode,
    package: args.package && !matrix_mode,
    verbose,
    clang_tidy: args.clang_tidy || !args.no_clang_tidy,
    extra_args,
  };

  let timeout = args.stage_timeout.or_else(|| session.config.stage_timeout());
  let runner = ProcessRunner::new().capture_output(workers > 1).with_timeout(timeout);

  let settings = BackendSettings {
    program: session.config.backend.program.clone(),
    generator: session.config.backend.generator.clone(),
    layout: session.config.layout(),
  };
  let driver = Arc::new(BackendDriver::new(
    runner,
    session.host.os,
    HostEnv::capture(),
    settings,
    options,
  ));

  let run_options = RunOptions {
    max_parallelism: workers,
    fail_fast: args.fail_fast,
  };

  info!(
    host = %session.host,
    combinations = session.combinations.len(),
    workers,
    "building"
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(execute::run(
    driver,
    &session.toolchains,
    session.combinations,
    &run_options,
  ));

  if args.output.is_json() {
    print_json(&report)?;
  } else {
    println!();
    println!("{}", report.render());
    println!();
    if report.is_success() {
      print_success("All builds succeeded");
    } else {
      print_error(&format!("{} build(s) failed", report.failure_count()));
    }
  }

  Ok(report.exit_code())
}
