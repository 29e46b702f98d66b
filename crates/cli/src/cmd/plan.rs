//! Implementation of the `buildmatrix plan` command.
//!
//! Expands the selected matrix and lists what `build` would run, without
//! invoking the backend.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use buildmatrix_lib::matrix::Combination;
use buildmatrix_lib::platform::ToolchainDescriptor;

use crate::cmd::{SelectionArgs, Session};
use crate::output::{OutputFormat, print_info, print_json, print_planned, print_stat, print_warning};

#[derive(Debug, Serialize)]
struct PlannedBuild<'a> {
  ordinal: usize,
  combination: &'a Combination,
  build_dir: PathBuf,
  toolchain: ToolchainDescriptor,
}

#[derive(Debug, Serialize)]
struct Plan<'a> {
  host: String,
  matrix_mode: bool,
  builds: Vec<PlannedBuild<'a>>,
}

pub fn cmd_plan(selection: &SelectionArgs, config_path: &Path, output: OutputFormat) -> Result<i32> {
  let session = Session::prepare(config_path, selection)?;
  let layout = session.config.layout();

  let builds: Vec<PlannedBuild> = session
    .combinations
    .iter()
    .enumerate()
    .map(|(ordinal, combination)| PlannedBuild {
      ordinal,
      combination,
      build_dir: layout.build_dir(combination),
      toolchain: session.toolchains.descriptor(combination.platform).as_ref().clone(),
    })
    .collect();

  if output.is_json() {
    print_json(&Plan {
      host: session.host.to_string(),
      matrix_mode: session.request.matrix_mode,
      builds,
    })?;
    return Ok(0);
  }

  if builds.is_empty() {
    print_warning("No combinations match the selection");
    return Ok(0);
  }

  print_info(&format!("{} combination(s) on {}", builds.len(), session.host));
  for build in &builds {
    print_planned(build.ordinal, &build.combination.to_string(), &build.build_dir.display().to_string());
  }

  let unbuildable = builds.iter().filter(|b| !b.toolchain.is_supported()).count();
  if unbuildable > 0 {
    println!();
    print_stat("Unbuildable on this host", &unbuildable.to_string());
  }

  Ok(0)
}
