mod build;
mod info;
mod plan;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use buildmatrix_lib::config::ProjectConfig;
use buildmatrix_lib::matrix::{self, BuildMode, Combination, InputError, MatrixRequest, RuleSet};
use buildmatrix_lib::platform::{HostIdentity, ToolchainResolver, ToolchainTable};

pub use build::{BuildArgs, cmd_build};
pub use info::cmd_info;
pub use plan::cmd_plan;

/// Which combinations a command operates on.
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
  /// debug, release, all, all-options-matrix, or a comma-separated list of build types
  #[arg(long, default_value = "debug")]
  pub build_mode: String,

  /// Comma-separated target platforms (default: the host platform)
  #[arg(long)]
  pub target_platforms: Option<String>,

  /// Comma-separated target architectures (default: the host architecture)
  #[arg(long)]
  pub target_archs: Option<String>,
}

impl SelectionArgs {
  /// Parse the selection into a matrix request, filling defaults from `host`.
  pub fn request(&self, config: &ProjectConfig, host: HostIdentity) -> Result<MatrixRequest, InputError> {
    let platforms = self
      .target_platforms
      .clone()
      .unwrap_or_else(|| host.os.native_platform().to_string());
    let archs = self.target_archs.clone().unwrap_or_else(|| host.arch.to_string());
    let mode: BuildMode = self.build_mode.parse()?;

    MatrixRequest::parse(&platforms, &archs, &mode, config.matrix.flags.clone())
  }
}

/// Everything a command needs once the selection has been expanded.
pub struct Session {
  pub config: ProjectConfig,
  pub host: HostIdentity,
  /// Resolved once per requested platform; shared by expansion and execution.
  pub toolchains: Arc<ToolchainTable>,
  pub request: MatrixRequest,
  pub combinations: Vec<Combination>,
}

impl Session {
  pub fn prepare(config_path: &Path, selection: &SelectionArgs) -> Result<Self> {
    let config = ProjectConfig::load_or_default(config_path)?;
    let host = detect_host()?;
    let request = selection.request(&config, host)?;

    let resolver = ToolchainResolver::new(config.toolchains_dir());
    let toolchains = Arc::new(resolver.table(host.os, request.platforms.iter().copied()));
    let rules = if config.matrix.prune_unbuildable {
      RuleSet::standard(toolchains.clone())
    } else {
      RuleSet::logical()
    };
    debug!(rules = rules.len(), host = %host, "expanding build matrix");

    let combinations = matrix::expand(&request, host.os, &rules);

    Ok(Self {
      config,
      host,
      toolchains,
      request,
      combinations,
    })
  }
}

pub fn detect_host() -> Result<HostIdentity, InputError> {
  HostIdentity::current().ok_or_else(|| {
    InputError::UnsupportedHost(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH))
  })
}
