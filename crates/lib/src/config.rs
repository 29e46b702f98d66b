//! Project configuration (`buildmatrix.toml`).
//!
//! The configuration file lives at the project root and describes the backend
//! program, the directory layout and the feature flags available to the
//! matrix. Every section is optional; a missing file yields the defaults.
//!
//! # Format
//!
//! ```toml
//! [project]
//! name = "engine"
//! version = "0.4.0"
//!
//! [backend]
//! program = "cmake"
//! generator = "Ninja"
//! out_dir = "out"
//! toolchains_dir = "src/build/cmake/toolchains"
//! stage_timeout_secs = 3600
//!
//! [matrix]
//! prune_unbuildable = true
//! common_args = ["-DENABLE_LTO=true"]
//!
//! [[matrix.flags]]
//! name = "ENABLE_AVX2"
//! domain = "matrix"
//!
//! [[matrix.flags]]
//! name = "ENABLE_COVERAGE"
//! domain = { fixed = false }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEFAULT_BACKEND_PROGRAM, DEFAULT_GENERATOR};
use crate::matrix::types::{FLAG_AVX2, FLAG_LLVM_UNWIND, FLAG_SANITIZERS, FeatureFlag};
use crate::platform::paths::OutputLayout;

/// Configure arguments applied to every matrix-mode combination.
const DEFAULT_MATRIX_ARGS: &[&str] = &[
  "-DENABLE_BUILD_SHARED=true",
  "-DENABLE_BUILD_TESTING=true",
  "-DENABLE_BUILD_BENCHMARK=true",
  "-DENABLE_INSTALL_TESTING=false",
  "-DENABLE_INSTALL_BENCHMARK=false",
  "-DENABLE_RUN_PROGRAM_POST_BUILD=false",
  "-DENABLE_RUN_TESTING_POST_BUILD=false",
  "-DENABLE_RUN_BENCHMARK_POST_BUILD=false",
  "-DENABLE_WARNINGS_AS_ERRORS=true",
  "-DENABLE_LTO=true",
  "-DENABLE_XRAY=false",
  "-DENABLE_NATIVE_ARCH=true",
  "-DENABLE_BUILD_REPORT=false",
  "-DENABLE_COVERAGE=false",
  "-DENABLE_OPTIMIZATION_REPORT=false",
];

/// Errors that can occur when loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read the configuration file.
  #[error("failed to read config {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  /// Failed to parse the configuration TOML.
  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

/// Project metadata shown by `info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
  pub name: Option<String>,
  pub version: Option<String>,
  pub description: Option<String>,
}

/// Backend program and directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
  pub program: String,
  pub generator: String,
  pub source_dir: PathBuf,
  pub out_dir: PathBuf,
  pub toolchains_dir: PathBuf,
  /// Kill a stage after this many seconds. Off when absent.
  pub stage_timeout_secs: Option<u64>,
}

impl Default for BackendSection {
  fn default() -> Self {
    Self {
      program: DEFAULT_BACKEND_PROGRAM.to_string(),
      generator: DEFAULT_GENERATOR.to_string(),
      source_dir: PathBuf::from("."),
      out_dir: PathBuf::from("out"),
      toolchains_dir: PathBuf::from("src/build/cmake/toolchains"),
      stage_timeout_secs: None,
    }
  }
}

/// Feature flags and matrix-only settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixSection {
  /// Flags in expansion order; the first flag varies slowest.
  pub flags: Vec<FeatureFlag>,
  /// Extra configure arguments used in matrix mode.
  pub common_args: Vec<String>,
  /// Drop combinations the host cannot build before execution.
  pub prune_unbuildable: bool,
}

impl Default for MatrixSection {
  fn default() -> Self {
    Self {
      flags: vec![
        FeatureFlag::matrix(FLAG_AVX2),
        FeatureFlag::matrix(FLAG_SANITIZERS),
        FeatureFlag::matrix(FLAG_LLVM_UNWIND),
      ],
      common_args: DEFAULT_MATRIX_ARGS.iter().map(|s| s.to_string()).collect(),
      prune_unbuildable: true,
    }
  }
}

/// Parsed `buildmatrix.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
  pub project: ProjectSection,
  pub backend: BackendSection,
  pub matrix: MatrixSection,

  /// Directory relative paths resolve against.
  #[serde(skip)]
  pub root: PathBuf,
}

impl ProjectConfig {
  /// Parse configuration text. Relative paths resolve against `root`.
  pub fn parse(content: &str, root: &Path) -> Result<Self, toml::de::Error> {
    let mut config: ProjectConfig = toml::from_str(content)?;
    config.root = root.to_path_buf();
    Ok(config)
  }

  /// Load the configuration at `path`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;

    let config = Self::parse(&content, &config_root(path)).map_err(|source| ConfigError::Parse {
      path: path.display().to_string(),
      source,
    })?;

    info!(path = %path.display(), "loaded configuration");
    Ok(config)
  }

  /// Load the configuration at `path`, or the defaults if it does not exist.
  ///
  /// Defaults resolve relative paths against the current directory.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    match std::fs::metadata(path) {
      Ok(_) => Self::load(path),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no configuration file, using defaults");
        let root = std::env::current_dir().map_err(|source| ConfigError::Read {
          path: path.display().to_string(),
          source,
        })?;
        Ok(Self {
          root,
          ..Self::default()
        })
      }
      Err(source) => Err(ConfigError::Read {
        path: path.display().to_string(),
        source,
      }),
    }
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  pub fn source_dir(&self) -> PathBuf {
    self.resolve(&self.backend.source_dir)
  }

  pub fn toolchains_dir(&self) -> PathBuf {
    self.resolve(&self.backend.toolchains_dir)
  }

  /// Build and install directory layout for this project.
  pub fn layout(&self) -> OutputLayout {
    let source_dir = self.source_dir();
    let out_dir = self.resolve(&self.backend.out_dir);
    OutputLayout::new(source_dir, out_dir)
  }

  pub fn stage_timeout(&self) -> Option<Duration> {
    self.backend.stage_timeout_secs.map(Duration::from_secs)
  }
}

/// Canonical directory containing the config file.
fn config_root(path: &Path) -> PathBuf {
  let parent = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  };
  dunce::canonicalize(&parent).unwrap_or(parent)
}
