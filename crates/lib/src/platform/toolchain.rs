//! Toolchain selection for a (host, target platform) pair.
//!
//! Resolution is a closed decision table over [`Host`] and [`Platform`]. It
//! never touches the filesystem: the caller checks that the descriptor's file
//! exists before handing it to the backend.
//!
//! A run resolves each target platform once into a [`ToolchainTable`], which
//! both the feasibility rule and the executor read from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::consts::TOOLCHAIN_FILE_EXT;
use crate::platform::{Host, Platform};

/// Name of the toolchain used when cross compiling to Windows from Linux.
pub const MINGW_TOOLCHAIN: &str = "mingw";

/// Which toolchain configuration to hand to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolchainDescriptor {
  /// The host builds the target with its own toolchain.
  Native { platform: Platform, file: PathBuf },
  /// A dedicated cross toolchain.
  Cross { name: String, file: PathBuf },
  /// The host cannot build this target.
  Unsupported { reason: String },
}

impl ToolchainDescriptor {
  pub fn is_supported(&self) -> bool {
    !matches!(self, Self::Unsupported { .. })
  }

  /// The toolchain file backing this descriptor.
  pub fn file(&self) -> Option<&Path> {
    match self {
      Self::Native { file, .. } | Self::Cross { file, .. } => Some(file),
      Self::Unsupported { .. } => None,
    }
  }
}

/// Resolves toolchain descriptors against a toolchains directory.
#[derive(Debug, Clone)]
pub struct ToolchainResolver {
  toolchains_dir: PathBuf,
}

impl ToolchainResolver {
  pub fn new(toolchains_dir: impl Into<PathBuf>) -> Self {
    Self {
      toolchains_dir: toolchains_dir.into(),
    }
  }

  pub fn toolchains_dir(&self) -> &Path {
    &self.toolchains_dir
  }

  /// Decide which toolchain builds `target` on `host`.
  pub fn resolve(&self, host: Host, target: Platform) -> ToolchainDescriptor {
    match (host, target) {
      (Host::Linux, Platform::Linux) | (Host::Windows, Platform::Windows) | (Host::Darwin, Platform::Darwin) => {
        ToolchainDescriptor::Native {
          platform: target,
          file: self.toolchain_file(target.as_str()),
        }
      }
      (Host::Windows, _) => unsupported("cross compile on windows is not supported"),
      (Host::Darwin, _) => unsupported("cross compile on darwin is not supported"),
      (Host::Linux, Platform::Windows | Platform::Mingw) => ToolchainDescriptor::Cross {
        name: MINGW_TOOLCHAIN.to_string(),
        file: self.toolchain_file(MINGW_TOOLCHAIN),
      },
      (Host::Linux, Platform::Darwin) => unsupported("cross compile for darwin is not supported"),
    }
  }

  /// Resolve every distinct platform in `targets` once for `host`.
  pub fn table(&self, host: Host, targets: impl IntoIterator<Item = Platform>) -> ToolchainTable {
    let mut entries = HashMap::new();
    for target in targets {
      entries.entry(target).or_insert_with(|| {
        let descriptor = self.resolve(host, target);
        debug!(host = %host, target = %target, toolchain = ?descriptor, "resolved toolchain");
        Arc::new(descriptor)
      });
    }
    ToolchainTable { host, entries }
  }

  fn toolchain_file(&self, name: &str) -> PathBuf {
    self.toolchains_dir.join(format!("{}.{}", name, TOOLCHAIN_FILE_EXT))
  }
}

/// Toolchain descriptors for one host, one per target platform.
#[derive(Debug, Clone)]
pub struct ToolchainTable {
  host: Host,
  entries: HashMap<Platform, Arc<ToolchainDescriptor>>,
}

impl ToolchainTable {
  pub fn host(&self) -> Host {
    self.host
  }

  /// The descriptor for `target`. A platform the table was not built for
  /// has no toolchain.
  pub fn descriptor(&self, target: Platform) -> Arc<ToolchainDescriptor> {
    match self.entries.get(&target) {
      Some(descriptor) => descriptor.clone(),
      None => Arc::new(unsupported(&format!("no toolchain resolved for {}", target))),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

fn unsupported(reason: &str) -> ToolchainDescriptor {
  ToolchainDescriptor::Unsupported {
    reason: reason.to_string(),
  }
}
