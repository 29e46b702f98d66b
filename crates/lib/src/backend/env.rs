//! Environment shaping for backend processes.
//!
//! The host environment is read once into a [`HostEnv`] snapshot. Each stage
//! invocation then gets its own [`EnvOverlay`] computed from that snapshot and
//! applied to its child process only; the orchestrator's own environment is
//! never modified.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Default LLVM install location on Windows hosts.
pub const DEFAULT_LLVM_DIR: &str = "C:/Program Files/LLVM";
/// Default llvm-mingw install location on Linux hosts.
pub const DEFAULT_LLVM_MINGW_DIR: &str = "/opt/llvm-mingw";
/// Target subdirectory of an llvm-mingw install.
pub const MINGW_TRIPLE_DIR: &str = "x86_64-w64-mingw32";

/// The host environment variables the driver reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
  pub include: String,
  pub lib: String,
  pub path: Option<String>,
  pub llvm_dir: Option<String>,
  pub llvm_mingw_dir: Option<String>,
}

impl HostEnv {
  /// Snapshot the current process environment.
  pub fn capture() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build a snapshot from an arbitrary variable lookup.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    Self {
      include: lookup("INCLUDE").unwrap_or_default(),
      lib: lookup("LIB").unwrap_or_default(),
      path: lookup("PATH"),
      llvm_dir: lookup("LLVM_DIR"),
      llvm_mingw_dir: lookup("LLVM_MINGW_DIR"),
    }
  }

  pub fn llvm_dir(&self) -> PathBuf {
    PathBuf::from(self.llvm_dir.as_deref().unwrap_or(DEFAULT_LLVM_DIR))
  }

  pub fn llvm_mingw_dir(&self) -> PathBuf {
    PathBuf::from(self.llvm_mingw_dir.as_deref().unwrap_or(DEFAULT_LLVM_MINGW_DIR))
  }

  /// `PATH` with `dir` appended.
  pub fn path_with(&self, dir: &Path) -> String {
    let separator = if cfg!(windows) { ';' } else { ':' };
    match self.path.as_deref() {
      Some(path) if !path.is_empty() => format!("{}{}{}", path, separator, dir.display()),
      _ => dir.display().to_string(),
    }
  }
}

/// LLVM include and library directories to pass to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlvmPaths {
  pub include: PathBuf,
  pub lib: PathBuf,
  /// Extra directory to append to `PATH`, for cross toolchains.
  pub bin: Option<PathBuf>,
}

impl LlvmPaths {
  pub fn under(root: &Path) -> Self {
    Self {
      include: root.join("include"),
      lib: root.join("lib"),
      bin: None,
    }
  }
}

/// Variables to set and remove on one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
  set: BTreeMap<String, String>,
  remove: BTreeSet<String>,
}

impl EnvOverlay {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    let key = key.into();
    self.remove.remove(&key);
    self.set.insert(key, value.into());
    self
  }

  pub fn remove(mut self, key: impl Into<String>) -> Self {
    let key = key.into();
    self.set.remove(&key);
    self.remove.insert(key);
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.set.get(key).map(String::as_str)
  }

  pub fn is_removed(&self, key: &str) -> bool {
    self.remove.contains(key)
  }

  /// Apply this overlay to a command about to be spawned.
  pub fn apply(&self, command: &mut Command) {
    for key in &self.remove {
      command.env_remove(key);
    }
    for (key, value) in &self.set {
      command.env(key, value);
    }
  }
}
