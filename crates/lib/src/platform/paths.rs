//! Output directory layout.
//!
//! Every combination gets its own build and install directory, namespaced by
//! platform, architecture and build variant, so concurrent backends never
//! share a working directory.

use std::path::{Path, PathBuf};

use crate::matrix::Combination;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
  source_dir: PathBuf,
  out_dir: PathBuf,
}

impl OutputLayout {
  pub fn new(source_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
    Self {
      source_dir: source_dir.into(),
      out_dir: out_dir.into(),
    }
  }

  /// Project source directory handed to the backend's configure stage.
  pub fn source_dir(&self) -> &Path {
    &self.source_dir
  }

  pub fn build_root(&self) -> PathBuf {
    self.out_dir.join("build")
  }

  pub fn install_root(&self) -> PathBuf {
    self.out_dir.join("install")
  }

  /// `<out>/build/<platform>/<arch>/<variant>`
  pub fn build_dir(&self, combination: &Combination) -> PathBuf {
    namespaced(&self.build_root(), combination)
  }

  /// `<out>/install/<platform>/<arch>/<variant>`
  pub fn install_dir(&self, combination: &Combination) -> PathBuf {
    namespaced(&self.install_root(), combination)
  }
}

fn namespaced(root: &Path, combination: &Combination) -> PathBuf {
  root
    .join(combination.platform.as_str())
    .join(combination.arch.as_str())
    .join(combination.variant_name())
}
