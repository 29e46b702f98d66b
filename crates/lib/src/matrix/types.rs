//! Types for matrix expansion.
//!
//! This module defines the dimension values, the combination value object,
//! the expansion request and the input error taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::platform::{Arch, Platform};

/// Flag enabling LLVM's unwinder.
pub const FLAG_LLVM_UNWIND: &str = "ENABLE_LLVM_UNWIND";
/// Flag enabling sanitizer instrumentation.
pub const FLAG_SANITIZERS: &str = "ENABLE_SANITIZERS";
/// Flag enabling AVX2 code paths.
pub const FLAG_AVX2: &str = "ENABLE_AVX2";

/// Errors for invalid requested dimension values.
///
/// These abort a run before any expansion or execution work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
  #[error("unknown platform specified ({0})")]
  UnknownPlatform(String),

  #[error("unknown architecture specified ({0})")]
  UnknownArch(String),

  #[error("unknown build type specified ({0})")]
  UnknownBuildType(String),

  #[error("unsupported host: {0}")]
  UnsupportedHost(String),
}

impl InputError {
  /// Process exit code reported for this validation failure.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::UnknownPlatform(_) => 1,
      Self::UnknownArch(_) => 2,
      Self::UnknownBuildType(_) => 3,
      Self::UnsupportedHost(_) => 4,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
  Debug,
  Release,
}

impl BuildType {
  pub const ALL: [BuildType; 2] = [Self::Debug, Self::Release];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::Release => "release",
    }
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for BuildType {
  type Err = InputError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|b| b.as_str() == s)
      .ok_or_else(|| InputError::UnknownBuildType(s.to_string()))
  }
}

/// How build types and feature flags are selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
  /// An explicit list of build types; flags held at their configured values.
  Types(Vec<BuildType>),
  /// Every build type; flags held at their configured values.
  All,
  /// Every build type crossed with every assignment of the matrix flags.
  AllOptionsMatrix,
}

impl BuildMode {
  pub fn build_types(&self) -> Vec<BuildType> {
    match self {
      Self::Types(types) => types.clone(),
      Self::All | Self::AllOptionsMatrix => BuildType::ALL.to_vec(),
    }
  }

  pub fn is_matrix(&self) -> bool {
    matches!(self, Self::AllOptionsMatrix)
  }
}

impl FromStr for BuildMode {
  type Err = InputError;

  /// Accepts `all`, `all_options_matrix` (or `all-options-matrix`), or a
  /// comma-separated list of build types.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "all" => Ok(Self::All),
      "all_options_matrix" | "all-options-matrix" => Ok(Self::AllOptionsMatrix),
      _ => split_list(s)
        .map(BuildType::from_str)
        .collect::<Result<Vec<_>, _>>()
        .map(Self::Types),
    }
  }
}

/// The values a feature flag takes during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagDomain {
  /// Held at a single configured value.
  Fixed(bool),
  /// Both values are expanded (`false` first).
  Matrix,
}

/// A named boolean backend option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
  pub name: String,
  pub domain: FlagDomain,
}

impl FeatureFlag {
  pub fn fixed(name: impl Into<String>, value: bool) -> Self {
    Self {
      name: name.into(),
      domain: FlagDomain::Fixed(value),
    }
  }

  pub fn matrix(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      domain: FlagDomain::Matrix,
    }
  }

  /// Values this flag contributes to the cross-product, in expansion order.
  pub fn values(&self, matrix_mode: bool) -> Vec<bool> {
    match self.domain {
      FlagDomain::Matrix if matrix_mode => vec![false, true],
      // outside matrix mode a matrix flag stays off
      FlagDomain::Matrix => vec![false],
      FlagDomain::Fixed(value) => vec![value],
    }
  }
}

/// One fully specified build to run.
///
/// Combinations are plain values: two combinations with the same fields are
/// the same build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
  pub platform: Platform,
  pub arch: Arch,
  pub build_type: BuildType,
  pub flags: BTreeMap<String, bool>,
}

impl Combination {
  pub fn new(platform: Platform, arch: Arch, build_type: BuildType, flags: BTreeMap<String, bool>) -> Self {
    Self {
      platform,
      arch,
      build_type,
      flags,
    }
  }

  /// Whether `name` is enabled. Absent flags count as disabled.
  pub fn flag(&self, name: &str) -> bool {
    self.flags.get(name).copied().unwrap_or(false)
  }

  /// Directory name for this build variant: the build type, followed by the
  /// lower-cased names of every enabled flag.
  pub fn variant_name(&self) -> String {
    let mut name = self.build_type.as_str().to_string();
    for (flag, _) in self.flags.iter().filter(|(_, enabled)| **enabled) {
      name.push('+');
      name.push_str(&flag.to_lowercase());
    }
    name
  }

  /// Flags rendered as backend definitions (`-DNAME=TRUE`).
  pub fn flag_definitions(&self) -> Vec<String> {
    self
      .flags
      .iter()
      .map(|(name, value)| format!("-D{}={}", name, if *value { "TRUE" } else { "FALSE" }))
      .collect()
  }
}

impl fmt::Display for Combination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}-{}", self.platform, self.arch, self.build_type)?;
    if !self.flags.is_empty() {
      let flags: Vec<String> = self.flags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
      write!(f, " [{}]", flags.join(","))?;
    }
    Ok(())
  }
}

/// The dimensions requested for one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatrixRequest {
  pub platforms: Vec<Platform>,
  pub archs: Vec<Arch>,
  pub build_types: Vec<BuildType>,
  pub flags: Vec<FeatureFlag>,
  /// Expand every assignment of [`FlagDomain::Matrix`] flags.
  pub matrix_mode: bool,
}

impl MatrixRequest {
  /// Parse comma-separated dimension lists.
  ///
  /// Fails on the first unknown platform, then architecture. Empty entries are
  /// ignored, and a repeated value or flag name keeps only its first
  /// occurrence.
  pub fn parse(
    platforms: &str,
    archs: &str,
    mode: &BuildMode,
    flags: Vec<FeatureFlag>,
  ) -> Result<Self, InputError> {
    let platforms = split_list(platforms)
      .map(Platform::from_str)
      .collect::<Result<Vec<_>, _>>()?;
    let archs = split_list(archs).map(Arch::from_str).collect::<Result<Vec<_>, _>>()?;

    let mut unique_flags: Vec<FeatureFlag> = Vec::with_capacity(flags.len());
    for flag in flags {
      if unique_flags.iter().any(|f| f.name == flag.name) {
        warn!(flag = %flag.name, "flag declared more than once, keeping the first");
      } else {
        unique_flags.push(flag);
      }
    }

    Ok(Self {
      platforms: first_occurrences(platforms),
      archs: first_occurrences(archs),
      build_types: first_occurrences(mode.build_types()),
      flags: unique_flags,
      matrix_mode: mode.is_matrix(),
    })
  }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
  s.split(',').map(str::trim).filter(|x| !x.is_empty())
}

/// Drop repeats, preserving the order of first occurrence.
fn first_occurrences<T: PartialEq>(items: Vec<T>) -> Vec<T> {
  let mut unique = Vec::with_capacity(items.len());
  for item in items {
    if !unique.contains(&item) {
      unique.push(item);
    }
  }
  unique
}
