use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matrix::types::InputError;

/// Target platforms a build can be produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Linux,
  Windows,
  Darwin,
  Mingw,
}

impl Platform {
  pub const ALL: [Platform; 4] = [Self::Linux, Self::Windows, Self::Darwin, Self::Mingw];

  /// Returns the lowercase string identifier for this platform
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Windows => "windows",
      Self::Darwin => "darwin",
      Self::Mingw => "mingw",
    }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Platform {
  type Err = InputError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|p| p.as_str() == s)
      .ok_or_else(|| InputError::UnknownPlatform(s.to_string()))
  }
}

/// Operating systems the orchestrator itself can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Host {
  Linux,
  Windows,
  Darwin,
}

impl Host {
  pub const ALL: [Host; 3] = [Self::Linux, Self::Windows, Self::Darwin];

  /// Detect the current host operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_os(std::env::consts::OS)
  }

  /// Map a `std::env::consts::OS` style name to a host.
  pub fn from_os(os: &str) -> Option<Self> {
    match os {
      "linux" => Some(Self::Linux),
      "macos" | "darwin" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// The target platform that builds natively on this host.
  pub fn native_platform(&self) -> Platform {
    match self {
      Self::Linux => Platform::Linux,
      Self::Windows => Platform::Windows,
      Self::Darwin => Platform::Darwin,
    }
  }

  pub fn as_str(&self) -> &'static str {
    self.native_platform().as_str()
  }
}

impl fmt::Display for Host {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
