use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matrix::types::InputError;

/// CPU architecture variants a build can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
  #[serde(rename = "x86_64")]
  X86_64,
  #[serde(rename = "amd64")]
  Amd64,
  #[serde(rename = "arm")]
  Arm,
  #[serde(rename = "arm64")]
  Arm64,
}

impl Arch {
  pub const ALL: [Arch; 4] = [Self::X86_64, Self::Amd64, Self::Arm, Self::Arm64];

  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Amd64 => "amd64",
      Self::Arm => "arm",
      Self::Arm64 => "arm64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = InputError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|a| a.as_str() == s)
      .ok_or_else(|| InputError::UnknownArch(s.to_string()))
  }
}
