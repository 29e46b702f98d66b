//! Types for backend execution.
//!
//! This module defines the error type, per-combination status and result
//! types, and the coordinator's run options.

use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::backend::Stage;
use crate::matrix::Combination;

/// Errors raised while driving one combination.
///
/// These never abort sibling combinations: the coordinator turns them into
/// [`BuildStatus::Crashed`].
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The backend process could not be started.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// A stage log could not be written.
  #[error("failed to write log {path}: {message}")]
  WriteLog { path: String, message: String },

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Why a combination failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
  /// No usable toolchain; no process was started.
  Configuration(String),
  /// A stage exited non-zero.
  Stage(Stage),
  /// A stage exceeded the configured timeout and was killed.
  Timeout(Stage),
}

/// Outcome of one combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildStatus {
  Success,
  Failure { cause: FailureCause, code: i32 },
  Crashed { description: String },
}

impl BuildStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, Self::Success)
  }

  /// Exit code carried by a failure.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      Self::Failure { code, .. } => Some(*code),
      _ => None,
    }
  }

  /// Short status text for tables (`ok`, `failed (2)`, `crashed (..)`).
  pub fn label(&self) -> String {
    match self {
      Self::Success => "ok".to_string(),
      Self::Failure {
        cause: FailureCause::Configuration(reason),
        ..
      } => format!("failed (configuration: {})", reason),
      Self::Failure {
        cause: FailureCause::Timeout(stage),
        ..
      } => format!("failed ({} timed out)", stage),
      Self::Failure { code, .. } => format!("failed ({})", code),
      Self::Crashed { description } => format!("crashed ({})", description),
    }
  }
}

/// Result of building one combination.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
  /// Position of the combination in expansion order.
  pub ordinal: usize,
  pub combination: Combination,
  #[serde(flatten)]
  pub status: BuildStatus,
  #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
  pub elapsed: Duration,
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
  /// Maximum number of combinations building at once. `1` runs sequentially.
  pub max_parallelism: usize,

  /// Stop dispatching after the first non-successful result.
  pub fail_fast: bool,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      max_parallelism: 1,
      fail_fast: false,
    }
  }
}

pub(crate) fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_f64(duration.as_secs_f64())
}
