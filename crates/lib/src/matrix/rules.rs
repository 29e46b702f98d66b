//! Validity rules.
//!
//! A rule is a pure predicate over (host, combination). Rules run in the
//! order they were added to a [`RuleSet`]; the first denial excludes the
//! combination.

use std::sync::Arc;

use crate::matrix::types::{BuildType, Combination, FLAG_LLVM_UNWIND, FLAG_SANITIZERS};
use crate::platform::{Host, Platform, ToolchainDescriptor, ToolchainTable};

/// Outcome of evaluating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Allow,
  Deny(String),
}

impl Verdict {
  pub fn is_allowed(&self) -> bool {
    matches!(self, Self::Allow)
  }
}

pub trait ValidityRule: Send + Sync {
  /// Short identifier used in logs.
  fn name(&self) -> &'static str;

  fn check(&self, host: Host, combination: &Combination) -> Verdict;
}

/// Denies combinations the host has no toolchain for.
pub struct HostFeasibility {
  toolchains: Arc<ToolchainTable>,
}

impl HostFeasibility {
  pub fn new(toolchains: Arc<ToolchainTable>) -> Self {
    Self { toolchains }
  }
}

impl ValidityRule for HostFeasibility {
  fn name(&self) -> &'static str {
    "host-feasibility"
  }

  fn check(&self, host: Host, combination: &Combination) -> Verdict {
    if host != self.toolchains.host() {
      return Verdict::Deny(format!("toolchains were resolved for {}, not {}", self.toolchains.host(), host));
    }
    match &*self.toolchains.descriptor(combination.platform) {
      ToolchainDescriptor::Unsupported { reason } => Verdict::Deny(reason.clone()),
      _ => Verdict::Allow,
    }
  }
}

/// LLVM's unwinder is unavailable on Windows targets.
pub struct NoLlvmUnwindOnWindows;

impl ValidityRule for NoLlvmUnwindOnWindows {
  fn name(&self) -> &'static str {
    "no-llvm-unwind-on-windows"
  }

  fn check(&self, _host: Host, combination: &Combination) -> Verdict {
    if combination.platform == Platform::Windows && combination.flag(FLAG_LLVM_UNWIND) {
      Verdict::Deny(format!("{} is not supported on windows", FLAG_LLVM_UNWIND))
    } else {
      Verdict::Allow
    }
  }
}

/// Sanitizers are only built in debug.
pub struct NoSanitizersInRelease;

impl ValidityRule for NoSanitizersInRelease {
  fn name(&self) -> &'static str {
    "no-sanitizers-in-release"
  }

  fn check(&self, _host: Host, combination: &Combination) -> Verdict {
    if combination.build_type == BuildType::Release && combination.flag(FLAG_SANITIZERS) {
      Verdict::Deny(format!("{} is not allowed in release builds", FLAG_SANITIZERS))
    } else {
      Verdict::Allow
    }
  }
}

/// An ordered collection of validity rules.
#[derive(Default)]
pub struct RuleSet {
  rules: Vec<Box<dyn ValidityRule>>,
}

impl RuleSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// The logical rules plus, first, the host feasibility rule.
  pub fn standard(toolchains: Arc<ToolchainTable>) -> Self {
    Self::new().with_rule(HostFeasibility::new(toolchains)).with_logical_rules()
  }

  /// Only the rules about contradictory option sets.
  pub fn logical() -> Self {
    Self::new().with_logical_rules()
  }

  fn with_logical_rules(self) -> Self {
    self.with_rule(NoLlvmUnwindOnWindows).with_rule(NoSanitizersInRelease)
  }

  pub fn with_rule(mut self, rule: impl ValidityRule + 'static) -> Self {
    self.rules.push(Box::new(rule));
    self
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Evaluate every rule in order, returning the first denial.
  pub fn evaluate(&self, host: Host, combination: &Combination) -> Result<(), (&'static str, String)> {
    for rule in &self.rules {
      if let Verdict::Deny(reason) = rule.check(host, combination) {
        return Err((rule.name(), reason));
      }
    }
    Ok(())
  }
}
