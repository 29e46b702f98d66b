//! Build matrix expansion.
//!
//! Turns a [`MatrixRequest`] into the ordered list of combinations to build:
//! - cross-product of platforms, architectures, build types and flag values
//! - pruning through an ordered [`RuleSet`]
//!
//! Output order is platform → arch → build type → flag assignment, so the
//! same request always yields the same sequence.

pub mod rules;
pub mod types;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::platform::Host;

pub use rules::{RuleSet, ValidityRule, Verdict};
pub use types::{BuildMode, BuildType, Combination, FeatureFlag, FlagDomain, InputError, MatrixRequest};

/// Expand a request into the legal combinations for `host`.
///
/// Dimension values are validated when the request is parsed, so expansion
/// itself cannot fail. An empty dimension yields an empty sequence. Each
/// combination appears at most once, even if the request repeats a value.
pub fn expand(request: &MatrixRequest, host: Host, rules: &RuleSet) -> Vec<Combination> {
  let assignments = flag_assignments(&request.flags, request.matrix_mode);

  let mut combinations = Vec::new();
  let mut seen = HashSet::new();
  let mut denied = 0usize;

  for platform in &request.platforms {
    for arch in &request.archs {
      for build_type in &request.build_types {
        for flags in &assignments {
          let candidate = Combination::new(*platform, *arch, *build_type, flags.clone());
          if seen.contains(&candidate) {
            debug!(combination = %candidate, "duplicate combination dropped");
            continue;
          }
          seen.insert(candidate.clone());
          match rules.evaluate(host, &candidate) {
            Ok(()) => combinations.push(candidate),
            Err((rule, reason)) => {
              debug!(combination = %candidate, rule, reason = %reason, "combination denied");
              denied += 1;
            }
          }
        }
      }
    }
  }

  info!(
    candidates = combinations.len() + denied,
    accepted = combinations.len(),
    denied,
    "expanded build matrix"
  );

  combinations
}

/// Every assignment of the flags' values, first flag outermost.
fn flag_assignments(flags: &[FeatureFlag], matrix_mode: bool) -> Vec<BTreeMap<String, bool>> {
  let mut assignments = vec![BTreeMap::new()];

  for flag in flags {
    let values = flag.values(matrix_mode);
    assignments = assignments
      .into_iter()
      .flat_map(|partial| {
        values.iter().map(move |value| {
          let mut next = partial.clone();
          next.insert(flag.name.clone(), *value);
          next
        })
      })
      .collect();
  }

  assignments
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::matrix::types::{FLAG_AVX2, FLAG_LLVM_UNWIND, FLAG_SANITIZERS};
  use crate::platform::{Arch, Platform, ToolchainResolver};
  use std::sync::Arc;

  fn matrix_flags() -> Vec<FeatureFlag> {
    vec![
      FeatureFlag::matrix(FLAG_AVX2),
      FeatureFlag::matrix(FLAG_SANITIZERS),
      FeatureFlag::matrix(FLAG_LLVM_UNWIND),
    ]
  }

  fn request(platforms: &[Platform], archs: &[Arch], build_types: &[BuildType]) -> MatrixRequest {
    MatrixRequest {
      platforms: platforms.to_vec(),
      archs: archs.to_vec(),
      build_types: build_types.to_vec(),
      flags: vec![],
      matrix_mode: false,
    }
  }

  #[test]
  fn count_is_product_without_flags() {
    let request = request(
      &[Platform::Linux, Platform::Mingw],
      &[Arch::X86_64, Arch::Arm64, Arch::Arm],
      &BuildType::ALL,
    );
    let combinations = expand(&request, Host::Linux, &RuleSet::logical());
    assert_eq!(combinations.len(), 2 * 3 * 2);
  }

  #[test]
  fn count_excludes_denied_combinations() {
    // darwin is not buildable from linux
    let request = request(&[Platform::Linux, Platform::Darwin], &[Arch::X86_64], &BuildType::ALL);
    let toolchains = ToolchainResolver::new("/toolchains").table(Host::Linux, request.platforms.iter().copied());
    let rules = RuleSet::standard(Arc::new(toolchains));
    let combinations = expand(&request, Host::Linux, &rules);
    assert_eq!(combinations.len(), 2);
    assert!(combinations.iter().all(|c| c.platform == Platform::Linux));
  }

  #[test]
  fn order_is_platform_arch_build_type_flags() {
    let mut request = request(
      &[Platform::Linux, Platform::Windows],
      &[Arch::X86_64, Arch::Arm64],
      &[BuildType::Debug, BuildType::Release],
    );
    request.flags = vec![FeatureFlag::matrix(FLAG_AVX2)];
    request.matrix_mode = true;

    let combinations = expand(&request, Host::Linux, &RuleSet::new());
    let labels: Vec<String> = combinations.iter().map(|c| c.to_string()).collect();

    assert_eq!(labels.len(), 16);
    assert_eq!(labels[0], "linux-x86_64-debug [ENABLE_AVX2=false]");
    assert_eq!(labels[1], "linux-x86_64-debug [ENABLE_AVX2=true]");
    assert_eq!(labels[2], "linux-x86_64-release [ENABLE_AVX2=false]");
    assert_eq!(labels[4], "linux-arm64-debug [ENABLE_AVX2=false]");
    assert_eq!(labels[8], "windows-x86_64-debug [ENABLE_AVX2=false]");
  }

  #[test]
  fn flag_product_puts_first_flag_outermost() {
    let assignments = flag_assignments(&matrix_flags()[..2], true);
    let as_pairs: Vec<(bool, bool)> = assignments
      .iter()
      .map(|a| (a[FLAG_AVX2], a[FLAG_SANITIZERS]))
      .collect();
    assert_eq!(as_pairs, vec![(false, false), (false, true), (true, false), (true, true)]);
  }

  #[test]
  fn unwind_on_windows_is_always_excluded() {
    let mut request = request(&[Platform::Windows, Platform::Linux], &Arch::ALL, &BuildType::ALL);
    request.flags = matrix_flags();
    request.matrix_mode = true;

    let combinations = expand(&request, Host::Linux, &RuleSet::logical());

    assert!(!combinations.is_empty());
    assert!(
      !combinations
        .iter()
        .any(|c| c.platform == Platform::Windows && c.flag(FLAG_LLVM_UNWIND))
    );
    assert!(
      combinations
        .iter()
        .any(|c| c.platform == Platform::Linux && c.flag(FLAG_LLVM_UNWIND))
    );
  }

  #[test]
  fn sanitizers_in_release_are_always_excluded() {
    let mut request = request(&[Platform::Linux], &[Arch::X86_64, Arch::Arm64], &BuildType::ALL);
    request.flags = matrix_flags();
    request.matrix_mode = true;

    let combinations = expand(&request, Host::Linux, &RuleSet::logical());

    assert!(
      !combinations
        .iter()
        .any(|c| c.build_type == BuildType::Release && c.flag(FLAG_SANITIZERS))
    );
    // 2 archs * (debug: 8 assignments + release: 4 assignments)
    assert_eq!(combinations.len(), 2 * (8 + 4));
  }

  #[test]
  fn simple_mode_holds_flags_at_configured_value() {
    let mut request = request(&[Platform::Linux], &[Arch::X86_64], &BuildType::ALL);
    request.flags = vec![FeatureFlag::fixed(FLAG_AVX2, true), FeatureFlag::matrix(FLAG_SANITIZERS)];

    let combinations = expand(&request, Host::Linux, &RuleSet::logical());

    assert_eq!(combinations.len(), 2);
    assert!(combinations.iter().all(|c| c.flag(FLAG_AVX2) && !c.flag(FLAG_SANITIZERS)));
  }

  #[test]
  fn repeated_values_expand_once() {
    let request = request(&[Platform::Linux, Platform::Linux], &[Arch::X86_64], &[BuildType::Debug]);
    let combinations = expand(&request, Host::Linux, &RuleSet::logical());
    assert_eq!(combinations.len(), 1);
    assert_eq!(combinations[0].to_string(), "linux-x86_64-debug");

    let parsed = MatrixRequest::parse("linux,linux", "x86_64", &BuildMode::Types(vec![BuildType::Debug]), vec![]).unwrap();
    assert_eq!(expand(&parsed, Host::Linux, &RuleSet::logical()), combinations);
  }

  #[test]
  fn empty_dimension_yields_empty_sequence() {
    let request = request(&[Platform::Linux], &[], &BuildType::ALL);
    assert!(expand(&request, Host::Linux, &RuleSet::logical()).is_empty());
  }

  #[test]
  fn expansion_is_idempotent() {
    let mut request = request(&Platform::ALL, &Arch::ALL, &BuildType::ALL);
    request.flags = matrix_flags();
    request.matrix_mode = true;
    let toolchains = ToolchainResolver::new("/toolchains").table(Host::Linux, Platform::ALL);
    let rules = RuleSet::standard(Arc::new(toolchains));

    let first = expand(&request, Host::Linux, &rules);
    let second = expand(&request, Host::Linux, &rules);
    assert_eq!(first, second);
  }
}
