//! Build execution module.
//!
//! This module runs an expanded build matrix against a backend driver. It
//! handles:
//! - Sequential or bounded-parallel dispatch
//! - Fail-fast: no new dispatches after the first failure
//! - Per-combination timing
//! - Isolation of errors and panics to the combination that raised them

pub mod types;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::backend::{BackendDriver, StageRunner};
use crate::matrix::Combination;
use crate::platform::{ToolchainDescriptor, ToolchainTable};
use crate::report::RunReport;

pub use types::{BuildResult, BuildStatus, ExecuteError, FailureCause, RunOptions};

/// Execute every combination and collect a report.
///
/// With `max_parallelism == 1` combinations run one after another in the
/// given order; under fail-fast the run stops right after the first failure.
///
/// Otherwise up to `max_parallelism` combinations build at once. Under
/// fail-fast, once a failure is observed no further combinations are
/// dispatched, but builds already running are allowed to finish. Combinations
/// never dispatched are left out of the report and counted in
/// [`RunReport::skipped`].
///
/// Toolchains come from `toolchains`, resolved once per target platform
/// before expansion.
pub async fn run<R: StageRunner>(
  driver: Arc<BackendDriver<R>>,
  toolchains: &ToolchainTable,
  combinations: Vec<Combination>,
  options: &RunOptions,
) -> RunReport {
  info!(
    combinations = combinations.len(),
    parallelism = options.max_parallelism,
    fail_fast = options.fail_fast,
    "starting build execution"
  );

  if toolchains.host() != driver.host() {
    warn!(
      toolchains = %toolchains.host(),
      driver = %driver.host(),
      "toolchains were resolved for a different host"
    );
  }

  let started = Instant::now();

  let (results, skipped, aborted_by) = if options.max_parallelism <= 1 {
    run_sequential(driver, toolchains, combinations, options.fail_fast).await
  } else {
    run_concurrent(driver, toolchains, combinations, options).await
  };

  if skipped > 0 {
    warn!(skipped, "combinations not attempted after failure");
  }

  let report = RunReport::aggregate(results, skipped, aborted_by, started.elapsed());

  info!(
    succeeded = report.successes().count(),
    failed = report.failure_count(),
    skipped = report.skipped,
    "build execution complete"
  );

  report
}

type Collected = (Vec<BuildResult>, usize, Option<usize>);

async fn run_sequential<R: StageRunner>(
  driver: Arc<BackendDriver<R>>,
  toolchains: &ToolchainTable,
  combinations: Vec<Combination>,
  fail_fast: bool,
) -> Collected {
  let total = combinations.len();
  let mut results = Vec::with_capacity(total);

  for (ordinal, combination) in combinations.into_iter().enumerate() {
    let toolchain = toolchains.descriptor(combination.platform);
    let result = run_one(driver.clone(), ordinal, combination, toolchain).await;
    let failed = !result.status.is_success();
    results.push(result);

    if fail_fast && failed {
      return (results, total - ordinal - 1, Some(ordinal));
    }
  }

  (results, 0, None)
}

async fn run_concurrent<R: StageRunner>(
  driver: Arc<BackendDriver<R>>,
  toolchains: &ToolchainTable,
  combinations: Vec<Combination>,
  options: &RunOptions,
) -> Collected {
  let semaphore = Arc::new(Semaphore::new(options.max_parallelism));
  let mut join_set = JoinSet::new();
  let mut pending = combinations.into_iter().enumerate();
  let mut results = Vec::new();
  let mut aborted_by = None;

  loop {
    // Fill free worker slots unless a failure stopped dispatching
    while aborted_by.is_none() {
      let Ok(permit) = semaphore.clone().try_acquire_owned() else {
        break;
      };
      let Some((ordinal, combination)) = pending.next() else {
        break;
      };

      let driver = driver.clone();
      let toolchain = toolchains.descriptor(combination.platform);
      join_set.spawn(async move {
        let _permit = permit;
        run_one(driver, ordinal, combination, toolchain).await
      });
    }

    let Some(joined) = join_set.join_next().await else {
      break;
    };

    match joined {
      Ok(result) => {
        if options.fail_fast && aborted_by.is_none() && !result.status.is_success() {
          warn!(
            combination = %result.combination,
            in_flight = join_set.len(),
            "failure observed, draining in-flight builds"
          );
          aborted_by = Some(result.ordinal);
        }
        results.push(result);
      }
      // run_one isolates panics, so this only fires if the runtime is shutting down
      Err(e) => error!(error = %e, "build worker failed"),
    }
  }

  (results, pending.count(), aborted_by)
}

/// Drive one combination, timing it and turning errors and panics into a
/// crashed result.
async fn run_one<R: StageRunner>(
  driver: Arc<BackendDriver<R>>,
  ordinal: usize,
  combination: Combination,
  toolchain: Arc<ToolchainDescriptor>,
) -> BuildResult {
  info!(combination = %combination, "starting build");

  let started = Instant::now();
  let task_combination = combination.clone();
  let joined = tokio::spawn(async move { driver.execute(&task_combination, &toolchain).await }).await;
  let elapsed = started.elapsed();

  let status = match joined {
    Ok(Ok(status)) => status,
    Ok(Err(e)) => BuildStatus::Crashed {
      description: e.to_string(),
    },
    Err(e) => BuildStatus::Crashed {
      description: describe_join_error(e),
    },
  };

  match &status {
    BuildStatus::Success => info!(combination = %combination, elapsed = ?elapsed, "build succeeded"),
    BuildStatus::Failure { code, .. } => error!(combination = %combination, code, "build failed"),
    BuildStatus::Crashed { description } => error!(combination = %combination, error = %description, "build crashed"),
  }

  BuildResult {
    ordinal,
    combination,
    status,
    elapsed,
  }
}

fn describe_join_error(err: JoinError) -> String {
  if !err.is_panic() {
    return err.to_string();
  }

  let payload = err.into_panic();
  if let Some(message) = payload.downcast_ref::<&str>() {
    format!("panicked: {}", message)
  } else if let Some(message) = payload.downcast_ref::<String>() {
    format!("panicked: {}", message)
  } else {
    "panicked".to_string()
  }
}
