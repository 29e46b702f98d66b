//! End-to-end orchestration through the public API.

use std::sync::Arc;

use buildmatrix_lib::backend::{DriverOptions, Stage};
use buildmatrix_lib::execute::{self, BuildStatus, FailureCause, RunOptions};
use buildmatrix_lib::matrix::types::{FLAG_LLVM_UNWIND, FLAG_SANITIZERS};
use buildmatrix_lib::matrix::{self, BuildMode, FeatureFlag, MatrixRequest, RuleSet};
use buildmatrix_lib::platform::Host;
use buildmatrix_lib::report::format_duration;

use super::common::{Project, RecordingRunner};

#[tokio::test]
async fn linux_debug_and_release_with_failing_release() {
  let project = Project::new(&["linux"]);
  let request = MatrixRequest::parse("linux", "x86_64", &BuildMode::All, vec![]).unwrap();
  let toolchains = project.toolchains(Host::Linux, &request);
  let combinations = matrix::expand(&request, Host::Linux, &RuleSet::standard(toolchains.clone()));
  assert_eq!(combinations.len(), 2);

  let release = combinations[1].to_string();
  let runner = RecordingRunner::new().exit(&release, Stage::Build, 2);
  let driver = Arc::new(project.driver(runner, Host::Linux, DriverOptions::default()));

  let report = execute::run(driver.clone(), &toolchains, combinations, &RunOptions::default()).await;

  assert_eq!(report.results.len(), 2);
  assert_eq!(report.results[0].status, BuildStatus::Success);
  assert_eq!(
    report.results[1].status,
    BuildStatus::Failure {
      cause: FailureCause::Stage(Stage::Build),
      code: 2
    }
  );
  assert_eq!(report.exit_code(), 1);

  let rendered = report.render();
  assert!(rendered.contains("ok"));
  assert!(rendered.contains("failed (2)"));
  let totals = format!("1/2 succeeded, 1 failed in {}", format_duration(report.elapsed));
  assert!(rendered.ends_with(&totals));
}

#[tokio::test]
async fn matrix_mode_builds_into_separate_directories() {
  let project = Project::new(&["linux"]);
  let flags = vec![FeatureFlag::matrix(FLAG_SANITIZERS), FeatureFlag::matrix(FLAG_LLVM_UNWIND)];
  let request = MatrixRequest::parse("linux", "x86_64", &BuildMode::AllOptionsMatrix, flags).unwrap();
  let toolchains = project.toolchains(Host::Linux, &request);
  let combinations = matrix::expand(&request, Host::Linux, &RuleSet::standard(toolchains.clone()));

  // release drops the two sanitizer assignments
  assert_eq!(combinations.len(), 6);

  let driver = Arc::new(project.driver(RecordingRunner::new(), Host::Linux, DriverOptions::default()));
  let options = RunOptions {
    max_parallelism: 3,
    fail_fast: false,
  };
  let report = execute::run(driver.clone(), &toolchains, combinations, &options).await;

  assert!(report.is_success());

  let mut build_dirs: Vec<String> = driver
    .runner()
    .commands()
    .into_iter()
    .filter(|c| c.stage == Stage::Build)
    .map(|c| c.args[1].clone())
    .collect();
  build_dirs.sort();
  build_dirs.dedup();
  assert_eq!(build_dirs.len(), 6);
}

#[tokio::test]
async fn unpruned_unbuildable_target_reports_configuration_failure() {
  let project = Project::new(&["linux", "mingw"]);
  let request = MatrixRequest::parse("darwin,windows", "x86_64", &"debug".parse::<BuildMode>().unwrap(), vec![]).unwrap();

  let toolchains = project.toolchains(Host::Linux, &request);
  let pruned = matrix::expand(&request, Host::Linux, &RuleSet::standard(toolchains.clone()));
  assert_eq!(pruned.len(), 1);

  let combinations = matrix::expand(&request, Host::Linux, &RuleSet::logical());
  assert_eq!(combinations.len(), 2);

  let driver = Arc::new(project.driver(RecordingRunner::new(), Host::Linux, DriverOptions::default()));
  let report = execute::run(driver.clone(), &toolchains, combinations, &RunOptions::default()).await;

  assert!(matches!(
    report.results[0].status,
    BuildStatus::Failure {
      cause: FailureCause::Configuration(_),
      code: -1
    }
  ));
  assert!(report.results[1].status.is_success());

  let configure = &driver.runner().commands()[0];
  assert!(configure.args.iter().any(|a| a.ends_with("mingw.cmake")));
  assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn repeated_platform_builds_once_with_parallel_workers() {
  let project = Project::new(&["linux"]);
  let request = MatrixRequest::parse("linux,linux", "x86_64,x86_64", &BuildMode::All, vec![]).unwrap();
  let toolchains = project.toolchains(Host::Linux, &request);
  let combinations = matrix::expand(&request, Host::Linux, &RuleSet::standard(toolchains.clone()));
  assert_eq!(combinations.len(), 2);

  let driver = Arc::new(project.driver(RecordingRunner::new(), Host::Linux, DriverOptions::default()));
  let options = RunOptions {
    max_parallelism: 4,
    fail_fast: false,
  };
  let report = execute::run(driver.clone(), &toolchains, combinations, &options).await;

  assert!(report.is_success());
  let configures: Vec<_> = driver
    .runner()
    .commands()
    .into_iter()
    .filter(|c| c.stage == Stage::Configure)
    .map(|c| c.args[3].clone())
    .collect();
  assert_eq!(configures.len(), 2);
  assert_ne!(configures[0], configures[1]);
}
