//! Build command integration tests against the stub backend.

#![cfg(target_os = "linux")]

use predicates::prelude::*;

use super::common::TestProject;

#[test]
fn failing_release_reports_one_failure() {
  let project = TestProject::new(&["linux"]);

  project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--all"])
    .env("STUB_FAIL_PATTERN", "--build */release")
    .env("STUB_FAIL_CODE", "2")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("failed (2)"))
    .stdout(predicate::str::contains("1/2 succeeded, 1 failed"));

  let calls = project.calls();
  // debug: configure + build, release: configure + failing build
  assert_eq!(calls.len(), 4);
  assert!(calls[0].contains("-DBUILD_DEBUG=true"));
  assert!(calls[2].contains("-DBUILD_DEBUG=false"));
}

#[test]
fn fail_fast_stops_before_next_combination() {
  let project = TestProject::new(&["linux"]);

  project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--all", "--fail-fast"])
    .env("STUB_FAIL_PATTERN", "x86_64/debug")
    .env("STUB_FAIL_CODE", "3")
    .assert()
    .code(3)
    .stdout(predicate::str::contains("0/1 succeeded, 1 failed, 1 skipped"));

  assert!(project.calls().iter().all(|c| !c.contains("release")));
}

#[test]
fn install_and_package_run_after_build() {
  let project = TestProject::new(&["linux"]);

  project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--release", "--install", "--package", "--no-clang-tidy"])
    .assert()
    .success();

  let calls = project.calls();
  assert_eq!(calls.len(), 4);
  assert!(calls[0].contains("-DDO_CLANG_TIDY=false"));
  assert!(calls[1].starts_with("--build"));
  assert!(calls[2].starts_with("--install"));
  assert!(calls[3].contains("--target package"));
}

#[test]
fn trailing_arguments_reach_configure() {
  let project = TestProject::new(&["linux"]);

  project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--extra-args=-DFOO=1", "--", "-DBAR=2"])
    .assert()
    .success();

  let configure = &project.calls()[0];
  assert!(configure.contains("-DFOO=1 -DBAR=2"));
}

#[test]
fn async_build_captures_stage_logs() {
  let project = TestProject::new(&["linux"]);

  let output = project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--all", "--build-async", "--jobs", "2", "--output", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["results"].as_array().unwrap().len(), 2);
  assert_eq!(report["results"][0]["combination"]["build_type"], "debug");
  assert_eq!(report["skipped"], 0);

  for build_type in ["debug", "release"] {
    let log = project.build_dir("x86_64", build_type).join("logs").join("configure.log");
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("stub ok"), "log was: {}", content);
  }
}

#[test]
fn missing_toolchain_file_fails_without_invoking_backend() {
  let project = TestProject::new(&[]);

  project
    .buildmatrix_cmd()
    .args(["build", "--linux", "--x86_64", "--all"])
    .assert()
    .code(2)
    .stdout(predicate::str::contains("failed (configuration:"));

  assert!(project.calls().is_empty());
}

#[test]
fn unbuildable_targets_are_pruned() {
  let project = TestProject::new(&["linux"]);

  project
    .buildmatrix_cmd()
    .args(["build", "--darwin", "--x86_64"])
    .assert()
    .success()
    .stderr(predicate::str::contains("No combinations to build"));

  assert!(project.calls().is_empty());
}
