//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Stub backend: records each invocation and fails any stage whose
/// arguments match `$STUB_FAIL_PATTERN` with `$STUB_FAIL_CODE`.
const STUB_BACKEND: &str = r#"#!/bin/sh
echo "$*" >> "$STUB_CALLS"
if [ -n "$STUB_FAIL_PATTERN" ]; then
  case "$*" in
    *$STUB_FAIL_PATTERN*) echo "stub failure" >&2; exit "${STUB_FAIL_CODE:-1}" ;;
  esac
fi
echo "stub ok"
exit 0
"#;

/// Isolated project directory with a stub backend and toolchain files.
pub struct TestProject {
  pub temp: TempDir,
  root: PathBuf,
}

impl TestProject {
  /// Create a project whose toolchains directory holds `toolchains`.
  pub fn new(toolchains: &[&str]) -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let project = Self { temp, root };

    let backend = project.path().join("backend.sh");
    project.write_file("backend.sh", STUB_BACKEND);
    make_executable(&backend);

    for name in toolchains {
      project.write_file(&format!("toolchains/{}.cmake", name), "");
    }

    project.write_file(
      "buildmatrix.toml",
      &format!(
        "[project]\nname = \"stub\"\n\n[backend]\nprogram = \"{}\"\ntoolchains_dir = \"toolchains\"\n",
        backend.display()
      ),
    );

    project
  }

  pub fn path(&self) -> &Path {
    &self.root
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn calls_path(&self) -> PathBuf {
    self.path().join("calls.log")
  }

  /// Every recorded backend invocation, one per line.
  pub fn calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.calls_path())
      .unwrap_or_default()
      .lines()
      .map(String::from)
      .collect()
  }

  /// Build directory for a linux combination without enabled flags.
  pub fn build_dir(&self, arch: &str, build_type: &str) -> PathBuf {
    self.path().join("out").join("build").join("linux").join(arch).join(build_type)
  }

  /// A pre-configured Command for the buildmatrix binary.
  pub fn buildmatrix_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("buildmatrix");
    cmd.current_dir(self.path());
    cmd.env("STUB_CALLS", self.calls_path());
    cmd.env_remove("STUB_FAIL_PATTERN");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
