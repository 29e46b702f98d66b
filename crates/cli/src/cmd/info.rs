use std::path::Path;

use anyhow::Result;
use serde_json::json;

use buildmatrix_lib::config::ProjectConfig;
use buildmatrix_lib::platform::default_workers;

use crate::cmd::detect_host;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(config_path: &Path, output: OutputFormat) -> Result<i32> {
  let host = detect_host()?;
  let config = ProjectConfig::load_or_default(config_path)?;
  let toolchains_dir = config.toolchains_dir();
  let toolchains_dir = dunce::canonicalize(&toolchains_dir).unwrap_or(toolchains_dir);

  if output.is_json() {
    print_json(&json!({
      "host": { "platform": host.os.native_platform(), "arch": host.arch },
      "default_workers": default_workers(),
      "project": config.project,
      "toolchains_dir": toolchains_dir,
    }))?;
    return Ok(0);
  }

  println!("Host:");
  print_stat("Platform", host.os.as_str());
  print_stat("Arch", host.arch.as_str());
  print_stat("Default workers", &default_workers().to_string());

  println!("Project:");
  print_stat("Name", config.project.name.as_deref().unwrap_or("(unnamed)"));
  if let Some(version) = &config.project.version {
    print_stat("Version", version);
  }
  if let Some(description) = &config.project.description {
    print_stat("Description", description);
  }
  print_stat("Backend", &config.backend.program);
  print_stat("Toolchains", &toolchains_dir.display().to_string());

  Ok(0)
}
