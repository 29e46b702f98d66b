mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use buildmatrix_lib::config::ConfigError;
use buildmatrix_lib::consts::CONFIG_FILE_NAME;
use buildmatrix_lib::matrix::InputError;

use cmd::{BuildArgs, SelectionArgs, cmd_build, cmd_info, cmd_plan};
use output::{OutputFormat, print_error};

/// Exit status when the configuration file cannot be loaded.
const CONFIG_ERROR_EXIT: u8 = 5;

/// Shorthand flags rewritten before parsing.
const ALIASES: &[(&str, &str)] = &[
  ("--release", "--build-mode=release"),
  ("--debug", "--build-mode=debug"),
  ("--all", "--build-mode=all"),
  ("--windows", "--target-platforms=windows"),
  ("--linux", "--target-platforms=linux"),
  ("--darwin", "--target-platforms=darwin"),
  ("--x86_64", "--target-archs=x86_64"),
  ("--amd64", "--target-archs=amd64"),
  ("--arm64", "--target-archs=arm64"),
];

/// buildmatrix - multi-platform native build orchestrator
#[derive(Parser)]
#[command(name = "buildmatrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the project configuration
  #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
  config: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every selected combination
  Build(BuildArgs),

  /// List the combinations a build would run (dry-run)
  Plan {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show host and project information
  Info {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse_from(expand_aliases(std::env::args()));

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build(args) => cmd_build(args, &cli.config, cli.verbose),
    Commands::Plan { selection, output } => cmd_plan(&selection, &cli.config, output),
    Commands::Info { output } => cmd_info(&cli.config, output),
  };

  match result {
    Ok(code) => ExitCode::from(clamp_status(code)),
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::from(error_status(&err))
    }
  }
}

/// Rewrite alias flags; everything after `--` is passed through untouched.
fn expand_aliases(args: impl IntoIterator<Item = String>) -> Vec<String> {
  let mut passthrough = false;
  args
    .into_iter()
    .map(|arg| {
      if passthrough {
        return arg;
      }
      if arg == "--" {
        passthrough = true;
        return arg;
      }
      ALIASES
        .iter()
        .find(|(alias, _)| *alias == arg)
        .map(|(_, expanded)| expanded.to_string())
        .unwrap_or(arg)
    })
    .collect()
}

/// Map an error to its process exit status.
fn error_status(err: &anyhow::Error) -> u8 {
  for cause in err.chain() {
    if let Some(input) = cause.downcast_ref::<InputError>() {
      return clamp_status(input.exit_code());
    }
    if cause.downcast_ref::<ConfigError>().is_some() {
      return CONFIG_ERROR_EXIT;
    }
  }
  1
}

fn clamp_status(code: i32) -> u8 {
  match code {
    0 => 0,
    c if c < 0 => 1,
    c => u8::try_from(c).unwrap_or(u8::MAX),
  }
}
