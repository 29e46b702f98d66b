//! Build backend invocation.
//!
//! The backend is an external program driven through up to four stages per
//! combination: configure, build, install and package.

pub mod driver;
pub mod env;
pub mod runner;
pub mod stage;

pub use driver::{BackendDriver, BackendSettings, DriverOptions};
pub use env::{EnvOverlay, HostEnv, LlvmPaths};
pub use runner::{ProcessRunner, StageRunner};
pub use stage::{Stage, StageCommand, StageOutcome};
