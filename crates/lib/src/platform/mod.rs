pub mod arch;
pub mod os;
pub mod paths;
pub mod toolchain;

pub use arch::Arch;
pub use os::{Host, Platform};
pub use toolchain::{ToolchainDescriptor, ToolchainResolver, ToolchainTable};

use std::fmt;

/// Identity of the machine running the orchestrator (e.g., "linux-x86_64")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostIdentity {
  pub os: Host,
  pub arch: Arch,
}

impl HostIdentity {
  pub fn new(os: Host, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the current host at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Host::current()?,
      arch: Arch::current()?,
    })
  }
}

impl fmt::Display for HostIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.os, self.arch)
  }
}

/// Returns the number of workers used for concurrent builds: half the
/// available hardware parallelism, at least one.
pub fn default_workers() -> usize {
  let cpus = std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
  (cpus / 2).max(1)
}
