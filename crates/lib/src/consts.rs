/// Default project configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "buildmatrix.toml";

/// Default backend program.
pub const DEFAULT_BACKEND_PROGRAM: &str = "cmake";

/// Default backend generator.
pub const DEFAULT_GENERATOR: &str = "Ninja";

/// Toolchain file extension appended to a toolchain name.
pub const TOOLCHAIN_FILE_EXT: &str = "cmake";

/// Exit code reported for configuration failures and killed stages.
pub const CONFIGURATION_FAILURE_CODE: i32 = -1;
