use std::io;
use std::path::PathBuf;

use dirs::config_dir;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name shared by the global and local configuration documents.
pub const CONFIG_FILE_NAME: &str = "ant.yml";

/// Directory below the user configuration directory holding the global document.
pub const GLOBAL_CONFIG_DIR: &str = "ant";

/// Name of the runtime selected as default when the configuration names none.
pub const FALLBACK_RUNTIME: &str = "Node";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Location of the global configuration document, when the platform has a
/// user configuration directory.
#[must_use]
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(CONFIG_FILE_NAME))
}

/// Location of the local configuration document in the working directory.
///
/// # Errors
///
/// Returns an error when the current working directory cannot be read.
pub fn local_config_path() -> io::Result<PathBuf> {
    std::env::current_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
