//! Configuration for the Ant runtime.
//!
//! Configuration lives in YAML documents named `ant.yml`. A global document
//! under the user configuration directory is read first and a local one in
//! the working directory second; [`Config`] keeps both as ordered
//! [`ConfigLayer`]s so capabilities can be registered layer by layer with
//! the local layer winning by name. Scalar settings resolve to the last
//! layer that sets them.

mod defaults;
mod descriptor;
mod error;
mod layer;
mod logging;
mod ordered;

use std::path::Path;
use std::sync::Arc;

pub use defaults::{
    CONFIG_FILE_NAME, DEFAULT_LOG_FILTER, FALLBACK_RUNTIME, GLOBAL_CONFIG_DIR,
    default_log_filter, default_log_filter_string, default_log_format, global_config_path,
    local_config_path,
};
pub use descriptor::{
    FunctionDescriptor, HostDescriptor, RuntimeDescriptor, RuntimeReference, TemplateDescriptor,
};
pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use logging::{LogFormat, LogFormatParseError, LogSettings};
pub use ordered::OrderedMap;

/// Layered configuration: global first, local last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    layers: Vec<ConfigLayer>,
}

impl Config {
    /// Reads the global and local documents. Either may be absent, on disk
    /// or as an argument.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised by either document.
    pub fn load(global: Option<&Path>, local: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::with_capacity(2);
        for path in [global, local].into_iter().flatten() {
            if let Some(layer) = ConfigLayer::load(path)? {
                layers.push(layer);
            }
        }
        Ok(Self { layers })
    }

    /// Reads the documents at their default locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkingDirectory`] when the working directory
    /// is unavailable and any error raised by [`Config::load`].
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = local_config_path().map_err(|source| ConfigError::WorkingDirectory {
            source: Arc::new(source),
        })?;
        let global = global_config_path();
        Self::load(global.as_deref(), Some(&local))
    }

    /// Builds a configuration from already parsed layers, lowest precedence
    /// first.
    #[must_use]
    pub const fn from_layers(layers: Vec<ConfigLayer>) -> Self {
        Self { layers }
    }

    /// Layers in load order.
    #[must_use]
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Service name from the highest-precedence layer that sets one.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.layers.iter().rev().find_map(ConfigLayer::service)
    }

    /// Selected default runtime from the highest-precedence layer that sets one.
    #[must_use]
    pub fn runtime(&self) -> Option<&RuntimeReference> {
        self.layers.iter().rev().find_map(ConfigLayer::runtime)
    }

    /// Base path used for handler discovery: the one declared by the
    /// highest-precedence layer that declares one, else the directory of the
    /// highest-precedence layer.
    #[must_use]
    pub fn base_path(&self) -> Option<&Path> {
        self.layers
            .iter()
            .rev()
            .find_map(ConfigLayer::declared_base_path)
            .or_else(|| self.layers.last().map(ConfigLayer::base_path))
    }

    /// Effective log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.layers
            .iter()
            .rev()
            .find_map(ConfigLayer::log_filter)
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Effective log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.layers
            .iter()
            .rev()
            .find_map(ConfigLayer::log_format)
            .unwrap_or_else(default_log_format)
    }

    /// Effective logging settings.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.log_filter(), self.log_format())
    }
}

#[cfg(test)]
mod tests;
