//! Hosts and the providers serving them.

use std::sync::Arc;

use serde_json::Value;

use crate::identity::AntId;

/// A deployment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    ant: AntId,
    name: String,
}

impl Provider {
    /// Creates a provider.
    #[must_use]
    pub fn new(ant: AntId, name: impl Into<String>) -> Self {
        Self {
            ant,
            name: name.into(),
        }
    }

    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinator the provider was built against.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }
}

/// A deployment target served by a [`Provider`].
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    ant: AntId,
    name: String,
    provider: Arc<Provider>,
    config: Value,
}

impl Host {
    /// Creates a host served by `provider`.
    #[must_use]
    pub fn new(ant: AntId, name: impl Into<String>, provider: Arc<Provider>) -> Self {
        Self {
            ant,
            name: name.into(),
            provider,
            config: Value::Null,
        }
    }

    /// Provider-specific settings.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Host name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinator the host was built against.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Provider serving the host.
    #[must_use]
    pub const fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    /// Provider-specific settings; `null` when none were given.
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }
}
