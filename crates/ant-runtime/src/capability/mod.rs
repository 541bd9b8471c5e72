//! Capabilities contributed by plugins and configuration.
//!
//! A [`Capability`] is one named, registrable unit: an invocable function
//! or runtime, or a data-bearing host, provider or template. Plugins hand
//! back heterogeneous lists of capabilities; registries keep the elements of
//! their own kind.

use std::fmt;
use std::sync::Arc;

use crate::function::{AntFunction, Runtime};
use crate::host::{Host, Provider};
use crate::identity::AntId;
use crate::template::Template;

/// The kind of a [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// An invocable function.
    Function,
    /// An interpreter for handler files.
    Runtime,
    /// A deployment target.
    Host,
    /// A host provider.
    Provider,
    /// A file template.
    Template,
}

impl CapabilityKind {
    /// Lower-case label used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Runtime => "runtime",
            Self::Host => "host",
            Self::Provider => "provider",
            Self::Template => "template",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capability of any kind.
#[derive(Debug, Clone)]
pub enum Capability {
    /// An invocable function.
    Function(Arc<dyn AntFunction>),
    /// A runtime; also accepted wherever a function is expected.
    Runtime(Arc<Runtime>),
    /// A host.
    Host(Arc<Host>),
    /// A provider.
    Provider(Arc<Provider>),
    /// A template.
    Template(Arc<Template>),
}

impl Capability {
    /// Kind of the wrapped capability.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        match self {
            Self::Function(_) => CapabilityKind::Function,
            Self::Runtime(_) => CapabilityKind::Runtime,
            Self::Host(_) => CapabilityKind::Host,
            Self::Provider(_) => CapabilityKind::Provider,
            Self::Template(_) => CapabilityKind::Template,
        }
    }

    /// Name of the wrapped capability.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function(function) => function.name(),
            Self::Runtime(runtime) => runtime.name(),
            Self::Host(host) => host.name(),
            Self::Provider(provider) => provider.name(),
            Self::Template(template) => template.name(),
        }
    }

    /// Coordinator the capability was built against.
    #[must_use]
    pub fn ant(&self) -> AntId {
        match self {
            Self::Function(function) => function.ant(),
            Self::Runtime(runtime) => runtime.ant(),
            Self::Host(host) => host.ant(),
            Self::Provider(provider) => provider.ant(),
            Self::Template(template) => template.ant(),
        }
    }

    /// The capability as an invocable function; runtimes qualify.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for data-bearing capabilities.
    pub fn into_function(self) -> Result<Arc<dyn AntFunction>, Self> {
        match self {
            Self::Function(function) => Ok(function),
            Self::Runtime(runtime) => Ok(runtime),
            other => Err(other),
        }
    }

    /// The capability as a runtime.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for every other kind.
    pub fn into_runtime(self) -> Result<Arc<Runtime>, Self> {
        match self {
            Self::Runtime(runtime) => Ok(runtime),
            other => Err(other),
        }
    }

    /// The capability as a host.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for every other kind.
    pub fn into_host(self) -> Result<Arc<Host>, Self> {
        match self {
            Self::Host(host) => Ok(host),
            other => Err(other),
        }
    }

    /// The capability as a provider.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for every other kind.
    pub fn into_provider(self) -> Result<Arc<Provider>, Self> {
        match self {
            Self::Provider(provider) => Ok(provider),
            other => Err(other),
        }
    }

    /// The capability as a template.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged for every other kind.
    pub fn into_template(self) -> Result<Arc<Template>, Self> {
        match self {
            Self::Template(template) => Ok(template),
            other => Err(other),
        }
    }
}

impl From<Arc<dyn AntFunction>> for Capability {
    fn from(function: Arc<dyn AntFunction>) -> Self {
        Self::Function(function)
    }
}

impl From<Arc<Runtime>> for Capability {
    fn from(runtime: Arc<Runtime>) -> Self {
        Self::Runtime(runtime)
    }
}

impl From<Arc<Host>> for Capability {
    fn from(host: Arc<Host>) -> Self {
        Self::Host(host)
    }
}

impl From<Arc<Provider>> for Capability {
    fn from(provider: Arc<Provider>) -> Self {
        Self::Provider(provider)
    }
}

impl From<Arc<Template>> for Capability {
    fn from(template: Arc<Template>) -> Self {
        Self::Template(template)
    }
}

#[cfg(test)]
mod tests;
