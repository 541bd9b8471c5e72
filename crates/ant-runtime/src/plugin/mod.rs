//! Plugins and their loading.
//!
//! A [`Plugin`] contributes capabilities through five accessors. Each may
//! fail or panic; the [`PluginLoader`] reads them through a guard that turns
//! either into a recorded error and an empty result. Plugins are built by a
//! [`PluginFactory`], found in a [`PluginCatalog`] when a descriptor names
//! one by identifier.

mod descriptor;
mod loader;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::capability::Capability;
use crate::identity::AntId;

pub use self::descriptor::{PluginDescriptor, PluginReference};
pub use self::loader::{PluginFeed, PluginLoader};

/// Failure reported by plugin code.
pub type PluginFault = Box<dyn std::error::Error + Send + Sync>;

/// Result of a plugin capability accessor.
pub type CapabilityList = Result<Vec<Capability>, PluginFault>;

/// A unit contributing capabilities to one coordinator.
///
/// Every accessor has a default: the name falls back to the concrete type
/// name and the capability lists are empty.
pub trait Plugin: Send + Sync + 'static {
    /// Coordinator the plugin was built against.
    fn ant(&self) -> AntId;

    /// Plugin name.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader then uses [`Plugin::type_name`].
    fn name(&self) -> Result<String, PluginFault> {
        Ok(self.type_name().to_owned())
    }

    /// Functions contributed by the plugin.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn functions(&self) -> CapabilityList {
        Ok(Vec::new())
    }

    /// Runtimes contributed by the plugin.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn runtimes(&self) -> CapabilityList {
        Ok(Vec::new())
    }

    /// Hosts contributed by the plugin.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn hosts(&self) -> CapabilityList {
        Ok(Vec::new())
    }

    /// Providers contributed by the plugin.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn providers(&self) -> CapabilityList {
        Ok(Vec::new())
    }

    /// Templates contributed by the plugin.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn templates(&self) -> CapabilityList {
        Ok(Vec::new())
    }

    /// Bare name of the implementing type.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("type", &self.type_name())
            .field("ant", &self.ant())
            .finish()
    }
}

/// Strips the module path and generic arguments from a type name.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// The capability accessors of a [`Plugin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    /// [`Plugin::functions`].
    Functions,
    /// [`Plugin::runtimes`].
    Runtimes,
    /// [`Plugin::hosts`].
    Hosts,
    /// [`Plugin::providers`].
    Providers,
    /// [`Plugin::templates`].
    Templates,
}

impl Member {
    /// Accessor name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Functions => "functions",
            Self::Runtimes => "runtimes",
            Self::Hosts => "hosts",
            Self::Providers => "providers",
            Self::Templates => "templates",
        }
    }

    /// Calls the accessor on `plugin`.
    ///
    /// # Errors
    ///
    /// Propagates the accessor's failure.
    pub fn read(self, plugin: &dyn Plugin) -> CapabilityList {
        match self {
            Self::Functions => plugin.functions(),
            Self::Runtimes => plugin.runtimes(),
            Self::Hosts => plugin.hosts(),
            Self::Providers => plugin.providers(),
            Self::Templates => plugin.templates(),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds plugins for a coordinator.
pub trait PluginFactory: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Builds a plugin owned by `ant`, configured with `config`.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the loader records the failure.
    fn create(&self, ant: AntId, config: Option<&Value>) -> Result<Arc<dyn Plugin>, PluginFault>;
}

impl fmt::Debug for dyn PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("name", &self.name())
            .finish()
    }
}

/// A [`PluginFactory`] backed by a closure.
pub struct FnFactory<F> {
    name: String,
    create: F,
}

impl<F> FnFactory<F>
where
    F: Fn(AntId, Option<&Value>) -> Result<Arc<dyn Plugin>, PluginFault> + Send + Sync,
{
    /// Wraps `create` under `name`.
    pub fn new(name: impl Into<String>, create: F) -> Self {
        Self {
            name: name.into(),
            create,
        }
    }
}

impl<F> PluginFactory for FnFactory<F>
where
    F: Fn(AntId, Option<&Value>) -> Result<Arc<dyn Plugin>, PluginFault> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, ant: AntId, config: Option<&Value>) -> Result<Arc<dyn Plugin>, PluginFault> {
        (self.create)(ant, config)
    }
}

/// Maps plugin identifiers, as written in configuration, to factories.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identifiers: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        f.debug_struct("PluginCatalog")
            .field("identifiers", &identifiers)
            .finish()
    }
}

impl PluginCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `identifier`, replacing any previous one.
    pub fn register(&mut self, identifier: impl Into<String>, factory: Arc<dyn PluginFactory>) {
        self.factories.insert(identifier.into(), factory);
    }

    /// Builder form of [`PluginCatalog::register`].
    #[must_use]
    pub fn with_factory(
        mut self,
        identifier: impl Into<String>,
        factory: Arc<dyn PluginFactory>,
    ) -> Self {
        self.register(identifier, factory);
        self
    }

    /// Looks up the factory registered under `identifier`.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<Arc<dyn PluginFactory>> {
        self.factories.get(identifier).cloned()
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` when no identifiers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
