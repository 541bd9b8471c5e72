//! Capability registries.
//!
//! A [`Registry`] maps names to capabilities with last-write-wins
//! semantics and rejects items built for another coordinator. It is
//! instantiated for functions, hosts, providers and templates; runtimes
//! get the versioned [`RuntimeRegistry`]. Registries attach to a
//! [`PluginLoader`]'s feed and pull their capabilities off every plugin it
//! publishes, including those published before they attached.

mod function;
mod runtime;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use tracing::debug;

use crate::capability::{Capability, CapabilityKind};
use crate::error::AntError;
use crate::function::{AntFunction, Runtime};
use crate::host::{Host, Provider};
use crate::identity::AntId;
use crate::plugin::{Member, Plugin, PluginLoader};
use crate::template::Template;

pub use self::runtime::RuntimeRegistry;

/// Tracing target for registry operations.
const REGISTRY_TARGET: &str = "ant_runtime::registry";

/// Registry of functions, keyed by name.
pub type FunctionRegistry = Registry<Arc<dyn AntFunction>>;
/// Registry of hosts, keyed by name.
pub type HostRegistry = Registry<Arc<Host>>;
/// Registry of providers, keyed by name.
pub type ProviderRegistry = Registry<Arc<Provider>>;
/// Registry of templates, keyed by category and name.
pub type TemplateRegistry = Registry<Arc<Template>>;

/// A capability handle that can be stored in a registry.
pub trait RegistryEntry: Clone + Send + Sync + 'static {
    /// Lookup key.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Kind reported when a plugin returns something else.
    const KIND: CapabilityKind;

    /// Plugin accessor supplying entries of this kind.
    const MEMBER: Member;

    /// Key the entry is stored under.
    fn key(&self) -> Self::Key;

    /// Coordinator the entry was built against.
    fn owner(&self) -> AntId;

    /// Description used in error messages.
    fn describe(&self) -> String;

    /// Extracts an entry from a capability of the matching kind.
    ///
    /// # Errors
    ///
    /// Returns the capability unchanged when its kind does not match.
    fn from_capability(capability: Capability) -> Result<Self, Capability>;
}

impl RegistryEntry for Arc<dyn AntFunction> {
    type Key = String;
    const KIND: CapabilityKind = CapabilityKind::Function;
    const MEMBER: Member = Member::Functions;

    fn key(&self) -> String {
        self.name().to_owned()
    }

    fn owner(&self) -> AntId {
        self.ant()
    }

    fn describe(&self) -> String {
        format!("function '{}'", self.name())
    }

    fn from_capability(capability: Capability) -> Result<Self, Capability> {
        capability.into_function()
    }
}

impl RegistryEntry for Arc<Runtime> {
    type Key = String;
    const KIND: CapabilityKind = CapabilityKind::Runtime;
    const MEMBER: Member = Member::Runtimes;

    fn key(&self) -> String {
        self.name().to_owned()
    }

    fn owner(&self) -> AntId {
        self.ant()
    }

    fn describe(&self) -> String {
        format!("runtime '{} {}'", self.name(), self.version())
    }

    fn from_capability(capability: Capability) -> Result<Self, Capability> {
        capability.into_runtime()
    }
}

impl RegistryEntry for Arc<Host> {
    type Key = String;
    const KIND: CapabilityKind = CapabilityKind::Host;
    const MEMBER: Member = Member::Hosts;

    fn key(&self) -> String {
        self.name().to_owned()
    }

    fn owner(&self) -> AntId {
        self.ant()
    }

    fn describe(&self) -> String {
        format!("host '{}'", self.name())
    }

    fn from_capability(capability: Capability) -> Result<Self, Capability> {
        capability.into_host()
    }
}

impl RegistryEntry for Arc<Provider> {
    type Key = String;
    const KIND: CapabilityKind = CapabilityKind::Provider;
    const MEMBER: Member = Member::Providers;

    fn key(&self) -> String {
        self.name().to_owned()
    }

    fn owner(&self) -> AntId {
        self.ant()
    }

    fn describe(&self) -> String {
        format!("provider '{}'", self.name())
    }

    fn from_capability(capability: Capability) -> Result<Self, Capability> {
        capability.into_provider()
    }
}

impl RegistryEntry for Arc<Template> {
    type Key = (String, String);
    const KIND: CapabilityKind = CapabilityKind::Template;
    const MEMBER: Member = Member::Templates;

    fn key(&self) -> (String, String) {
        (self.category().to_owned(), self.name().to_owned())
    }

    fn owner(&self) -> AntId {
        self.ant()
    }

    fn describe(&self) -> String {
        format!("template '{}/{}'", self.category(), self.name())
    }

    fn from_capability(capability: Capability) -> Result<Self, Capability> {
        capability.into_template()
    }
}

/// Fails with [`AntError::RegistryOwnership`] unless every item belongs to `ant`.
pub(crate) fn check_owners<C: RegistryEntry>(ant: AntId, items: &[C]) -> Result<(), AntError> {
    items
        .iter()
        .find(|item| item.owner() != ant)
        .map_or(Ok(()), |item| {
            Err(AntError::RegistryOwnership {
                subject: item.describe(),
                expected: ant,
                found: item.owner(),
            })
        })
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Name-keyed capability map with last-write-wins semantics.
pub struct Registry<C: RegistryEntry> {
    ant: AntId,
    entries: RwLock<HashMap<C::Key, C>>,
}

impl<C: RegistryEntry> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = read(&self.entries)
            .keys()
            .map(|key| format!("{key:?}"))
            .collect();
        keys.sort_unstable();
        f.debug_struct("Registry")
            .field("kind", &C::KIND)
            .field("ant", &self.ant)
            .field("keys", &keys)
            .finish()
    }
}

impl<C: RegistryEntry> Registry<C> {
    /// Creates an empty registry owned by `ant`.
    #[must_use]
    pub fn new(ant: AntId) -> Self {
        Self {
            ant,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Coordinator owning the registry.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Stores every item, replacing entries with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::RegistryOwnership`] when any item belongs to
    /// another coordinator; nothing is stored in that case.
    pub fn load(&self, items: Vec<C>) -> Result<(), AntError> {
        check_owners(self.ant, &items)?;
        let mut entries = write(&self.entries);
        for item in items {
            debug!(target: REGISTRY_TARGET, kind = %C::KIND, entry = %item.describe(), "registered");
            entries.insert(item.key(), item);
        }
        Ok(())
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<C>
    where
        C::Key: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        read(&self.entries).get(key).cloned()
    }

    /// Snapshot of every entry, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<C> {
        read(&self.entries).values().cloned().collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    /// Returns `true` when the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    /// Pulls this registry's capabilities off `plugin`. Failures are
    /// recorded on the loader.
    pub fn load_from_plugin(&self, loader: &PluginLoader, plugin: &dyn Plugin) {
        let items = loader.extract::<C>(plugin);
        if items.is_empty() {
            return;
        }
        if let Err(error) = self.load(items) {
            loader.record_error(error);
        }
    }

    /// Subscribes to `loader`'s feed for as long as both live. Plugins
    /// published earlier are replayed immediately.
    pub fn attach(self: &Arc<Self>, loader: &Arc<PluginLoader>) {
        let registry = Arc::downgrade(self);
        let source = Arc::downgrade(loader);
        let _attached = loader.feed().subscribe_with(
            move |plugin: &Arc<dyn Plugin>| {
                if let (Some(live), Some(publisher)) = (registry.upgrade(), source.upgrade()) {
                    live.load_from_plugin(&publisher, plugin.as_ref());
                }
            },
            |never| match *never {},
            || {},
        );
    }
}

impl Registry<Arc<Template>> {
    /// Looks up a template by category and name.
    #[must_use]
    pub fn template(&self, category: &str, name: &str) -> Option<Arc<Template>> {
        read(&self.entries)
            .get(&(category.to_owned(), name.to_owned()))
            .cloned()
    }

    /// Every template in `category`, sorted by name.
    #[must_use]
    pub fn category(&self, category: &str) -> Vec<Arc<Template>> {
        let mut templates: Vec<_> = read(&self.entries)
            .values()
            .filter(|template| template.category() == category)
            .cloned()
            .collect();
        templates.sort_by(|left, right| left.name().cmp(right.name()));
        templates
    }
}

#[cfg(test)]
mod tests;
