//! Fault-tolerant plugin loading and the reactive plugin feed.

use std::any::Any;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use super::descriptor::{Normalised, PluginDescriptor, PluginReference};
use super::{Plugin, PluginCatalog, PluginFault};
use crate::broker::{Emitter, EventStream, StreamHooks};
use crate::error::AntError;
use crate::identity::AntId;
use crate::registry::RegistryEntry;

/// Tracing target for plugin loading.
const LOADER_TARGET: &str = "ant_runtime::plugin";

/// Stream of every plugin the loader has accepted. It never terminates and
/// replays past plugins to new observers.
pub type PluginFeed = EventStream<Arc<dyn Plugin>, Infallible>;

/// Loads plugins for one coordinator and publishes them on a [`PluginFeed`].
///
/// Loading never aborts a batch: every failure is recorded and the next
/// descriptor is processed.
pub struct PluginLoader {
    ant: AntId,
    catalog: PluginCatalog,
    plugins: Mutex<Vec<(String, Arc<dyn Plugin>)>>,
    errors: Mutex<Vec<AntError>>,
    publisher: Emitter<Arc<dyn Plugin>, Infallible>,
    feed: PluginFeed,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = lock(&self.plugins)
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        f.debug_struct("PluginLoader")
            .field("ant", &self.ant)
            .field("plugins", &names)
            .field("errors", &lock(&self.errors).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs plugin code, turning returned faults and panics into messages.
fn guarded<R>(call: impl FnOnce() -> Result<R, PluginFault>) -> Result<R, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(fault)) => Err(fault.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    detail.map_or_else(
        || String::from("panicked"),
        |message| format!("panicked: {message}"),
    )
}

impl PluginLoader {
    /// Creates a loader for `ant` resolving identifiers through `catalog`.
    #[must_use]
    pub fn new(ant: AntId, catalog: PluginCatalog) -> Self {
        let (publisher, feed) = EventStream::pair(StreamHooks::new());
        Self {
            ant,
            catalog,
            plugins: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            publisher,
            feed,
        }
    }

    /// Coordinator the loader belongs to.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Catalog used to resolve identifiers.
    #[must_use]
    pub const fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Loads every descriptor, recording failures, and returns the plugins
    /// accepted by this call in order.
    ///
    /// Each accepted plugin is stored under its name, replacing any plugin
    /// of the same name, and published on the feed. Called from inside a
    /// feed observer, the new plugins reach observers once the current
    /// delivery finishes.
    pub fn load<I>(&self, descriptors: I) -> Vec<Arc<dyn Plugin>>
    where
        I: IntoIterator<Item = PluginDescriptor>,
    {
        let mut loaded = Vec::new();
        for descriptor in descriptors {
            match self.load_one(descriptor) {
                Ok(plugin) => {
                    let name = self.plugin_name(plugin.as_ref());
                    debug!(target: LOADER_TARGET, plugin = %name, ant = %self.ant, "plugin loaded");
                    self.store(name, Arc::clone(&plugin));
                    self.publisher.emit(Arc::clone(&plugin));
                    loaded.push(plugin);
                }
                Err(error) => self.record_error(error),
            }
        }
        loaded
    }

    fn load_one(&self, descriptor: PluginDescriptor) -> Result<Arc<dyn Plugin>, AntError> {
        let plugin = match descriptor.normalise()? {
            Normalised::Instance(plugin) => plugin,
            Normalised::Construct(reference, config) => self.construct(&reference, config)?,
        };
        if plugin.ant() != self.ant {
            return Err(AntError::RegistryOwnership {
                subject: format!("plugin '{}'", plugin.type_name()),
                expected: self.ant,
                found: plugin.ant(),
            });
        }
        Ok(plugin)
    }

    fn construct(
        &self,
        reference: &PluginReference,
        config: Option<Value>,
    ) -> Result<Arc<dyn Plugin>, AntError> {
        let factory = match reference {
            PluginReference::Path(path) => {
                self.catalog
                    .resolve(path)
                    .ok_or_else(|| AntError::PluginLoad {
                        reference: path.clone(),
                        message: String::from("no plugin is registered under this identifier"),
                    })?
            }
            PluginReference::Factory(factory) => Arc::clone(factory),
        };
        guarded(|| factory.create(self.ant, config.as_ref())).map_err(|message| {
            AntError::PluginLoad {
                reference: reference.label(),
                message,
            }
        })
    }

    fn store(&self, name: String, plugin: Arc<dyn Plugin>) {
        let mut plugins = lock(&self.plugins);
        if let Some(slot) = plugins.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = plugin;
            return;
        }
        plugins.push((name, plugin));
    }

    /// Records a non-fatal error.
    pub fn record_error(&self, error: AntError) {
        warn!(target: LOADER_TARGET, ant = %self.ant, %error, "plugin error recorded");
        lock(&self.errors).push(error);
    }

    /// Loaded plugins in first-load order.
    #[must_use]
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        lock(&self.plugins)
            .iter()
            .map(|(_, plugin)| Arc::clone(plugin))
            .collect()
    }

    /// Looks up a loaded plugin by name.
    #[must_use]
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        lock(&self.plugins)
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, plugin)| Arc::clone(plugin))
    }

    /// Every error recorded so far, oldest first.
    #[must_use]
    pub fn loading_errors(&self) -> Vec<AntError> {
        lock(&self.errors).clone()
    }

    /// The plugin feed.
    #[must_use]
    pub fn feed(&self) -> PluginFeed {
        self.feed.clone()
    }

    /// Name of `plugin`. A failing name accessor is recorded and the bare
    /// type name is used instead.
    pub fn plugin_name(&self, plugin: &dyn Plugin) -> String {
        guarded(|| plugin.name()).unwrap_or_else(|message| {
            let fallback = plugin.type_name().to_owned();
            self.record_error(AntError::PluginMember {
                plugin: fallback.clone(),
                member: String::from("name"),
                message,
            });
            fallback
        })
    }

    /// Name used to label errors about `plugin`, without recording anything.
    fn label(plugin: &dyn Plugin) -> String {
        guarded(|| plugin.name()).unwrap_or_else(|_| plugin.type_name().to_owned())
    }

    /// Reads `member` from `plugin` through a guard. A failure or panic is
    /// recorded and yields `None`.
    pub fn get_from_plugin<R>(
        &self,
        plugin: &dyn Plugin,
        member: &str,
        read: impl FnOnce(&dyn Plugin) -> Result<R, PluginFault>,
    ) -> Option<R> {
        self.get_validated_from_plugin(plugin, member, read, |_| Ok(()))
    }

    /// Like [`PluginLoader::get_from_plugin`], additionally rejecting values
    /// for which `validate` fails.
    pub fn get_validated_from_plugin<R>(
        &self,
        plugin: &dyn Plugin,
        member: &str,
        read: impl FnOnce(&dyn Plugin) -> Result<R, PluginFault>,
        validate: impl FnOnce(&R) -> Result<(), PluginFault>,
    ) -> Option<R> {
        let outcome = guarded(|| {
            let value = read(plugin)?;
            validate(&value)?;
            Ok(value)
        });
        match outcome {
            Ok(value) => Some(value),
            Err(message) => {
                self.record_error(AntError::PluginMember {
                    plugin: Self::label(plugin),
                    member: member.to_owned(),
                    message,
                });
                None
            }
        }
    }

    /// Capabilities of kind `C` contributed by `plugin`.
    ///
    /// Elements of another kind are dropped and recorded as
    /// [`AntError::CapabilityType`].
    pub fn extract<C: RegistryEntry>(&self, plugin: &dyn Plugin) -> Vec<C> {
        let member = C::MEMBER;
        let Some(capabilities) = self.get_from_plugin(plugin, member.as_str(), |p| member.read(p))
        else {
            return Vec::new();
        };
        let mut accepted = Vec::with_capacity(capabilities.len());
        for capability in capabilities {
            match C::from_capability(capability) {
                Ok(entry) => accepted.push(entry),
                Err(other) => self.record_error(AntError::CapabilityType {
                    plugin: Self::label(plugin),
                    member: member.as_str().to_owned(),
                    expected: C::KIND,
                    found: other.kind(),
                }),
            }
        }
        accepted
    }
}
