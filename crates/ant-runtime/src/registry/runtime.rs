use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, RwLock};

use ant_config::RuntimeReference;
use tracing::debug;

use super::{REGISTRY_TARGET, check_owners, read, write};
use crate::error::AntError;
use crate::function::{Runtime, coerce_major};
use crate::identity::AntId;
use crate::plugin::{Plugin, PluginLoader};

/// Version key holding the runtime returned when no version is requested.
const DEFAULT_SLOT: &str = "default";

/// Runtimes keyed by name, then by major version.
///
/// The first runtime registered under a name fills that name's default
/// slot; a later one claims it only when flagged as default.
pub struct RuntimeRegistry {
    ant: AntId,
    runtimes: RwLock<HashMap<String, HashMap<String, Arc<Runtime>>>>,
    selected: RwLock<Option<Arc<Runtime>>>,
}

impl fmt::Debug for RuntimeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = read(&self.runtimes).keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("RuntimeRegistry")
            .field("ant", &self.ant)
            .field("names", &names)
            .finish_non_exhaustive()
    }
}

impl RuntimeRegistry {
    /// Creates an empty registry owned by `ant`.
    #[must_use]
    pub fn new(ant: AntId) -> Self {
        Self {
            ant,
            runtimes: RwLock::new(HashMap::new()),
            selected: RwLock::new(None),
        }
    }

    /// Coordinator owning the registry.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Stores every runtime under its name and version.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::RegistryOwnership`] when any runtime belongs to
    /// another coordinator; nothing is stored in that case.
    pub fn load(&self, runtimes: Vec<Arc<Runtime>>) -> Result<(), AntError> {
        check_owners(self.ant, &runtimes)?;
        let mut by_name = write(&self.runtimes);
        for runtime in runtimes {
            debug!(
                target: REGISTRY_TARGET,
                runtime = runtime.name(),
                version = runtime.version(),
                is_default = runtime.is_default(),
                "registered runtime"
            );
            let versions = by_name.entry(runtime.name().to_owned()).or_default();
            if versions.is_empty() || runtime.is_default() {
                versions.insert(DEFAULT_SLOT.to_owned(), Arc::clone(&runtime));
            }
            versions.insert(runtime.version().to_owned(), runtime);
        }
        Ok(())
    }

    /// Looks up a runtime. Without a version the name's default slot is
    /// returned; a version is reduced to its major component first.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::InvalidVersion`] when `version` is empty or has no
    /// numeric component.
    pub fn get(&self, name: &str, version: Option<&str>) -> Result<Option<Arc<Runtime>>, AntError> {
        let slot = match version {
            Some(text) => coerce_major(text).ok_or_else(|| AntError::InvalidVersion {
                version: text.to_owned(),
            })?,
            None => DEFAULT_SLOT.to_owned(),
        };
        Ok(read(&self.runtimes)
            .get(name)
            .and_then(|versions| versions.get(&slot))
            .cloned())
    }

    /// Resolves a configuration reference.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::UnknownRuntime`] when nothing matches and
    /// [`AntError::InvalidVersion`] for an unusable version.
    pub fn resolve(&self, reference: &RuntimeReference) -> Result<Arc<Runtime>, AntError> {
        self.get(reference.name(), reference.version())?
            .ok_or_else(|| AntError::UnknownRuntime {
                reference: reference.to_string(),
            })
    }

    /// Every registered runtime version, sorted by name then version.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Runtime>> {
        let mut runtimes: Vec<Arc<Runtime>> = read(&self.runtimes)
            .values()
            .flat_map(|versions| {
                versions
                    .iter()
                    .filter(|(key, _)| key.as_str() != DEFAULT_SLOT)
                    .map(|(_, runtime)| Arc::clone(runtime))
            })
            .collect();
        runtimes.sort_by(|left, right| {
            left.name()
                .cmp(right.name())
                .then_with(|| left.version().cmp(right.version()))
        });
        runtimes
    }

    /// Number of distinct runtime names.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.runtimes).len()
    }

    /// Returns `true` when no runtime is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.runtimes).is_empty()
    }

    /// The coordinator's selected runtime, used by handler functions that
    /// name none.
    #[must_use]
    pub fn default_runtime(&self) -> Option<Arc<Runtime>> {
        read(&self.selected).clone()
    }

    /// Selects the coordinator's default runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::RegistryOwnership`] when `runtime` belongs to
    /// another coordinator.
    pub fn set_default_runtime(&self, runtime: Option<Arc<Runtime>>) -> Result<(), AntError> {
        if let Some(candidate) = &runtime {
            check_owners(self.ant, std::slice::from_ref(candidate))?;
        }
        *write(&self.selected) = runtime;
        Ok(())
    }

    /// Pulls runtimes off `plugin`. Failures are recorded on the loader.
    pub fn load_from_plugin(&self, loader: &PluginLoader, plugin: &dyn Plugin) {
        let runtimes = loader.extract::<Arc<Runtime>>(plugin);
        if runtimes.is_empty() {
            return;
        }
        if let Err(error) = self.load(runtimes) {
            loader.record_error(error);
        }
    }

    /// Subscribes to `loader`'s feed for as long as both live.
    pub fn attach(self: &Arc<Self>, loader: &Arc<PluginLoader>) {
        let registry = Arc::downgrade(self);
        let source = Arc::downgrade(loader);
        let _attached = loader.feed().subscribe_with(
            move |plugin: &Arc<dyn Plugin>| {
                if let (Some(live), Some(publisher)) = (registry.upgrade(), source.upgrade()) {
                    live.load_from_plugin(&publisher, plugin.as_ref());
                }
            },
            |never: &Infallible| match *never {},
            || {},
        );
    }
}
