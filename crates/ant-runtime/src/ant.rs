//! The coordinator tying configuration, plugins and registries together.
//!
//! Construction follows a fixed order so that every later stage can see
//! what the earlier ones registered:
//!
//! 1. plugins from the global layer, the local layer, then the builder;
//! 2. templates, plugin-supplied before configured;
//! 3. runtimes, then the default runtime selection;
//! 4. functions: plugin-supplied, discovered handler files, configured;
//! 5. providers, then hosts.
//!
//! Later registrations replace earlier ones with the same name, so the
//! configuration has the last word over discovery and plugins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ant_config::{Config, FALLBACK_RUNTIME};
use serde_json::Value;
use tracing::{debug, info};

use crate::configure;
use crate::error::AntError;
use crate::function::{AntFunction, OutputStream, Runtime};
use crate::host::Host;
use crate::identity::AntId;
use crate::plugin::{Plugin, PluginCatalog, PluginDescriptor, PluginLoader};
use crate::process::{ProcessSpawner, SystemSpawner};
use crate::registry::{
    FunctionRegistry, HostRegistry, ProviderRegistry, RuntimeRegistry, TemplateRegistry,
};

/// Tracing target for coordinator lifecycle events.
const ANT_TARGET: &str = "ant_runtime::ant";

/// Host returned by [`Ant::host`].
pub const DEFAULT_HOST: &str = "Default";

/// Staged construction of an [`Ant`].
///
/// The coordinator identity is allocated up front so that programmatic
/// plugins and capabilities can be built against it before
/// [`AntBuilder::build`] runs.
pub struct AntBuilder {
    id: AntId,
    catalog: PluginCatalog,
    plugins: Vec<PluginDescriptor>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl std::fmt::Debug for AntBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntBuilder")
            .field("id", &self.id)
            .field("catalog", &self.catalog.len())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl AntBuilder {
    /// Starts a coordinator resolving plugin identifiers through `catalog`.
    #[must_use]
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            id: AntId::next(),
            catalog,
            plugins: Vec::new(),
            spawner: Arc::new(SystemSpawner),
        }
    }

    /// Identity the coordinator will carry.
    #[must_use]
    pub const fn id(&self) -> AntId {
        self.id
    }

    /// Adds a plugin loaded after the configured ones.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Into<PluginDescriptor>) -> Self {
        self.plugins.push(plugin.into());
        self
    }

    /// Adds several plugins loaded after the configured ones.
    #[must_use]
    pub fn with_plugins<I>(mut self, plugins: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PluginDescriptor>,
    {
        self.plugins.extend(plugins.into_iter().map(Into::into));
        self
    }

    /// Spawner used by configured runtimes and process functions.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Builds the coordinator from `config`.
    ///
    /// Plugin failures are recorded on the loader and never abort the build.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configured runtime version, a configured default
    /// runtime or function runtime that is not registered, a host naming an
    /// unknown provider, or a capability owned by another coordinator.
    pub fn build(self, config: &Config) -> Result<Ant, AntError> {
        let Self {
            id,
            catalog,
            plugins,
            spawner,
        } = self;

        let loader = Arc::new(PluginLoader::new(id, catalog));
        for layer in config.layers() {
            loader.load(layer.plugins().iter().cloned().map(PluginDescriptor::Raw));
        }
        loader.load(plugins);

        let templates = Arc::new(TemplateRegistry::new(id));
        templates.attach(&loader);
        for layer in config.layers() {
            templates.load(
                layer
                    .templates()
                    .iter()
                    .map(|descriptor| configure::template(id, descriptor))
                    .collect(),
            )?;
        }

        let runtimes = Arc::new(RuntimeRegistry::new(id));
        runtimes.attach(&loader);
        for layer in config.layers() {
            let configured = layer
                .runtimes()
                .iter()
                .map(|descriptor| configure::runtime(id, descriptor, &spawner))
                .collect::<Result<Vec<_>, _>>()?;
            runtimes.load(configured)?;
        }
        let selected = match config.runtime() {
            Some(reference) => Some(runtimes.resolve(reference)?),
            None => runtimes.get(FALLBACK_RUNTIME, None)?,
        };
        runtimes.set_default_runtime(selected)?;

        let functions = Arc::new(FunctionRegistry::new(id));
        functions.attach(&loader);
        if let (Some(base_path), Some(runtime)) = (config.base_path(), runtimes.default_runtime())
        {
            functions.discover(base_path, &runtime)?;
        }
        for layer in config.layers() {
            let configured = layer
                .functions()
                .iter()
                .map(|descriptor| configure::function(id, descriptor, &runtimes, &spawner))
                .collect::<Result<Vec<_>, _>>()?;
            functions.load(configured)?;
        }

        let providers = Arc::new(ProviderRegistry::new(id));
        providers.attach(&loader);

        let hosts = Arc::new(HostRegistry::new(id));
        hosts.attach(&loader);
        for layer in config.layers() {
            let configured = layer
                .hosts()
                .iter()
                .map(|descriptor| configure::host(id, descriptor, &providers))
                .collect::<Result<Vec<_>, _>>()?;
            hosts.load(configured)?;
        }

        let ant = Ant {
            id,
            service: config.service().map(str::to_owned),
            base_path: config.base_path().map(Path::to_path_buf),
            loader,
            templates,
            runtimes,
            functions,
            providers,
            hosts,
        };
        info!(
            target: ANT_TARGET,
            ant = %id,
            plugins = ant.loader.plugins().len(),
            plugin_errors = ant.loader.loading_errors().len(),
            functions = ant.functions.len(),
            runtimes = ant.runtimes.len(),
            hosts = ant.hosts.len(),
            "coordinator ready"
        );
        Ok(ant)
    }
}

/// A coordinator: one plugin loader and the registries fed by it.
#[derive(Debug)]
pub struct Ant {
    id: AntId,
    service: Option<String>,
    base_path: Option<PathBuf>,
    loader: Arc<PluginLoader>,
    templates: Arc<TemplateRegistry>,
    runtimes: Arc<RuntimeRegistry>,
    functions: Arc<FunctionRegistry>,
    providers: Arc<ProviderRegistry>,
    hosts: Arc<HostRegistry>,
}

impl Ant {
    /// Builds a coordinator from `config` with no programmatic plugins.
    ///
    /// # Errors
    ///
    /// See [`AntBuilder::build`].
    pub fn new(config: &Config, catalog: PluginCatalog) -> Result<Self, AntError> {
        AntBuilder::new(catalog).build(config)
    }

    /// Builds a coordinator from the global and working-directory
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::Configuration`] when a file cannot be read or
    /// parsed, or any error of [`AntBuilder::build`].
    pub fn load_default(catalog: PluginCatalog) -> Result<Self, AntError> {
        let config = Config::load_default()?;
        Self::new(&config, catalog)
    }

    /// Coordinator identity.
    #[must_use]
    pub const fn id(&self) -> AntId {
        self.id
    }

    /// Configured service name.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Directory scanned for handler files.
    #[must_use]
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// The plugin loader feeding every registry.
    #[must_use]
    pub const fn plugin_loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// Loads more plugins; attached registries pick up their capabilities.
    pub fn load_plugins<I>(&self, plugins: I) -> Vec<Arc<dyn Plugin>>
    where
        I: IntoIterator,
        I::Item: Into<PluginDescriptor>,
    {
        self.loader.load(plugins.into_iter().map(Into::into))
    }

    /// Function registry.
    #[must_use]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Runtime registry.
    #[must_use]
    pub fn runtimes(&self) -> &RuntimeRegistry {
        &self.runtimes
    }

    /// Template registry.
    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Host registry.
    #[must_use]
    pub fn hosts(&self) -> &HostRegistry {
        &self.hosts
    }

    /// Provider registry.
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The default runtime, if one is selected.
    #[must_use]
    pub fn runtime(&self) -> Option<Arc<Runtime>> {
        self.runtimes.default_runtime()
    }

    /// The host named [`DEFAULT_HOST`].
    #[must_use]
    pub fn host(&self) -> Option<Arc<Host>> {
        self.hosts.get(DEFAULT_HOST)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<Arc<dyn AntFunction>> {
        self.functions.get(name)
    }

    /// Runs the function registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::FunctionNotFound`] for an unknown name, or the
    /// function's own synchronous failure.
    pub fn execute(&self, name: &str, args: Vec<Value>) -> Result<OutputStream, AntError> {
        let function = self.function(name).ok_or_else(|| AntError::FunctionNotFound {
            name: name.to_owned(),
        })?;
        debug!(target: ANT_TARGET, ant = %self.id, function = name, "executing");
        function.run(args)
    }
}
