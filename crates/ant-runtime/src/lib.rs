//! Plugin-driven function execution for Ant.
//!
//! An [`Ant`] coordinator loads plugins, collects the capabilities they
//! contribute (functions, runtimes, hosts, providers and templates) into
//! registries, merges in what the configuration declares, and runs
//! functions on request.
//!
//! # Architecture
//!
//! Everything asynchronous flows through the [`broker::EventStream`], a hot
//! stream that replays its history to late subscribers. The
//! [`PluginLoader`] publishes accepted plugins on such a stream; each
//! registry subscribes and pulls its own capability kind off every plugin,
//! so plugins loaded after start-up reach the registries without extra
//! wiring. Function invocations answer with a stream of
//! [`FunctionOutput`]: one item per line a process writes, followed by
//! completion or a failure derived from the exit status.
//!
//! Misbehaving plugins never abort loading. Their errors and panics are
//! caught, recorded on the loader and logged.
//!
//! # Example
//!
//! ```rust,no_run
//! use ant_config::Config;
//! use ant_runtime::{Ant, PluginCatalog};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), ant_runtime::AntError> {
//! let config = Config::load_default()?;
//! let ant = Ant::new(&config, PluginCatalog::new())?;
//! let output = ant.execute("greet", vec![json!("world")])?;
//! for item in output.collect_blocking()? {
//!     println!("{item:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod ant;
pub mod broker;
pub mod capability;
mod configure;
pub mod error;
pub mod function;
pub mod host;
pub mod identity;
pub mod plugin;
pub mod process;
pub mod registry;
pub mod telemetry;
pub mod template;

#[cfg(test)]
mod tests;

pub use self::ant::{Ant, AntBuilder, DEFAULT_HOST};
pub use self::broker::{Emitter, EventStream, Observer, StreamHooks, Subscription};
pub use self::capability::{Capability, CapabilityKind};
pub use self::error::AntError;
pub use self::function::{
    AntFunction, FunctionOutput, HandlerFunction, OutputStream, ProcessFunction, Runtime,
};
pub use self::host::{Host, Provider};
pub use self::identity::AntId;
pub use self::plugin::{
    CapabilityList, FnFactory, Member, Plugin, PluginCatalog, PluginDescriptor, PluginFactory,
    PluginFault, PluginFeed, PluginLoader, PluginReference,
};
pub use self::process::{ProcessExit, ProcessHandle, ProcessOptions, ProcessSpawner, SystemSpawner};
pub use self::registry::{
    FunctionRegistry, HostRegistry, ProviderRegistry, Registry, RegistryEntry, RuntimeRegistry,
    TemplateRegistry,
};
pub use self::template::Template;
