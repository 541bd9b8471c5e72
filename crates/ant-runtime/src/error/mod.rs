//! Domain errors raised by the runtime.
//!
//! All errors use a `thiserror`-derived enum with structured context so
//! callers can inspect the failure programmatically. The enum is `Clone`
//! because a stream's terminal error is delivered to every observer; I/O
//! errors are wrapped in `Arc` for that reason.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use ant_config::ConfigError;
use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::identity::AntId;

/// Errors arising from plugin loading, registration and function execution.
#[derive(Debug, Clone, Error)]
pub enum AntError {
    /// A call argument was not a string; raised before any process starts.
    #[error("argument {index} of function '{function}' must be a string")]
    ProcessArgument {
        /// Function name.
        function: String,
        /// Position of the offending argument.
        index: usize,
    },

    /// The function's executable could not be started.
    #[error("function '{function}' failed to start '{executable}': {source}")]
    ProcessSpawn {
        /// Function name.
        function: String,
        /// Executable that was spawned.
        executable: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The process failed after it was started.
    #[error("process of function '{function}' crashed: {message}")]
    ProcessCrash {
        /// Function name.
        function: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// The process exited with a non-zero status code.
    #[error("process of function '{function}' exited with code {code}")]
    ProcessExit {
        /// Function name.
        function: String,
        /// Process exit code.
        code: i32,
    },

    /// A handler function could not start its runtime.
    #[error("could not run handler function '{function}': {source}")]
    HandlerDispatch {
        /// Handler function name.
        function: String,
        /// Failure reported by the runtime.
        #[source]
        source: Box<Self>,
    },

    /// A plugin descriptor could not be resolved or instantiated.
    #[error("could not load plugin '{reference}': {message}")]
    PluginLoad {
        /// Descriptor reference (catalog identifier, factory name or raw value).
        reference: String,
        /// Description of the failure.
        message: String,
    },

    /// A plugin accessor returned a capability of the wrong kind.
    #[error("plugin '{plugin}' returned a {found} from '{member}' where a {expected} was expected")]
    CapabilityType {
        /// Plugin name.
        plugin: String,
        /// Accessor that was read.
        member: String,
        /// Kind the accessor must return.
        expected: CapabilityKind,
        /// Kind that was returned.
        found: CapabilityKind,
    },

    /// A plugin or capability belongs to a different coordinator.
    #[error("{subject} belongs to {found}, expected {expected}")]
    RegistryOwnership {
        /// What was being registered.
        subject: String,
        /// Coordinator owning the registry.
        expected: AntId,
        /// Coordinator the item was built against.
        found: AntId,
    },

    /// A guarded plugin accessor failed or panicked.
    #[error("could not read '{member}' from plugin '{plugin}': {message}")]
    PluginMember {
        /// Plugin name.
        plugin: String,
        /// Accessor that failed.
        member: String,
        /// Failure reported by the plugin.
        message: String,
    },

    /// A runtime version is empty or has no numeric component.
    #[error("invalid runtime version '{version}': expected a non-empty version string")]
    InvalidVersion {
        /// Version as given.
        version: String,
    },

    /// A configuration entry references a runtime that is not registered.
    #[error("runtime '{reference}' was not found")]
    UnknownRuntime {
        /// Runtime reference as written.
        reference: String,
    },

    /// A host references a provider that is not registered.
    #[error("host '{host}' references unknown provider '{provider}'")]
    UnknownProvider {
        /// Host name.
        host: String,
        /// Provider name.
        provider: String,
    },

    /// No function with the requested name is registered.
    #[error("function '{name}' not found")]
    FunctionNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// The configuration could not be loaded.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}
