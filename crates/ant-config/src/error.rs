//! Errors raised while loading configuration documents.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while reading or interpreting an `ant.yml` document.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The document exists but could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// Path of the document.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The document is not valid YAML or does not match the expected shape.
    #[error("failed to parse configuration '{origin}': {message}")]
    Parse {
        /// Where the document came from (a path or a caller-supplied label).
        origin: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A function entry names neither an executable nor a handler file.
    #[error("function '{name}' must declare either 'bin' or 'handler'")]
    FunctionKind {
        /// Function name as written in the document.
        name: String,
    },

    /// A runtime entry has no version in its key nor in its body.
    #[error("runtime '{key}' does not declare a version")]
    MissingRuntimeVersion {
        /// Runtime key as written in the document.
        key: String,
    },

    /// The working directory could not be determined.
    #[error("failed to determine the working directory: {source}")]
    WorkingDirectory {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}
