use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::{AntFunction, OutputStream, ProcessFunction};
use crate::broker::EventStream;
use crate::error::AntError;
use crate::identity::AntId;
use crate::process::{ProcessOptions, ProcessSpawner};

/// Reduces a version string to its major component: `"8.11.0"` → `"8"`,
/// `"v10"` → `"10"`. Returns `None` when the text holds no digits.
#[must_use]
pub fn coerce_major(version: &str) -> Option<String> {
    let digits: String = version
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed }.to_owned())
}

/// A process function that executes handler files.
///
/// Only the major version is kept; it is the granularity the runtime
/// registry resolves on.
#[derive(Debug, Clone)]
pub struct Runtime {
    process: ProcessFunction,
    version: String,
    extensions: Vec<String>,
    template: Option<PathBuf>,
    is_default: bool,
}

impl Runtime {
    /// Creates a runtime spawning `bin`.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::InvalidVersion`] when `version` is empty or has no
    /// numeric component.
    pub fn new(
        ant: AntId,
        name: impl Into<String>,
        bin: impl Into<PathBuf>,
        version: &str,
    ) -> Result<Self, AntError> {
        let major = coerce_major(version).ok_or_else(|| AntError::InvalidVersion {
            version: version.to_owned(),
        })?;
        Ok(Self {
            process: ProcessFunction::new(ant, name, bin),
            version: major,
            extensions: Vec::new(),
            template: None,
            is_default: false,
        })
    }

    /// Handler file extensions, without the leading dot.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Template used to scaffold new handler files.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Claims the default slot for this runtime's name on registration.
    #[must_use]
    pub const fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Replaces the process spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.process = self.process.with_spawner(spawner);
        self
    }

    /// Runtime name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.process.name()
    }

    /// Coordinator the runtime was built against.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.process.ant()
    }

    /// Interpreter executable.
    #[must_use]
    pub fn bin(&self) -> &Path {
        self.process.bin()
    }

    /// Major version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Handler file extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Template path, if any.
    #[must_use]
    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    /// Whether the runtime claims its name's default slot.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns `true` when `file_name` ends in one of the runtime's extensions.
    #[must_use]
    pub fn handles(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|extension| {
            file_name
                .strip_suffix(extension.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }

    /// Spawns the interpreter with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::ProcessSpawn`] when the interpreter cannot start.
    pub fn execute(
        &self,
        args: &[String],
        options: &ProcessOptions,
    ) -> Result<EventStream<String, AntError>, AntError> {
        self.process.execute(args, options)
    }
}

impl AntFunction for Runtime {
    fn name(&self) -> &str {
        self.process.name()
    }

    fn ant(&self) -> AntId {
        self.process.ant()
    }

    fn run(&self, args: Vec<Value>) -> Result<OutputStream, AntError> {
        self.process.run(args)
    }
}
