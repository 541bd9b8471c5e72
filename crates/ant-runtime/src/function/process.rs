use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{AntFunction, FunctionOutput, OutputStream};
use crate::broker::EventStream;
use crate::error::AntError;
use crate::identity::AntId;
use crate::process::{PROCESS_TARGET, ProcessOptions, ProcessSpawner, SystemSpawner, process_stream};

/// A function backed directly by an executable.
#[derive(Clone)]
pub struct ProcessFunction {
    ant: AntId,
    name: String,
    bin: PathBuf,
    spawner: Arc<dyn ProcessSpawner>,
}

impl std::fmt::Debug for ProcessFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessFunction")
            .field("ant", &self.ant)
            .field("name", &self.name)
            .field("bin", &self.bin)
            .finish_non_exhaustive()
    }
}

impl ProcessFunction {
    /// Creates a function that spawns `bin` through the operating system.
    #[must_use]
    pub fn new(ant: AntId, name: impl Into<String>, bin: impl Into<PathBuf>) -> Self {
        Self {
            ant,
            name: name.into(),
            bin: bin.into(),
            spawner: Arc::new(SystemSpawner),
        }
    }

    /// Replaces the process spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinator the function was built against.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Executable path.
    #[must_use]
    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Spawns the executable and streams its standard output lines.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::ProcessSpawn`] when the process cannot be started;
    /// no stream exists in that case.
    pub fn execute(
        &self,
        args: &[String],
        options: &ProcessOptions,
    ) -> Result<EventStream<String, AntError>, AntError> {
        debug!(
            target: PROCESS_TARGET,
            function = %self.name,
            executable = %self.bin.display(),
            args = args.len(),
            "spawning function process"
        );
        let handle = self
            .spawner
            .spawn(&self.bin, args, options)
            .map_err(|source| AntError::ProcessSpawn {
                function: self.name.clone(),
                executable: self.bin.clone(),
                source: Arc::new(source),
            })?;
        Ok(process_stream(&self.name, handle))
    }

    /// Checks that every argument is a JSON string.
    pub(crate) fn string_args(&self, args: Vec<Value>) -> Result<Vec<String>, AntError> {
        args.into_iter()
            .enumerate()
            .map(|(index, arg)| match arg {
                Value::String(text) => Ok(text),
                _ => Err(AntError::ProcessArgument {
                    function: self.name.clone(),
                    index,
                }),
            })
            .collect()
    }
}

impl AntFunction for ProcessFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn ant(&self) -> AntId {
        self.ant
    }

    fn run(&self, args: Vec<Value>) -> Result<OutputStream, AntError> {
        let text_args = self.string_args(args)?;
        let lines = self.execute(&text_args, &ProcessOptions::new())?;
        Ok(lines.map(|line| FunctionOutput::Text(line.clone())))
    }
}
