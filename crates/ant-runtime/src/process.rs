//! Spawning external processes and turning them into event streams.
//!
//! [`ProcessSpawner`] is the seam between functions and the operating
//! system; [`SystemSpawner`] implements it over [`std::process::Command`].
//! [`process_stream`] wires a spawned [`ProcessHandle`] into an
//! [`EventStream`]: standard output is emitted line by line, standard error
//! goes to the diagnostic log, and the exit status decides the terminal
//! signal.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::broker::{Emitter, EventStream};
use crate::error::AntError;

/// Tracing target for function process operations.
pub(crate) const PROCESS_TARGET: &str = "ant_runtime::process";

/// Boxed pipe end handed out by a [`ProcessHandle`].
pub type ProcessPipe = Box<dyn Read + Send>;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited with this status code.
    Code(i32),
    /// The process was terminated without a status code.
    Signal,
}

/// Working directory and environment for a spawned process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    working_dir: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
}

impl ProcessOptions {
    /// Options that inherit the parent's directory and environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the process in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Runs the process with exactly these environment variables.
    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Working directory, if set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Replacement environment, if set.
    #[must_use]
    pub const fn env(&self) -> Option<&BTreeMap<String, String>> {
        self.env.as_ref()
    }
}

/// A running process.
pub trait ProcessHandle: Send {
    /// Takes the standard output pipe. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<ProcessPipe>;

    /// Takes the standard error pipe. Returns `None` after the first call.
    fn take_stderr(&mut self) -> Option<ProcessPipe>;

    /// Blocks until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error when the exit status cannot be collected.
    fn wait(&mut self) -> io::Result<ProcessExit>;
}

/// Starts processes.
pub trait ProcessSpawner: Send + Sync {
    /// Spawns `executable` with `args`.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be started.
    fn spawn(
        &self,
        executable: &Path,
        args: &[String],
        options: &ProcessOptions,
    ) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns operating system processes with piped output and a null stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(
        &self,
        executable: &Path,
        args: &[String],
        options: &ProcessOptions,
    ) -> io::Result<Box<dyn ProcessHandle>> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = options.working_dir() {
            command.current_dir(dir);
        }
        if let Some(env) = options.env() {
            command.env_clear().envs(env);
        }
        let child = command.spawn()?;
        Ok(Box::new(SystemProcess { child }))
    }
}

struct SystemProcess {
    child: Child,
}

impl ProcessHandle for SystemProcess {
    fn take_stdout(&mut self) -> Option<ProcessPipe> {
        self.child
            .stdout
            .take()
            .map(|pipe| Box::new(pipe) as ProcessPipe)
    }

    fn take_stderr(&mut self) -> Option<ProcessPipe> {
        self.child
            .stderr
            .take()
            .map(|pipe| Box::new(pipe) as ProcessPipe)
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait()?;
        Ok(status.code().map_or(ProcessExit::Signal, ProcessExit::Code))
    }
}

/// Wraps a spawned process in a stream of its standard output lines.
///
/// Each line is emitted with its trailing newline. A zero exit status
/// completes the stream, a non-zero one fails it with
/// [`AntError::ProcessExit`] and anything else with
/// [`AntError::ProcessCrash`]. The process runs to completion whether or
/// not anyone observes the stream.
pub(crate) fn process_stream(
    function: &str,
    mut handle: Box<dyn ProcessHandle>,
) -> EventStream<String, AntError> {
    let function = function.to_owned();
    EventStream::create(move |emitter| {
        let stderr = handle
            .take_stderr()
            .and_then(|pipe| drain_stderr(&function, pipe));
        let pump_name = function.clone();
        let failure = emitter.clone();
        let spawned = thread::Builder::new()
            .name(format!("ant-fn-{function}"))
            .spawn(move || pump(&pump_name, handle, stderr, &emitter));
        if let Err(error) = spawned {
            failure.fail(AntError::ProcessCrash {
                function,
                message: String::from("failed to start the output reader"),
                source: Some(Arc::new(error)),
            });
        }
    })
}

/// Forwards every stderr line to the diagnostic log.
fn drain_stderr(function: &str, pipe: ProcessPipe) -> Option<JoinHandle<()>> {
    let name = function.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("ant-fn-{function}-stderr"))
        .spawn(move || {
            for line in BufReader::new(pipe).lines() {
                match line {
                    Ok(text) => warn!(
                        target: PROCESS_TARGET,
                        function = %name,
                        stderr = %text,
                        "function process wrote to stderr"
                    ),
                    Err(error) => {
                        debug!(
                            target: PROCESS_TARGET,
                            function = %name,
                            %error,
                            "stopped reading function stderr"
                        );
                        break;
                    }
                }
            }
        });
    match spawned {
        Ok(join) => Some(join),
        Err(error) => {
            warn!(
                target: PROCESS_TARGET,
                function,
                %error,
                "could not start the stderr reader; stderr will not be logged"
            );
            None
        }
    }
}

fn pump(
    function: &str,
    mut handle: Box<dyn ProcessHandle>,
    stderr: Option<JoinHandle<()>>,
    emitter: &Emitter<String, AntError>,
) {
    let read_failure = handle
        .take_stdout()
        .and_then(|pipe| forward_lines(pipe, emitter).err());
    let exit = handle.wait();
    if stderr.is_some_and(|join| join.join().is_err()) {
        warn!(target: PROCESS_TARGET, function, "stderr reader panicked");
    }

    let outcome = match (read_failure, exit) {
        (Some(error), _) | (None, Err(error)) => Err(AntError::ProcessCrash {
            function: function.to_owned(),
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }),
        (None, Ok(ProcessExit::Code(0))) => Ok(()),
        (None, Ok(ProcessExit::Code(code))) => Err(AntError::ProcessExit {
            function: function.to_owned(),
            code,
        }),
        (None, Ok(ProcessExit::Signal)) => Err(AntError::ProcessCrash {
            function: function.to_owned(),
            message: String::from("terminated by a signal"),
            source: None,
        }),
    };

    debug!(
        target: PROCESS_TARGET,
        function,
        success = outcome.is_ok(),
        "function process finished"
    );
    match outcome {
        Ok(()) => emitter.finish(),
        Err(error) => emitter.fail(error),
    }
}

fn forward_lines(pipe: ProcessPipe, emitter: &Emitter<String, AntError>) -> io::Result<()> {
    let mut reader = BufReader::new(pipe);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        emitter.emit(String::from_utf8_lossy(&line).into_owned());
    }
}
