use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{AntFunction, FunctionOutput, OutputStream, Runtime};
use crate::error::AntError;
use crate::identity::AntId;
use crate::process::{PROCESS_TARGET, ProcessOptions};

/// Literal a handler prints to report that it produced no value.
const UNDEFINED: &str = "undefined";

/// Decodes one chunk of handler output.
///
/// JSON is decoded; the literal `undefined` (surrounding whitespace
/// ignored) becomes [`FunctionOutput::Undefined`]; anything else passes
/// through as text. A handler that means the string "undefined" cannot be
/// told apart from one that produced nothing.
#[must_use]
pub fn decode_output(chunk: &str) -> FunctionOutput {
    match serde_json::from_str::<Value>(chunk) {
        Ok(value) => FunctionOutput::Value(value),
        Err(_) if chunk.trim() == UNDEFINED => FunctionOutput::Undefined,
        Err(_) => FunctionOutput::Text(chunk.to_owned()),
    }
}

/// A function whose logic lives in a handler file run by a [`Runtime`].
///
/// The runtime is invoked with two arguments: the handler path and a JSON
/// array holding the fixed arguments followed by the call arguments.
#[derive(Debug, Clone)]
pub struct HandlerFunction {
    ant: AntId,
    name: String,
    handler: PathBuf,
    runtime: Arc<Runtime>,
    args: Vec<Value>,
}

impl HandlerFunction {
    /// Binds `handler` to `runtime`.
    #[must_use]
    pub fn new(
        ant: AntId,
        name: impl Into<String>,
        handler: impl Into<PathBuf>,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            ant,
            name: name.into(),
            handler: handler.into(),
            runtime,
            args: Vec::new(),
        }
    }

    /// Arguments placed before every call's own arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler file path.
    #[must_use]
    pub fn handler(&self) -> &Path {
        &self.handler
    }

    /// Runtime executing the handler.
    #[must_use]
    pub const fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Fixed leading arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn payload(&self, call_args: Vec<Value>) -> String {
        let mut all = self.args.clone();
        all.extend(call_args);
        Value::Array(all).to_string()
    }
}

impl AntFunction for HandlerFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn ant(&self) -> AntId {
        self.ant
    }

    fn run(&self, args: Vec<Value>) -> Result<OutputStream, AntError> {
        let payload = self.payload(args);
        debug!(
            target: PROCESS_TARGET,
            function = %self.name,
            runtime = %self.runtime.name(),
            handler = %self.handler.display(),
            "dispatching handler function"
        );
        let invocation = [self.handler.to_string_lossy().into_owned(), payload];
        let lines = self
            .runtime
            .execute(&invocation, &ProcessOptions::new())
            .map_err(|source| AntError::HandlerDispatch {
                function: self.name.clone(),
                source: Box::new(source),
            })?;
        Ok(lines.map(|chunk| decode_output(chunk)))
    }
}
