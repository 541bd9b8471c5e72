//! Invocable functions.
//!
//! Every function shares the [`AntFunction`] surface: it is called with JSON
//! arguments and answers with a stream of [`FunctionOutput`]. Three forms
//! exist: [`ProcessFunction`] spawns an executable, [`Runtime`] is a process
//! function that interprets handler files, and [`HandlerFunction`] runs a
//! handler file through a shared runtime.

mod handler;
mod process;
mod runtime;

use std::fmt;

use serde_json::Value;

use crate::broker::EventStream;
use crate::error::AntError;
use crate::identity::AntId;

pub use self::handler::{HandlerFunction, decode_output};
pub use self::process::ProcessFunction;
pub use self::runtime::{Runtime, coerce_major};

/// Stream returned by every function invocation.
pub type OutputStream = EventStream<FunctionOutput, AntError>;

/// One unit of function output.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    /// Raw text, as written by the process.
    Text(String),
    /// A decoded JSON value.
    Value(Value),
    /// The handler reported that it produced no value.
    Undefined,
}

impl FunctionOutput {
    /// Text of a [`FunctionOutput::Text`] item.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Value(_) | Self::Undefined => None,
        }
    }
}

/// The uniform invocation surface shared by every function kind.
pub trait AntFunction: fmt::Debug + Send + Sync {
    /// Name the function is registered under.
    fn name(&self) -> &str;

    /// Coordinator the function was built against.
    fn ant(&self) -> AntId;

    /// Invokes the function.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the invocation cannot start: invalid
    /// arguments, a spawn failure, or a runtime that cannot be dispatched.
    /// Failures after the stream exists arrive through the stream.
    fn run(&self, args: Vec<Value>) -> Result<OutputStream, AntError>;
}
