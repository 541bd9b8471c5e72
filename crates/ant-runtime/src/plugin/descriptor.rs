//! Plugin descriptor shapes and their normalisation.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Plugin, PluginFactory};
use crate::error::AntError;

/// What to construct a plugin from.
#[derive(Clone)]
pub enum PluginReference {
    /// A catalog identifier.
    Path(String),
    /// A factory to call directly.
    Factory(Arc<dyn PluginFactory>),
}

impl PluginReference {
    /// Label used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.clone(),
            Self::Factory(factory) => factory.name().to_owned(),
        }
    }
}

impl fmt::Debug for PluginReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Factory(factory) => f.debug_tuple("Factory").field(&factory.name()).finish(),
        }
    }
}

/// Every accepted way of naming a plugin to load.
#[derive(Clone)]
pub enum PluginDescriptor {
    /// A catalog identifier without configuration.
    Path(String),
    /// A factory without configuration.
    Factory(Arc<dyn PluginFactory>),
    /// A reference paired with its configuration.
    WithConfig(PluginReference, Value),
    /// A single-key map entry: identifier to configuration.
    Keyed(String, Value),
    /// A plugin that already exists.
    Instance(Arc<dyn Plugin>),
    /// A configuration value still to be interpreted: a string, a
    /// `[identifier, config]` pair or a single-key map.
    Raw(Value),
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Factory(factory) => f.debug_tuple("Factory").field(&factory.name()).finish(),
            Self::WithConfig(reference, config) => f
                .debug_tuple("WithConfig")
                .field(reference)
                .field(config)
                .finish(),
            Self::Keyed(path, config) => {
                f.debug_tuple("Keyed").field(path).field(config).finish()
            }
            Self::Instance(plugin) => f.debug_tuple("Instance").field(plugin).finish(),
            Self::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

impl From<Value> for PluginDescriptor {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl From<Arc<dyn Plugin>> for PluginDescriptor {
    fn from(plugin: Arc<dyn Plugin>) -> Self {
        Self::Instance(plugin)
    }
}

impl From<Arc<dyn PluginFactory>> for PluginDescriptor {
    fn from(factory: Arc<dyn PluginFactory>) -> Self {
        Self::Factory(factory)
    }
}

/// The one canonical shape every descriptor reduces to.
pub(super) enum Normalised {
    /// Build a plugin from a reference and optional configuration.
    Construct(PluginReference, Option<Value>),
    /// Register an existing plugin.
    Instance(Arc<dyn Plugin>),
}

impl PluginDescriptor {
    /// Reduces the descriptor to a `(reference, config)` pair or an instance.
    pub(super) fn normalise(self) -> Result<Normalised, AntError> {
        match self {
            Self::Path(path) => Ok(Normalised::Construct(PluginReference::Path(path), None)),
            Self::Factory(factory) => {
                Ok(Normalised::Construct(PluginReference::Factory(factory), None))
            }
            Self::WithConfig(reference, config) => {
                Ok(Normalised::Construct(reference, present(config)))
            }
            Self::Keyed(path, config) => Ok(Normalised::Construct(
                PluginReference::Path(path),
                present(config),
            )),
            Self::Instance(plugin) => Ok(Normalised::Instance(plugin)),
            Self::Raw(value) => normalise_value(&value),
        }
    }
}

/// `null` configuration counts as none.
fn present(config: Value) -> Option<Value> {
    match config {
        Value::Null => None,
        other => Some(other),
    }
}

fn normalise_value(value: &Value) -> Result<Normalised, AntError> {
    let (path, config) = match value {
        Value::String(path) => (path.clone(), None),
        Value::Array(items) => match items.as_slice() {
            [Value::String(path)] => (path.clone(), None),
            [Value::String(path), config] => (path.clone(), present(config.clone())),
            _ => return Err(malformed(value)),
        },
        Value::Object(map) if map.len() == 1 => match map.iter().next() {
            Some((path, config)) => (path.clone(), present(config.clone())),
            None => return Err(malformed(value)),
        },
        _ => return Err(malformed(value)),
    };
    Ok(Normalised::Construct(PluginReference::Path(path), config))
}

fn malformed(value: &Value) -> AntError {
    AntError::PluginLoad {
        reference: value.to_string(),
        message: String::from(
            "malformed plugin descriptor: expected an identifier, an [identifier, config] pair or a single-key map",
        ),
    }
}
