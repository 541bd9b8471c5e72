//! Capability descriptors resolved from configuration documents.
//!
//! Raw entries mirror the YAML shape; [`ConfigLayer`](crate::ConfigLayer)
//! turns them into descriptors whose relative paths are already resolved
//! against the layer's base path.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

/// A reference to a runtime by name and optional version, as written in
/// `runtime: Node 8` or in a function's `runtime` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeReference {
    name: String,
    version: Option<String>,
}

impl RuntimeReference {
    /// Builds a reference from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parses `"<Name>"` or `"<Name> <version>"`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let (name, version) = split_versioned(text);
        Self::new(name, version.map(str::to_owned))
    }

    /// Runtime name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for RuntimeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Splits a trailing version off a key. The suffix after the last space is
/// only treated as a version when it starts with a digit, so names may
/// contain spaces.
fn split_versioned(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim();
    match trimmed.rsplit_once(' ') {
        Some((name, version)) if version.starts_with(|c: char| c.is_ascii_digit()) => {
            (name.trim_end(), Some(version))
        }
        _ => (trimmed, None),
    }
}

/// A runtime declared under `runtimes:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    /// Runtime name.
    pub name: String,
    /// Version as written; the runtime crate keeps only the major part.
    pub version: String,
    /// Interpreter executable.
    pub bin: PathBuf,
    /// Handler file extensions the runtime executes.
    pub extensions: Vec<String>,
    /// Optional template path for new handler files.
    pub template: Option<PathBuf>,
    /// Whether this runtime claims the default slot for its name.
    pub is_default: bool,
}

/// A function declared under `functions:`.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionDescriptor {
    /// Backed directly by an executable.
    Process {
        /// Function name.
        name: String,
        /// Executable path.
        bin: PathBuf,
    },
    /// Backed by a handler file run through a runtime.
    Handler {
        /// Function name.
        name: String,
        /// Handler file path.
        handler: PathBuf,
        /// Runtime to use; the coordinator's default runtime when absent.
        runtime: Option<RuntimeReference>,
        /// Fixed leading call arguments.
        args: Vec<Value>,
    },
}

impl FunctionDescriptor {
    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Process { name, .. } | Self::Handler { name, .. } => name,
        }
    }
}

/// A host declared under `hosts:`.
#[derive(Debug, Clone, PartialEq)]
pub struct HostDescriptor {
    /// Host name.
    pub name: String,
    /// Name of the provider serving the host.
    pub provider: String,
    /// Provider-specific settings, `null` when absent.
    pub config: Value,
}

/// A template declared under `templates:` (category, then name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescriptor {
    /// Template category.
    pub category: String,
    /// Template name within its category.
    pub name: String,
    /// Template file or directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RuntimeEntry {
    bin: PathBuf,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    template: Option<PathBuf>,
    #[serde(default, alias = "isDefault")]
    is_default: bool,
    #[serde(default)]
    version: Option<String>,
}

impl RuntimeEntry {
    pub(crate) fn resolve(self, key: &str, base: &Path) -> Result<RuntimeDescriptor, ConfigError> {
        let (name, key_version) = split_versioned(key);
        let version = key_version
            .map(str::to_owned)
            .or(self.version)
            .ok_or_else(|| ConfigError::MissingRuntimeVersion {
                key: key.to_owned(),
            })?;
        Ok(RuntimeDescriptor {
            name: name.to_owned(),
            version,
            bin: resolve_executable(base, &self.bin),
            extensions: self.extensions,
            template: self.template.map(|path| resolve_path(base, &path)),
            is_default: self.is_default,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FunctionEntry {
    #[serde(default)]
    bin: Option<PathBuf>,
    #[serde(default)]
    handler: Option<PathBuf>,
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default, alias = "runtimeVersion")]
    runtime_version: Option<String>,
    #[serde(default)]
    args: Vec<Value>,
}

impl FunctionEntry {
    pub(crate) fn resolve(self, name: &str, base: &Path) -> Result<FunctionDescriptor, ConfigError> {
        if let Some(bin) = self.bin {
            return Ok(FunctionDescriptor::Process {
                name: name.to_owned(),
                bin: resolve_executable(base, &bin),
            });
        }
        let handler = self.handler.ok_or_else(|| ConfigError::FunctionKind {
            name: name.to_owned(),
        })?;
        let runtime = self.runtime.map(|text| {
            let parsed = RuntimeReference::parse(&text);
            match self.runtime_version {
                Some(version) => RuntimeReference::new(parsed.name, Some(version)),
                None => parsed,
            }
        });
        Ok(FunctionDescriptor::Handler {
            name: name.to_owned(),
            handler: resolve_path(base, &handler),
            runtime,
            args: self.args,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HostEntry {
    provider: String,
    #[serde(default)]
    config: Value,
}

impl HostEntry {
    pub(crate) fn resolve(self, name: &str) -> HostDescriptor {
        HostDescriptor {
            name: name.to_owned(),
            provider: self.provider,
            config: self.config,
        }
    }
}

/// Anchors a relative path at `base`.
pub(crate) fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Bare command names (`node`, `python3`) are left for `PATH` lookup; anything
/// with a directory component is anchored at `base`.
pub(crate) fn resolve_executable(base: &Path, bin: &Path) -> PathBuf {
    if bin.components().count() > 1 {
        resolve_path(base, bin)
    } else {
        bin.to_path_buf()
    }
}
