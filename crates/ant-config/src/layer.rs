//! One parsed configuration document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::descriptor::{
    FunctionDescriptor, FunctionEntry, HostDescriptor, HostEntry, RuntimeDescriptor,
    RuntimeEntry, RuntimeReference, TemplateDescriptor, resolve_path,
};
use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::ordered::OrderedMap;

/// Raw shape of an `ant.yml` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    service: Option<String>,
    #[serde(alias = "basePath")]
    base_path: Option<PathBuf>,
    plugins: Vec<Value>,
    templates: OrderedMap<OrderedMap<PathBuf>>,
    runtimes: OrderedMap<RuntimeEntry>,
    runtime: Option<String>,
    functions: OrderedMap<FunctionEntry>,
    hosts: OrderedMap<HostEntry>,
    log_filter: Option<String>,
    log_format: Option<LogFormat>,
}

/// A configuration document with every relative path resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    source: Option<PathBuf>,
    base_path: PathBuf,
    base_path_declared: bool,
    service: Option<String>,
    plugins: Vec<Value>,
    templates: Vec<TemplateDescriptor>,
    runtimes: Vec<RuntimeDescriptor>,
    runtime: Option<RuntimeReference>,
    functions: Vec<FunctionDescriptor>,
    hosts: Vec<HostDescriptor>,
    log_filter: Option<String>,
    log_format: Option<LogFormat>,
}

impl ConfigLayer {
    /// Reads the document at `path`. A missing file yields `Ok(None)`.
    ///
    /// Relative paths inside the document are resolved against its
    /// `base_path`, which itself defaults to the document's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file exists but cannot be read
    /// and the parse errors of [`ConfigLayer::parse`].
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: Arc::new(error),
                });
            }
        };
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let mut layer = Self::parse(&text, directory, &path.display().to_string())?;
        layer.source = Some(path.to_path_buf());
        Ok(Some(layer))
    }

    /// Parses YAML `text` as if it lived in `directory`.
    ///
    /// `origin` labels the document in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML and the descriptor
    /// errors raised for incomplete function or runtime entries.
    pub fn parse(text: &str, directory: &Path, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = if text.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_saphyr::from_str(text).map_err(|error| ConfigError::Parse {
                origin: origin.to_owned(),
                message: error.to_string(),
            })?
        };
        Self::from_file(file, directory)
    }

    fn from_file(file: ConfigFile, directory: &Path) -> Result<Self, ConfigError> {
        let base_path_declared = file.base_path.is_some();
        let base_path = file
            .base_path
            .map_or_else(|| directory.to_path_buf(), |base| resolve_path(directory, &base));

        let templates = file
            .templates
            .into_iter()
            .flat_map(|(category, entries)| {
                let base = &base_path;
                entries.into_iter().map(move |(name, path)| TemplateDescriptor {
                    category: category.clone(),
                    name,
                    path: resolve_path(base, &path),
                })
            })
            .collect();

        let runtimes = file
            .runtimes
            .into_iter()
            .map(|(key, entry)| entry.resolve(&key, &base_path))
            .collect::<Result<Vec<_>, _>>()?;

        let functions = file
            .functions
            .into_iter()
            .map(|(name, entry)| entry.resolve(&name, &base_path))
            .collect::<Result<Vec<_>, _>>()?;

        let hosts = file
            .hosts
            .into_iter()
            .map(|(name, entry)| entry.resolve(&name))
            .collect();

        Ok(Self {
            source: None,
            base_path,
            base_path_declared,
            service: file.service,
            plugins: file.plugins,
            templates,
            runtimes,
            runtime: file.runtime.as_deref().map(RuntimeReference::parse),
            functions,
            hosts,
            log_filter: file.log_filter,
            log_format: file.log_format,
        })
    }

    /// File the layer was read from, when it came from disk.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory relative paths were resolved against.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Base path, when the document declares one.
    #[must_use]
    pub fn declared_base_path(&self) -> Option<&Path> {
        self.base_path_declared.then_some(self.base_path.as_path())
    }

    /// Service name, if set.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Plugin descriptors in document order, uninterpreted.
    #[must_use]
    pub fn plugins(&self) -> &[Value] {
        &self.plugins
    }

    /// Templates in document order.
    #[must_use]
    pub fn templates(&self) -> &[TemplateDescriptor] {
        &self.templates
    }

    /// Runtimes in document order.
    #[must_use]
    pub fn runtimes(&self) -> &[RuntimeDescriptor] {
        &self.runtimes
    }

    /// Selected default runtime, if set.
    #[must_use]
    pub const fn runtime(&self) -> Option<&RuntimeReference> {
        self.runtime.as_ref()
    }

    /// Functions in document order.
    #[must_use]
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Hosts in document order.
    #[must_use]
    pub fn hosts(&self) -> &[HostDescriptor] {
        &self.hosts
    }

    /// Log filter override, if set.
    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log_filter.as_deref()
    }

    /// Log format override, if set.
    #[must_use]
    pub const fn log_format(&self) -> Option<LogFormat> {
        self.log_format
    }
}
