//! File templates, keyed by category and name.

use std::path::{Path, PathBuf};

use crate::identity::AntId;

/// A template file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    ant: AntId,
    category: String,
    name: String,
    path: PathBuf,
}

impl Template {
    /// Creates a template.
    #[must_use]
    pub fn new(
        ant: AntId,
        category: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ant,
            category: category.into(),
            name: name.into(),
            path: path.into(),
        }
    }

    /// Template category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Template name within its category.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinator the template was built against.
    #[must_use]
    pub const fn ant(&self) -> AntId {
        self.ant
    }

    /// Template location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
