use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};

use super::{REGISTRY_TARGET, Registry, check_owners};
use crate::error::AntError;
use crate::function::{AntFunction, HandlerFunction, Runtime};

impl Registry<Arc<dyn AntFunction>> {
    /// Registers a handler function for every file directly inside
    /// `base_path` whose extension `runtime` handles. Each function is named
    /// after its file name up to the first dot.
    ///
    /// An unreadable directory is logged and yields zero functions.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::RegistryOwnership`] when `runtime` belongs to
    /// another coordinator.
    pub fn discover(&self, base_path: &Path, runtime: &Arc<Runtime>) -> Result<usize, AntError> {
        check_owners(self.ant(), std::slice::from_ref(runtime))?;
        if runtime.extensions().is_empty() {
            return Ok(0);
        }
        let entries = match fs::read_dir(base_path) {
            Ok(entries) => entries,
            Err(source) => {
                error!(
                    target: REGISTRY_TARGET,
                    path = %base_path.display(),
                    error = %source,
                    "could not read base path"
                );
                return Ok(0);
            }
        };

        let mut files: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path())
            .collect();
        files.sort();

        let found: Vec<Arc<dyn AntFunction>> = files
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?;
                if !runtime.handles(file_name) {
                    return None;
                }
                let name = file_name.split('.').next().filter(|stem| !stem.is_empty())?;
                let function = HandlerFunction::new(self.ant(), name, path.clone(), Arc::clone(runtime));
                Some(Arc::new(function) as Arc<dyn AntFunction>)
            })
            .collect();

        let count = found.len();
        debug!(
            target: REGISTRY_TARGET,
            path = %base_path.display(),
            runtime = runtime.name(),
            count,
            "discovered handler functions"
        );
        self.load(found)?;
        Ok(count)
    }
}
