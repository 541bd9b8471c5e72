//! Builds capabilities from configuration descriptors.

use std::sync::Arc;

use ant_config::{FunctionDescriptor, HostDescriptor, RuntimeDescriptor, TemplateDescriptor};

use crate::error::AntError;
use crate::function::{AntFunction, HandlerFunction, ProcessFunction, Runtime};
use crate::host::Host;
use crate::identity::AntId;
use crate::process::ProcessSpawner;
use crate::registry::{ProviderRegistry, RuntimeRegistry};
use crate::template::Template;

/// Reference shown when a handler relies on a default runtime that is unset.
const DEFAULT_RUNTIME_REFERENCE: &str = "(default)";

pub(crate) fn runtime(
    ant: AntId,
    descriptor: &RuntimeDescriptor,
    spawner: &Arc<dyn ProcessSpawner>,
) -> Result<Arc<Runtime>, AntError> {
    let mut runtime = Runtime::new(ant, &descriptor.name, &descriptor.bin, &descriptor.version)?
        .with_extensions(descriptor.extensions.clone())
        .with_default(descriptor.is_default)
        .with_spawner(Arc::clone(spawner));
    if let Some(template) = &descriptor.template {
        runtime = runtime.with_template(template);
    }
    Ok(Arc::new(runtime))
}

pub(crate) fn function(
    ant: AntId,
    descriptor: &FunctionDescriptor,
    runtimes: &RuntimeRegistry,
    spawner: &Arc<dyn ProcessSpawner>,
) -> Result<Arc<dyn AntFunction>, AntError> {
    match descriptor {
        FunctionDescriptor::Process { name, bin } => Ok(Arc::new(
            ProcessFunction::new(ant, name, bin).with_spawner(Arc::clone(spawner)),
        )),
        FunctionDescriptor::Handler {
            name,
            handler,
            runtime,
            args,
        } => {
            let backing = match runtime {
                Some(reference) => runtimes.resolve(reference)?,
                None => runtimes
                    .default_runtime()
                    .ok_or_else(|| AntError::UnknownRuntime {
                        reference: DEFAULT_RUNTIME_REFERENCE.to_owned(),
                    })?,
            };
            Ok(Arc::new(
                HandlerFunction::new(ant, name, handler, backing).with_args(args.clone()),
            ))
        }
    }
}

pub(crate) fn template(ant: AntId, descriptor: &TemplateDescriptor) -> Arc<Template> {
    Arc::new(Template::new(
        ant,
        &descriptor.category,
        &descriptor.name,
        &descriptor.path,
    ))
}

pub(crate) fn host(
    ant: AntId,
    descriptor: &HostDescriptor,
    providers: &ProviderRegistry,
) -> Result<Arc<Host>, AntError> {
    let provider = providers
        .get(descriptor.provider.as_str())
        .ok_or_else(|| AntError::UnknownProvider {
            host: descriptor.name.clone(),
            provider: descriptor.provider.clone(),
        })?;
    Ok(Arc::new(
        Host::new(ant, &descriptor.name, provider).with_config(descriptor.config.clone()),
    ))
}
