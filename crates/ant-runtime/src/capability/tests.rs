//! Unit tests for capability kinds and conversions.

use std::sync::Arc;

use rstest::rstest;

use crate::capability::{Capability, CapabilityKind};
use crate::function::{AntFunction, ProcessFunction, Runtime};
use crate::host::{Host, Provider};
use crate::identity::AntId;
use crate::template::Template;

fn node(ant: AntId) -> Arc<Runtime> {
    Arc::new(Runtime::new(ant, "Node", "node", "8.11.0").expect("valid version"))
}

fn everything(ant: AntId) -> Vec<Capability> {
    let provider = Arc::new(Provider::new(ant, "Local"));
    let function: Arc<dyn AntFunction> = Arc::new(ProcessFunction::new(ant, "echo", "/bin/echo"));
    vec![
        Capability::from(function),
        Capability::from(node(ant)),
        Capability::from(Arc::new(Host::new(ant, "Default", Arc::clone(&provider)))),
        Capability::from(provider),
        Capability::from(Arc::new(Template::new(ant, "Function", "hello", "/tmp/hello"))),
    ]
}

#[rstest]
#[case::function(CapabilityKind::Function, "function")]
#[case::runtime(CapabilityKind::Runtime, "runtime")]
#[case::host(CapabilityKind::Host, "host")]
#[case::provider(CapabilityKind::Provider, "provider")]
#[case::template(CapabilityKind::Template, "template")]
fn kind_labels_are_lower_case(#[case] kind: CapabilityKind, #[case] expected: &str) {
    assert_eq!(kind.as_str(), expected);
    assert_eq!(kind.to_string(), expected);
}

#[test]
fn capabilities_report_kind_name_and_owner() {
    let ant = AntId::next();
    let described: Vec<_> = everything(ant)
        .iter()
        .map(|capability| (capability.kind(), capability.name().to_owned(), capability.ant()))
        .collect();
    assert_eq!(
        described,
        vec![
            (CapabilityKind::Function, String::from("echo"), ant),
            (CapabilityKind::Runtime, String::from("Node"), ant),
            (CapabilityKind::Host, String::from("Default"), ant),
            (CapabilityKind::Provider, String::from("Local"), ant),
            (CapabilityKind::Template, String::from("hello"), ant),
        ]
    );
}

#[test]
fn runtime_counts_as_function() {
    let function = Capability::from(node(AntId::next()))
        .into_function()
        .expect("runtimes are functions");
    assert_eq!(function.name(), "Node");
}

#[test]
fn data_capabilities_are_not_functions() {
    let ant = AntId::next();
    let rejected: Vec<CapabilityKind> = everything(ant)
        .into_iter()
        .filter_map(|capability| capability.into_function().err())
        .map(|capability| capability.kind())
        .collect();
    assert_eq!(
        rejected,
        vec![
            CapabilityKind::Host,
            CapabilityKind::Provider,
            CapabilityKind::Template
        ]
    );
}

#[test]
fn mismatched_conversion_returns_capability_unchanged() {
    let ant = AntId::next();
    let template = Capability::from(Arc::new(Template::new(ant, "Function", "hello", "/tmp")));
    let returned = template.into_runtime().expect_err("templates are not runtimes");
    assert_eq!(returned.kind(), CapabilityKind::Template);
    assert_eq!(returned.name(), "hello");

    let host_side = returned.into_host().expect_err("templates are not hosts");
    let provider_side = host_side
        .into_provider()
        .expect_err("templates are not providers");
    assert!(provider_side.into_template().is_ok());
}

#[test]
fn functions_are_not_runtimes() {
    let function: Arc<dyn AntFunction> =
        Arc::new(ProcessFunction::new(AntId::next(), "echo", "/bin/echo"));
    let returned = Capability::from(function)
        .into_runtime()
        .expect_err("plain functions are not runtimes");
    assert_eq!(returned.kind(), CapabilityKind::Function);
}
