//! Unit tests for configuration parsing.

use std::path::{Path, PathBuf};

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;

const DOCUMENT: &str = r"
service: demo
basePath: project
plugins:
  - core
  - [graphql, { port: 3000 }]
  - serverless: { region: eu-west-1 }
templates:
  Service:
    Default: templates/service
    Absolute: /srv/templates/other
runtimes:
  Node 8.11.0:
    bin: node
    extensions: [js]
  Python 3:
    bin: ./bin/python3
    extensions: [py]
    template: templates/python.py
    is_default: true
runtime: Node 8
functions:
  hello:
    bin: bin/hello.sh
  greet:
    handler: functions/greet.js
    runtime: Node
    runtime_version: '8'
    args: [fixed]
  plain:
    handler: functions/plain.py
hosts:
  Default:
    provider: Local
  Cloud:
    provider: Aws
    config:
      region: eu-west-1
log_filter: debug
log_format: json
";

#[fixture]
fn layer() -> ConfigLayer {
    match ConfigLayer::parse(DOCUMENT, Path::new("/work"), "inline") {
        Ok(layer) => layer,
        Err(error) => panic!("document should parse: {error}"),
    }
}

#[rstest]
fn base_path_resolves_against_document_directory(layer: ConfigLayer) {
    assert_eq!(layer.base_path(), Path::new("/work/project"));
    assert_eq!(layer.service(), Some("demo"));
}

#[rstest]
fn plugins_are_kept_verbatim(layer: ConfigLayer) {
    assert_eq!(
        layer.plugins(),
        &[
            json!("core"),
            json!(["graphql", { "port": 3000 }]),
            json!({ "serverless": { "region": "eu-west-1" } }),
        ]
    );
}

#[rstest]
fn templates_flatten_in_document_order(layer: ConfigLayer) {
    let templates: Vec<_> = layer
        .templates()
        .iter()
        .map(|template| (template.category.as_str(), template.name.as_str(), template.path.clone()))
        .collect();
    assert_eq!(
        templates,
        vec![
            ("Service", "Default", PathBuf::from("/work/project/templates/service")),
            ("Service", "Absolute", PathBuf::from("/srv/templates/other")),
        ]
    );
}

#[rstest]
fn runtimes_split_name_and_version(layer: ConfigLayer) {
    let runtimes = layer.runtimes();
    assert_eq!(runtimes.len(), 2);
    let node = runtimes.first().map(|runtime| (runtime.name.as_str(), runtime.version.as_str()));
    assert_eq!(node, Some(("Node", "8.11.0")));
    let python = runtimes.get(1);
    assert_eq!(python.map(|runtime| runtime.bin.clone()), Some(PathBuf::from("/work/project/./bin/python3")));
    assert_eq!(python.map(|runtime| runtime.is_default), Some(true));
    assert_eq!(
        python.and_then(|runtime| runtime.template.clone()),
        Some(PathBuf::from("/work/project/templates/python.py"))
    );
}

#[rstest]
fn bare_runtime_binaries_stay_on_path(layer: ConfigLayer) {
    let node = layer.runtimes().first().map(|runtime| runtime.bin.clone());
    assert_eq!(node, Some(PathBuf::from("node")));
}

#[rstest]
fn functions_become_process_or_handler_descriptors(layer: ConfigLayer) {
    let functions = layer.functions();
    assert_eq!(
        functions.first(),
        Some(&FunctionDescriptor::Process {
            name: "hello".to_owned(),
            bin: PathBuf::from("/work/project/bin/hello.sh"),
        })
    );
    assert_eq!(
        functions.get(1),
        Some(&FunctionDescriptor::Handler {
            name: "greet".to_owned(),
            handler: PathBuf::from("/work/project/functions/greet.js"),
            runtime: Some(RuntimeReference::new("Node", Some("8".to_owned()))),
            args: vec![json!("fixed")],
        })
    );
    assert_eq!(
        functions.get(2),
        Some(&FunctionDescriptor::Handler {
            name: "plain".to_owned(),
            handler: PathBuf::from("/work/project/functions/plain.py"),
            runtime: None,
            args: Vec::new(),
        })
    );
}

#[rstest]
fn hosts_carry_provider_and_config(layer: ConfigLayer) {
    let hosts = layer.hosts();
    assert_eq!(hosts.first().map(|host| host.config.clone()), Some(serde_json::Value::Null));
    assert_eq!(hosts.get(1).map(|host| host.provider.as_str()), Some("Aws"));
    assert_eq!(
        hosts.get(1).map(|host| host.config.clone()),
        Some(json!({ "region": "eu-west-1" }))
    );
}

#[rstest]
fn selected_runtime_and_logging_are_read(layer: ConfigLayer) {
    assert_eq!(layer.runtime(), Some(&RuntimeReference::new("Node", Some("8".to_owned()))));
    assert_eq!(layer.log_filter(), Some("debug"));
    assert_eq!(layer.log_format(), Some(LogFormat::Json));
}

#[rstest]
fn empty_document_is_an_empty_layer() {
    let layer = match ConfigLayer::parse("   \n", Path::new("/work"), "empty") {
        Ok(layer) => layer,
        Err(error) => panic!("empty document should parse: {error}"),
    };
    assert!(layer.functions().is_empty());
    assert_eq!(layer.base_path(), Path::new("/work"));
}

fn parsed(text: &str, directory: &str) -> ConfigLayer {
    match ConfigLayer::parse(text, Path::new(directory), directory) {
        Ok(layer) => layer,
        Err(error) => panic!("document should parse: {error}"),
    }
}

#[rstest]
#[case::global_only("base_path: /srv/app\n", "service: demo\n", "/srv/app")]
#[case::local_wins("base_path: /srv/app\n", "base_path: /srv/local\n", "/srv/local")]
#[case::relative_local("base_path: /srv/app\n", "base_path: site\n", "/work/project/site")]
#[case::neither("service: global\n", "service: demo\n", "/work/project")]
fn base_path_comes_from_the_last_layer_declaring_one(
    #[case] global: &str,
    #[case] local: &str,
    #[case] expected: &str,
) {
    let config = Config::from_layers(vec![
        parsed(global, "/home/user/.config/ant"),
        parsed(local, "/work/project"),
    ]);
    assert_eq!(config.base_path(), Some(Path::new(expected)));
}

#[rstest]
fn declared_base_path_is_absent_when_defaulted() {
    let layer = parsed("service: demo\n", "/work");
    assert_eq!(layer.declared_base_path(), None);
    assert_eq!(layer.base_path(), Path::new("/work"));
}

#[rstest]
fn function_without_bin_or_handler_is_rejected() {
    let result = ConfigLayer::parse("functions:\n  broken:\n    runtime: Node\n", Path::new("/w"), "t");
    assert!(matches!(result, Err(ConfigError::FunctionKind { name }) if name == "broken"));
}

#[rstest]
fn runtime_without_version_is_rejected() {
    let result = ConfigLayer::parse("runtimes:\n  Node:\n    bin: node\n", Path::new("/w"), "t");
    assert!(matches!(result, Err(ConfigError::MissingRuntimeVersion { key }) if key == "Node"));
}

#[rstest]
fn runtime_version_may_come_from_the_body() {
    let text = "runtimes:\n  Node:\n    bin: node\n    version: '10.1'\n";
    let layer = match ConfigLayer::parse(text, Path::new("/w"), "t") {
        Ok(layer) => layer,
        Err(error) => panic!("document should parse: {error}"),
    };
    assert_eq!(layer.runtimes().first().map(|runtime| runtime.version.as_str()), Some("10.1"));
}

#[rstest]
fn malformed_yaml_reports_origin() {
    let result = ConfigLayer::parse("functions: [unclosed", Path::new("/w"), "broken.yml");
    assert!(matches!(result, Err(ConfigError::Parse { origin, .. }) if origin == "broken.yml"));
}

#[rstest]
fn empty_configuration_uses_defaults() {
    let config = Config::default();
    assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.runtime(), None);
    assert_eq!(config.log_settings(), LogSettings::default());
}

#[rstest]
#[case("json", LogFormat::Json)]
#[case("COMPACT", LogFormat::Compact)]
fn log_format_parses_case_insensitively(#[case] text: &str, #[case] expected: LogFormat) {
    assert_eq!(text.parse::<LogFormat>().ok(), Some(expected));
}
