//! Unit tests for the capability registries.

use std::fs;
use std::sync::Arc;
use std::thread;

use rstest::rstest;
use tempfile::TempDir;

use crate::capability::Capability;
use crate::error::AntError;
use crate::function::{AntFunction, HandlerFunction, ProcessFunction, Runtime};
use crate::host::Provider;
use crate::identity::AntId;
use crate::plugin::{Member, PluginCatalog, PluginDescriptor, PluginLoader};
use crate::registry::{FunctionRegistry, ProviderRegistry, RuntimeRegistry, TemplateRegistry};
use crate::template::Template;
use crate::tests::StubPlugin;

fn function(ant: AntId, name: &str, bin: &str) -> Arc<dyn AntFunction> {
    Arc::new(ProcessFunction::new(ant, name, bin))
}

fn runtime(ant: AntId, name: &str, version: &str) -> Arc<Runtime> {
    Arc::new(Runtime::new(ant, name, name.to_lowercase(), version).expect("valid version"))
}

fn bin_of(function: &Arc<dyn AntFunction>) -> String {
    format!("{function:?}")
}

// ---------------------------------------------------------------------------
// Name-keyed registries
// ---------------------------------------------------------------------------

#[test]
fn later_entries_replace_earlier_ones() {
    let ant = AntId::next();
    let registry = FunctionRegistry::new(ant);
    registry
        .load(vec![function(ant, "greet", "/opt/old")])
        .expect("owned by ant");
    registry
        .load(vec![function(ant, "greet", "/opt/new")])
        .expect("owned by ant");

    assert_eq!(registry.len(), 1);
    let stored = registry.get("greet").expect("greet is registered");
    assert!(bin_of(&stored).contains("/opt/new"));
}

#[test]
fn foreign_item_rejects_the_whole_batch() {
    let ant = AntId::next();
    let registry = FunctionRegistry::new(ant);
    let outcome = registry.load(vec![
        function(ant, "mine", "/opt/mine"),
        function(AntId::next(), "theirs", "/opt/theirs"),
    ]);

    match outcome {
        Err(AntError::RegistryOwnership {
            subject, expected, ..
        }) => {
            assert_eq!(subject, "function 'theirs'");
            assert_eq!(expected, ant);
        }
        other => panic!("expected an ownership error, got {other:?}"),
    }
    assert!(registry.is_empty());
}

const WRITERS: usize = 8;

fn writer_of(function: &Arc<dyn AntFunction>) -> Option<usize> {
    let description = bin_of(function);
    (0..WRITERS).find(|writer| description.contains(&format!("/opt/writer-{writer}/")))
}

#[test]
fn concurrent_loads_lose_no_writes() {
    let ant = AntId::next();
    let registry = FunctionRegistry::new(ant);
    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let target = &registry;
            scope.spawn(move || {
                for round in 0..25 {
                    let own = format!("writer-{writer}-{round}");
                    target
                        .load(vec![function(ant, &own, &format!("/opt/writer-{writer}/own"))])
                        .expect("owned by ant");
                }
                let shared = (0..10)
                    .map(|index| {
                        function(ant, &format!("shared-{index}"), &format!("/opt/writer-{writer}/shared"))
                    })
                    .collect();
                target.load(shared).expect("owned by ant");
            });
        }
    });

    assert_eq!(registry.len(), WRITERS * 25 + 10);
    for writer in 0..WRITERS {
        for round in 0..25 {
            let own = registry
                .get(format!("writer-{writer}-{round}").as_str())
                .expect("every disjoint write survives");
            assert_eq!(writer_of(&own), Some(writer));
        }
    }
    let winners: Vec<Option<usize>> = (0..10)
        .map(|index| {
            let entry = registry
                .get(format!("shared-{index}").as_str())
                .expect("shared name is registered");
            writer_of(&entry)
        })
        .collect();
    let first = winners.first().copied().flatten();
    assert!(first.is_some());
    assert!(
        winners.iter().all(|winner| *winner == first),
        "one batch wins as a whole: {winners:?}"
    );
}

#[test]
fn concurrent_runtime_loads_keep_one_entry_per_version() {
    let ant = AntId::next();
    let registry = RuntimeRegistry::new(ant);
    thread::scope(|scope| {
        for writer in 1..=WRITERS {
            let target = &registry;
            scope.spawn(move || {
                let bin = format!("/opt/writer-{writer}/bin");
                let batch = vec![
                    Arc::new(
                        Runtime::new(ant, "Node", bin.as_str(), &writer.to_string())
                            .expect("valid version"),
                    ),
                    Arc::new(Runtime::new(ant, "Shared", bin.as_str(), "1").expect("valid version")),
                    Arc::new(Runtime::new(ant, "Other", bin.as_str(), "1").expect("valid version")),
                ];
                target.load(batch).expect("owned by ant");
            });
        }
    });

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.all().len(), WRITERS + 2);
    for writer in 1..=WRITERS {
        let version = writer.to_string();
        let node = registry
            .get("Node", Some(version.as_str()))
            .expect("usable version")
            .expect("every version survives");
        assert_eq!(node.version(), version);
    }
    let shared = registry.get("Shared", Some("1")).expect("usable version").expect("registered");
    let other = registry.get("Other", Some("1")).expect("usable version").expect("registered");
    assert_eq!(shared.bin(), other.bin(), "one batch wins as a whole");
    assert!(registry.get("Node", None).expect("default slot").is_some());
}

#[test]
fn templates_are_keyed_by_category_and_name() {
    let ant = AntId::next();
    let registry = TemplateRegistry::new(ant);
    registry
        .load(vec![
            Arc::new(Template::new(ant, "Function", "node", "/t/fn-node")),
            Arc::new(Template::new(ant, "Function", "python", "/t/fn-python")),
            Arc::new(Template::new(ant, "Runtime", "node", "/t/rt-node")),
        ])
        .expect("owned by ant");

    let template = registry.template("Runtime", "node").expect("registered");
    assert_eq!(template.path().to_str(), Some("/t/rt-node"));
    assert!(registry.template("Host", "node").is_none());
    let names: Vec<String> = registry
        .category("Function")
        .iter()
        .map(|entry| entry.name().to_owned())
        .collect();
    assert_eq!(names, vec!["node", "python"]);
}

// ---------------------------------------------------------------------------
// Runtime registry
// ---------------------------------------------------------------------------

#[rstest]
#[case::exact_major(Some("8"), Some("8"))]
#[case::full_version(Some("8.11.0"), Some("8"))]
#[case::other_major(Some("10"), Some("10"))]
#[case::unknown_major(Some("9"), None)]
#[case::default_slot(None, Some("8"))]
fn runtimes_resolve_by_major_version(
    #[case] requested: Option<&str>,
    #[case] expected: Option<&str>,
) {
    let ant = AntId::next();
    let registry = RuntimeRegistry::new(ant);
    registry
        .load(vec![runtime(ant, "Node", "8.11.0"), runtime(ant, "Node", "10.1")])
        .expect("owned by ant");

    let found = registry.get("Node", requested).expect("valid version");
    assert_eq!(found.as_ref().map(|entry| entry.version()), expected);
}

#[test]
fn flagged_runtime_claims_default_slot() {
    let ant = AntId::next();
    let registry = RuntimeRegistry::new(ant);
    let flagged = Arc::new(
        Runtime::new(ant, "Node", "node", "10")
            .expect("valid version")
            .with_default(true),
    );
    registry
        .load(vec![runtime(ant, "Node", "8"), flagged])
        .expect("owned by ant");

    let chosen = registry.get("Node", None).expect("no version").expect("slot filled");
    assert_eq!(chosen.version(), "10");
    assert_eq!(registry.len(), 1);
    let versions: Vec<String> = registry
        .all()
        .iter()
        .map(|entry| entry.version().to_owned())
        .collect();
    assert_eq!(versions, vec!["10", "8"]);
}

#[rstest]
#[case::empty("")]
#[case::words("latest")]
fn unusable_version_is_invalid(#[case] version: &str) {
    let registry = RuntimeRegistry::new(AntId::next());
    let error = registry
        .get("Node", Some(version))
        .expect_err("version has no major component");
    assert!(matches!(error, AntError::InvalidVersion { .. }), "got {error}");
}

#[test]
fn resolving_an_unknown_reference_fails() {
    let ant = AntId::next();
    let registry = RuntimeRegistry::new(ant);
    registry
        .load(vec![runtime(ant, "Node", "8")])
        .expect("owned by ant");
    let error = registry
        .resolve(&ant_config::RuntimeReference::parse("Python 3"))
        .expect_err("Python is not registered");
    assert!(matches!(error, AntError::UnknownRuntime { .. }), "got {error}");
}

#[test]
fn default_runtime_must_belong_to_the_coordinator() {
    let ant = AntId::next();
    let registry = RuntimeRegistry::new(ant);
    registry
        .set_default_runtime(Some(runtime(ant, "Node", "8")))
        .expect("own runtime is accepted");
    let error = registry
        .set_default_runtime(Some(runtime(AntId::next(), "Node", "8")))
        .expect_err("foreign runtime is rejected");
    assert!(matches!(error, AntError::RegistryOwnership { .. }));
    assert_eq!(
        registry.default_runtime().map(|entry| entry.name().to_owned()),
        Some(String::from("Node"))
    );
}

// ---------------------------------------------------------------------------
// Plugin feed
// ---------------------------------------------------------------------------

#[test]
fn attached_registry_sees_plugins_before_and_after_attaching() {
    let ant = AntId::next();
    let loader = Arc::new(PluginLoader::new(ant, PluginCatalog::new()));
    loader.load([PluginDescriptor::Instance(
        StubPlugin::named(ant, "early")
            .with(Member::Providers, vec![Capability::from(Arc::new(Provider::new(ant, "Local")))])
            .shared(),
    )]);

    let providers = Arc::new(ProviderRegistry::new(ant));
    providers.attach(&loader);
    assert!(providers.get("Local").is_some());

    loader.load([PluginDescriptor::Instance(
        StubPlugin::named(ant, "late")
            .with(Member::Providers, vec![Capability::from(Arc::new(Provider::new(ant, "Cloud")))])
            .shared(),
    )]);
    assert!(providers.get("Cloud").is_some());
    assert_eq!(providers.len(), 2);
}

#[test]
fn runtimes_from_plugins_are_functions_too() {
    let ant = AntId::next();
    let loader = Arc::new(PluginLoader::new(ant, PluginCatalog::new()));
    let runtimes = Arc::new(RuntimeRegistry::new(ant));
    let functions = Arc::new(FunctionRegistry::new(ant));
    runtimes.attach(&loader);
    functions.attach(&loader);

    loader.load([PluginDescriptor::Instance(
        StubPlugin::named(ant, "node")
            .with(Member::Runtimes, vec![Capability::from(runtime(ant, "Node", "8"))])
            .with(Member::Functions, vec![Capability::from(runtime(ant, "Deno", "1"))])
            .shared(),
    )]);

    assert!(runtimes.get("Node", Some("8")).expect("valid").is_some());
    assert!(functions.get("Deno").is_some());
    assert!(loader.loading_errors().is_empty());
}

#[test]
fn foreign_capability_from_plugin_is_recorded() {
    let ant = AntId::next();
    let loader = Arc::new(PluginLoader::new(ant, PluginCatalog::new()));
    let functions = Arc::new(FunctionRegistry::new(ant));
    functions.attach(&loader);

    loader.load([PluginDescriptor::Instance(
        StubPlugin::named(ant, "smuggler")
            .with(
                Member::Functions,
                vec![Capability::from(function(AntId::next(), "stolen", "/opt/x"))],
            )
            .shared(),
    )]);

    assert!(functions.is_empty());
    assert!(matches!(
        loader.loading_errors().as_slice(),
        [AntError::RegistryOwnership { .. }]
    ));
}

#[test]
fn dropped_registry_stops_listening() {
    let ant = AntId::next();
    let loader = Arc::new(PluginLoader::new(ant, PluginCatalog::new()));
    let providers = Arc::new(ProviderRegistry::new(ant));
    providers.attach(&loader);
    drop(providers);

    let loaded = loader.load([PluginDescriptor::Instance(
        StubPlugin::named(ant, "orphan")
            .with(Member::Providers, vec![Capability::from(Arc::new(Provider::new(ant, "Local")))])
            .shared(),
    )]);
    assert_eq!(loaded.len(), 1);
    assert!(loader.loading_errors().is_empty());
}

// ---------------------------------------------------------------------------
// Handler discovery
// ---------------------------------------------------------------------------

fn handler_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for file in files {
        fs::write(dir.path().join(file), "// handler\n").expect("write handler");
    }
    fs::create_dir(dir.path().join("nested.js")).expect("create directory");
    dir
}

fn node_with_extensions(ant: AntId) -> Arc<Runtime> {
    Arc::new(
        Runtime::new(ant, "Node", "node", "8")
            .expect("valid version")
            .with_extensions(vec![String::from("js")]),
    )
}

#[test]
fn discovery_registers_matching_files() {
    let ant = AntId::next();
    let dir = handler_dir(&["hello.js", "bye.test.js", "notes.txt"]);
    let registry = FunctionRegistry::new(ant);

    let count = registry
        .discover(dir.path(), &node_with_extensions(ant))
        .expect("runtime is owned");

    assert_eq!(count, 2);
    assert!(registry.get("hello").is_some());
    assert!(registry.get("bye").is_some());
    assert!(registry.get("notes").is_none());
    assert!(registry.get("nested").is_none());
}

#[test]
fn discovered_handler_points_at_its_file() {
    let ant = AntId::next();
    let dir = handler_dir(&["hello.js"]);
    let registry = FunctionRegistry::new(ant);
    registry
        .discover(dir.path(), &node_with_extensions(ant))
        .expect("runtime is owned");

    let expected = HandlerFunction::new(
        ant,
        "hello",
        dir.path().join("hello.js"),
        node_with_extensions(ant),
    );
    let found = registry.get("hello").expect("hello is registered");
    assert!(format!("{found:?}").contains(&format!("{:?}", expected.handler())));
}

#[test]
fn runtime_without_extensions_discovers_nothing() {
    let ant = AntId::next();
    let dir = handler_dir(&["hello.js"]);
    let registry = FunctionRegistry::new(ant);
    let count = registry
        .discover(dir.path(), &runtime(ant, "Node", "8"))
        .expect("runtime is owned");
    assert_eq!(count, 0);
    assert!(registry.is_empty());
}

#[test]
fn unreadable_directory_discovers_nothing() {
    let ant = AntId::next();
    let dir = TempDir::new().expect("temp dir");
    let registry = FunctionRegistry::new(ant);
    let count = registry
        .discover(&dir.path().join("missing"), &node_with_extensions(ant))
        .expect("missing directories are tolerated");
    assert_eq!(count, 0);
}

#[test]
fn discovery_rejects_foreign_runtime() {
    let dir = handler_dir(&["hello.js"]);
    let registry = FunctionRegistry::new(AntId::next());
    let error = registry
        .discover(dir.path(), &node_with_extensions(AntId::next()))
        .expect_err("runtime belongs elsewhere");
    assert!(matches!(error, AntError::RegistryOwnership { .. }));
}
