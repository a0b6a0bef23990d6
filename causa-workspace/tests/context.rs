//! End-to-end exercise of `Context::init`: discovery, module loading, the
//! processor pipeline, and rendering, wired together the way a real
//! embedder would use them, through the public facade rather than a
//! single component in isolation.

use async_trait::async_trait;
use causa_registry::{FunctionDefinition, FunctionImplementation, RegistryResult};
use causa_value::Value;
use causa_workspace::context::{CloneOptions, Context, InitOptions, ProcessorInstruction, RenderOptions};
use causa_workspace::modules::{InstalledModules, Module, ModuleCapabilities};
use causa_workspace::{WorkspaceError, WorkspaceResult};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn workspace(body: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("causa.yaml"), body).unwrap();
    dir
}

#[tokio::test]
async fn init_discovers_root_and_renders_configuration() {
    let dir = workspace("workspace:\n  name: w\na: 1\nb:\n  - x\nc:\n  $format: \"${ configuration('a') }\"\n");
    let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
    assert_eq!(context.root_path(), dir.path());
    assert_eq!(context.project_path(), None);

    let rendered = context.get_and_render(Some("c"), RenderOptions::default()).await.unwrap();
    assert_eq!(rendered, Value::from("1"));

    let whole = context.get_and_render(None, RenderOptions::default()).await.unwrap();
    let m = whole.as_map().unwrap();
    assert_eq!(m.get("a"), Some(&Value::from(1_i64)));
}

struct Echo;
impl FunctionDefinition for Echo {
    const NAME: &'static str = "echo";
}

#[derive(serde::Deserialize)]
struct EchoImpl {}

#[async_trait]
impl FunctionImplementation<Context> for EchoImpl {
    fn supports(&self, _ctx: &Context) -> bool {
        true
    }
    async fn call(&self, _ctx: &Context) -> RegistryResult<Value> {
        let mut configuration = causa_value::Map::new();
        configuration.insert("injected".to_string(), Value::from("yes"));
        let mut out = causa_value::Map::new();
        out.insert("configuration".to_string(), Value::Map(configuration));
        Ok(Value::Map(out))
    }
}

struct EchoModule;
#[async_trait]
impl Module for EchoModule {
    fn declared_version(&self) -> &str {
        "1.0.0"
    }
    async fn register(&self, capabilities: &ModuleCapabilities) -> WorkspaceResult<()> {
        capabilities.register_function_implementations(|registry| {
            registry.register::<Echo, EchoImpl>().expect("single registration");
        });
        Ok(())
    }
}

#[tokio::test]
async fn processor_output_merges_as_a_new_layer() {
    let dir = workspace("workspace:\n  name: w\ncausa:\n  modules:\n    echo-module: \"^1.0.0\"\n");
    let mut installed: InstalledModules = std::collections::HashMap::new();
    installed.insert("echo-module".to_string(), Arc::new(EchoModule) as Arc<dyn Module>);

    let options = InitOptions::new(dir.path())
        .with_installed_modules(installed)
        .with_processors(vec![ProcessorInstruction::new("echo", Value::empty_map())]);
    let context = Context::init(options).await.unwrap();

    let injected = context.get(Some("injected"), causa_config::GetOptions::default()).unwrap();
    assert_eq!(injected, Some(Value::from("yes")));
}

#[tokio::test]
async fn project_path_is_detected_below_workspace_root() {
    let dir = workspace("workspace:\n  name: w\n");
    let project_dir = dir.path().join("service-a");
    fs::create_dir(&project_dir).unwrap();
    fs::write(project_dir.join("causa.yaml"), "project:\n  name: service-a\n").unwrap();

    let context = Context::init(InitOptions::new(&project_dir)).await.unwrap();
    assert_eq!(context.root_path(), dir.path());
    assert_eq!(context.project_path(), Some(project_dir.as_path()));
    assert!(context.require_project_path().is_ok());
}

#[tokio::test]
async fn clone_with_new_environment_keeps_processor_history() {
    let dir = workspace("workspace:\n  name: w\nenvironments:\n  staging:\n    configuration:\n      tier: hot\n");
    let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
    let cloned = context
        .clone_with(CloneOptions {
            environment: Some("staging".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(cloned.environment(), Some("staging"));
    let tier = cloned.get(Some("tier"), causa_config::GetOptions::default()).unwrap();
    assert_eq!(tier, Some(Value::from("hot")));
}

#[tokio::test]
async fn missing_environment_fails_fast() {
    let dir = workspace("workspace:\n  name: w\n");
    let err = Context::init(InitOptions::new(dir.path()).with_environment("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::Config(causa_config::ConfigError::ValueNotFound { .. })));
}
