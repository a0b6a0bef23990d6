//! The workspace context: the public facade over configuration,
//! templates, the function registry, modules, services and secrets.

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::modules::{self, InstalledModules};
use crate::secrets;
use crate::service::ServiceCache;
use async_trait::async_trait;
use causa_config::{load_workspace_configuration, ConfigurationReader, GetOptions, RawConfiguration};
use causa_registry::{FunctionDefinition, FunctionDefinitionMeta, FunctionImplementation, FunctionRegistry};
use causa_template::{Fetcher, FetcherTable, FnFetcher};
use causa_value::Value;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn check_cancelled(token: Option<&CancellationToken>) -> WorkspaceResult<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(WorkspaceError::Cancelled),
        _ => Ok(()),
    }
}

/// One entry of the processor pipeline run during `init`/`clone`.
#[derive(Debug, Clone)]
pub struct ProcessorInstruction {
    /// The registered function name to call.
    pub name: String,
    /// The arguments to call it with.
    pub args: Value,
}

impl ProcessorInstruction {
    /// Builds a processor instruction.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self { name: name.into(), args }
    }
}

/// Options controlling [`Context::init`].
pub struct InitOptions {
    /// The directory `init` discovers configuration files upward from.
    pub working_directory: PathBuf,
    /// The `environments.<id>` overlay to apply, if any.
    pub environment: Option<String>,
    /// Processor instructions to run, in order, after module loading.
    pub processors: Vec<ProcessorInstruction>,
    /// Where installed modules are resolved from; defaults to
    /// `<root>/.causa/node_modules`.
    pub modules_root: Option<PathBuf>,
    /// The engine's view of which modules are installed; see
    /// [`crate::modules`] for why this replaces dynamic `import()`.
    pub installed_modules: InstalledModules,
    /// Checked before module loading starts and before each processor
    /// call; a token cancelled mid-flight does not interrupt whatever
    /// module or processor is already running.
    pub cancellation: Option<CancellationToken>,
}

impl InitOptions {
    /// Builds options with no environment, no processors, and no
    /// installed modules.
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            environment: None,
            processors: Vec::new(),
            modules_root: None,
            installed_modules: HashMap::new(),
            cancellation: None,
        }
    }

    /// Sets the cancellation token checked at suspension points during
    /// module loading and processor application.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Sets the environment overlay.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Sets the processor pipeline.
    pub fn with_processors(mut self, processors: Vec<ProcessorInstruction>) -> Self {
        self.processors = processors;
        self
    }

    /// Sets the installed-modules table.
    pub fn with_installed_modules(mut self, installed_modules: InstalledModules) -> Self {
        self.installed_modules = installed_modules;
        self
    }
}

/// How [`Context::clone_with`] should treat the processor pipeline:
/// existing processors keep running unless explicitly cleared.
#[derive(Default)]
pub enum ProcessorOverride {
    /// Keep running exactly the instructions already applied.
    #[default]
    Unspecified,
    /// Clear processor history; run none.
    Clear,
    /// Run the existing instructions, then these additional ones.
    Append(Vec<ProcessorInstruction>),
}

/// Options controlling [`Context::clone_with`].
#[derive(Default)]
pub struct CloneOptions {
    /// Overrides the environment; `None` keeps the source context's.
    pub environment: Option<String>,
    /// How to treat the processor pipeline.
    pub processors: ProcessorOverride,
    /// Checked before each processor call, as in [`InitOptions`].
    pub cancellation: Option<CancellationToken>,
}

/// Options controlling [`Context::get_and_render`]/
/// `get_and_render_or_throw`.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// When `false`, the injected `secret(id)` fetcher returns the empty
    /// string instead of resolving.
    pub render_secrets: bool,
    /// Checked once before rendering begins; a cancelled token fails the
    /// call instead of running the discovery/barrier/substitution pass.
    pub cancellation: Option<CancellationToken>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            render_secrets: true,
            cancellation: None,
        }
    }
}

impl RenderOptions {
    /// Builds the default options with a cancellation token attached.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation: Some(cancellation),
            ..Self::default()
        }
    }
}

struct ContextInner {
    reader: ConfigurationReader,
    registry: Arc<Mutex<FunctionRegistry<Context>>>,
    working_directory: PathBuf,
    root_path: PathBuf,
    project_path: Option<PathBuf>,
    environment: Option<String>,
    modules_root: PathBuf,
    installed_modules: InstalledModules,
    service_cache: ServiceCache,
    processor_history: Vec<ProcessorInstruction>,
}

/// An initialized workspace: merged configuration, a function registry
/// populated by loaded modules, and the per-context service cache.
/// Cheap to clone (an `Arc` around shared, conceptually immutable
/// state); the only lifecycle is `Uninitialized -> Initialized ->
/// Cloned`.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Discovers configuration, loads modules, and runs the processor
    /// pipeline, producing an initialized context.
    pub async fn init(options: InitOptions) -> WorkspaceResult<Context> {
        let discovered = load_workspace_configuration(&options.working_directory, options.environment.as_deref())?;
        let modules_root = options
            .modules_root
            .unwrap_or_else(|| discovered.root_path.join(".causa").join("node_modules"));

        let registry = Arc::new(Mutex::new(FunctionRegistry::<Context>::new()));
        let declared_modules = discovered
            .reader
            .get(Some("causa.modules"), GetOptions { unsafe_access: true })?
            .and_then(|v| v.as_map().cloned())
            .unwrap_or_default();
        modules::load_modules(
            &declared_modules,
            &options.installed_modules,
            registry.clone(),
            options.cancellation.as_ref(),
        )
        .await?;
        info!(modules = declared_modules.len(), "module loading complete");

        let context = Context {
            inner: Arc::new(ContextInner {
                reader: discovered.reader,
                registry,
                working_directory: options.working_directory,
                root_path: discovered.root_path,
                project_path: discovered.project_path,
                environment: options.environment,
                modules_root,
                installed_modules: options.installed_modules,
                service_cache: ServiceCache::new(),
                processor_history: Vec::new(),
            }),
        };

        context.apply_processors(options.processors, options.cancellation.as_ref()).await
    }

    /// Re-discovers configuration (optionally with a new environment)
    /// and re-runs the processor pipeline, reusing the already-loaded,
    /// now read-only function registry: the registry is append-only
    /// during module loading and read-only from then on.
    pub async fn clone_with(&self, options: CloneOptions) -> WorkspaceResult<Context> {
        let environment = options.environment.or_else(|| self.inner.environment.clone());
        let discovered = load_workspace_configuration(&self.inner.working_directory, environment.as_deref())?;

        let processors = match options.processors {
            ProcessorOverride::Unspecified => self.inner.processor_history.clone(),
            ProcessorOverride::Clear => Vec::new(),
            ProcessorOverride::Append(more) => {
                let mut combined = self.inner.processor_history.clone();
                combined.extend(more);
                combined
            }
        };

        let context = Context {
            inner: Arc::new(ContextInner {
                reader: discovered.reader,
                registry: self.inner.registry.clone(),
                working_directory: self.inner.working_directory.clone(),
                root_path: discovered.root_path,
                project_path: discovered.project_path,
                environment,
                modules_root: self.inner.modules_root.clone(),
                installed_modules: self.inner.installed_modules.clone(),
                service_cache: ServiceCache::new(),
                processor_history: Vec::new(),
            }),
        };

        context.apply_processors(processors, options.cancellation.as_ref()).await
    }

    async fn apply_processors(
        mut self,
        instructions: Vec<ProcessorInstruction>,
        cancellation: Option<&CancellationToken>,
    ) -> WorkspaceResult<Context> {
        for instruction in instructions {
            check_cancelled(cancellation)?;
            self.validate_function_arguments(&instruction.name, &instruction.args)?;
            let output = self.call_by_name(&instruction.name, &instruction.args).await?;
            let configuration = output
                .as_map()
                .and_then(|m| m.get("configuration"))
                .and_then(Value::as_map)
                .cloned()
                .ok_or_else(|| WorkspaceError::InvalidProcessorOutput(instruction.name.clone()))?;

            debug!(processor = %instruction.name, "processor applied, merging output as a new layer");
            let new_reader = self
                .inner
                .reader
                .merged_with([RawConfiguration::from_processor(instruction.name.clone(), Value::Map(configuration))]);

            let mut history = self.inner.processor_history.clone();
            history.push(instruction);

            self = Context {
                inner: Arc::new(ContextInner {
                    reader: new_reader,
                    registry: self.inner.registry.clone(),
                    working_directory: self.inner.working_directory.clone(),
                    root_path: self.inner.root_path.clone(),
                    project_path: self.inner.project_path.clone(),
                    environment: self.inner.environment.clone(),
                    modules_root: self.inner.modules_root.clone(),
                    installed_modules: self.inner.installed_modules.clone(),
                    service_cache: ServiceCache::new(),
                    processor_history: history,
                }),
            };
        }
        Ok(self)
    }

    /// The underlying configuration reader.
    pub fn reader(&self) -> &ConfigurationReader {
        &self.inner.reader
    }

    /// The directory of the configuration file declaring `workspace.name`.
    pub fn root_path(&self) -> &Path {
        &self.inner.root_path
    }

    /// The directory of the configuration file declaring `project.name`,
    /// if any.
    pub fn project_path(&self) -> Option<&Path> {
        self.inner.project_path.as_deref()
    }

    /// Requires a project root, failing with
    /// [`WorkspaceError::ContextNotAProject`] otherwise.
    pub fn require_project_path(&self) -> WorkspaceResult<&Path> {
        self.project_path().ok_or_else(|| WorkspaceError::ContextNotAProject {
            working_directory: self.inner.working_directory.clone(),
        })
    }

    /// The active environment id, if any.
    pub fn environment(&self) -> Option<&str> {
        self.inner.environment.as_deref()
    }

    /// Requires an active environment, failing with
    /// [`WorkspaceError::EnvironmentNotSet`] otherwise.
    pub fn require_environment(&self) -> WorkspaceResult<&str> {
        self.environment().ok_or(WorkspaceError::EnvironmentNotSet)
    }

    /// See [`causa_config::ConfigurationReader::get`].
    pub fn get(&self, path: Option<&str>, options: GetOptions) -> WorkspaceResult<Option<Value>> {
        Ok(self.inner.reader.get(path, options)?)
    }

    /// See [`causa_config::ConfigurationReader::get_or_throw`].
    pub fn get_or_throw(&self, path: &str, options: GetOptions) -> WorkspaceResult<Value> {
        Ok(self.inner.reader.get_or_throw(path, options)?)
    }

    /// Renders `path` (or the whole tree), injecting `secret(id)` on top
    /// of the reader's own `configuration(path)` fetcher.
    pub async fn get_and_render(&self, path: Option<&str>, options: RenderOptions) -> WorkspaceResult<Value> {
        check_cancelled(options.cancellation.as_ref())?;
        let fetchers = self.render_fetchers(options);
        Ok(self.inner.reader.get_and_render(fetchers, path).await?)
    }

    /// Like [`Self::get_and_render`] but fails with
    /// [`causa_config::ConfigError::ValueNotFound`] if `path` is absent.
    pub async fn get_and_render_or_throw(&self, path: &str, options: RenderOptions) -> WorkspaceResult<Value> {
        self.get(Some(path), GetOptions { unsafe_access: true })?
            .ok_or_else(|| causa_config::ConfigError::ValueNotFound { path: path.to_string() })?;
        self.get_and_render(Some(path), options).await
    }

    /// Renders the whole tree and deserializes it into `C`.
    pub async fn as_configuration<C: DeserializeOwned>(&self) -> WorkspaceResult<C> {
        let rendered = self.get_and_render(None, RenderOptions::default()).await?;
        let json = serde_json::to_value(&rendered).map_err(WorkspaceError::from)?;
        Ok(serde_json::from_value(json).map_err(WorkspaceError::from)?)
    }

    fn render_fetchers(&self, options: RenderOptions) -> FetcherTable {
        let mut fetchers: FetcherTable = HashMap::new();
        let secret_fetcher: Arc<dyn Fetcher> = if options.render_secrets {
            Arc::new(SecretFetcher { context: self.clone() })
        } else {
            Arc::new(FnFetcher(|_args: &[String]| Ok(Value::from(String::new()))))
        };
        fetchers.insert("secret".to_string(), secret_fetcher);
        fetchers
    }

    /// Dispatches to the single implementation of `D` whose `supports`
    /// returns true, without validating `args`.
    pub async fn call<D: FunctionDefinition>(&self, args: &Value) -> WorkspaceResult<Value> {
        let implementation = {
            let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
            registry.get_implementation(D::NAME, args, self)?
        };
        Ok(implementation.call(self).await?)
    }

    /// Dispatches to every implementation of `D` whose `supports`
    /// returns true.
    pub async fn call_all<D: FunctionDefinition>(&self, args: &Value) -> WorkspaceResult<Vec<Value>> {
        let implementations = {
            let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
            registry.get_implementations(D::NAME, args, self)?
        };
        let mut results = Vec::with_capacity(implementations.len());
        for implementation in implementations {
            results.push(implementation.call(self).await?);
        }
        Ok(results)
    }

    /// Validates `args` against `name`'s declared schema, then
    /// dispatches.
    pub async fn call_by_name(&self, name: &str, args: &Value) -> WorkspaceResult<Value> {
        let implementation = {
            let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
            registry.validate_arguments(name, args)?;
            registry.get_implementation(name, args, self)?
        };
        Ok(implementation.call(self).await?)
    }

    /// Validates `args` against the declared schema registered under
    /// `name`.
    pub fn validate_function_arguments(&self, name: &str, args: &Value) -> WorkspaceResult<FunctionDefinitionMeta> {
        let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
        Ok(registry.validate_arguments(name, args)?)
    }

    /// A snapshot of every registered function definition.
    pub fn get_function_definitions(&self) -> Vec<FunctionDefinitionMeta> {
        let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
        registry.get_definitions()
    }

    /// The single implementation of `name` supporting this context.
    pub fn get_function_implementation(
        &self,
        name: &str,
        args: &Value,
    ) -> WorkspaceResult<Box<dyn FunctionImplementation<Context>>> {
        let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
        Ok(registry.get_implementation(name, args, self)?)
    }

    /// Every implementation of `name` supporting this context, in
    /// registration order.
    pub fn get_function_implementations(
        &self,
        name: &str,
        args: &Value,
    ) -> WorkspaceResult<Vec<Box<dyn FunctionImplementation<Context>>>> {
        let registry = self.inner.registry.lock().expect("function registry mutex poisoned");
        Ok(registry.get_implementations(name, args, self)?)
    }

    /// Registers function implementations directly, bypassing the
    /// module loader. Used by embedders that compile implementations in
    /// rather than installing them as modules, and by tests.
    pub fn register_function_implementations(
        &self,
        f: impl FnOnce(&mut FunctionRegistry<Context>),
    ) -> WorkspaceResult<()> {
        let mut registry = self.inner.registry.lock().expect("function registry mutex poisoned");
        f(&mut registry);
        Ok(())
    }

    /// Resolves `secrets.<id>` through the registered `SecretFetch`
    /// backend implementation.
    pub async fn secret(&self, id: &str) -> WorkspaceResult<String> {
        secrets::resolve(self, id).await
    }

    /// Returns the per-context cached `T`, constructing it with `build`
    /// on first access.
    pub fn service<T, F>(&self, build: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.inner.service_cache.get_or_init(build)
    }

    /// Every directory under the workspace root whose configuration file
    /// declares `project.name`.
    pub fn list_project_paths(&self) -> WorkspaceResult<Vec<PathBuf>> {
        Ok(causa_config::list_project_paths(&self.inner.root_path)?)
    }

    /// Globs `project.externalFiles` relative to the workspace root.
    pub fn get_project_external_paths(
        &self,
        config: &causa_common::glob_utils::GlobExpansionConfig,
    ) -> WorkspaceResult<Vec<PathBuf>> {
        let patterns = self
            .get(Some("project.externalFiles"), GetOptions::default())?
            .and_then(|v| v.as_list().map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>()))
            .unwrap_or_default();
        Ok(causa_common::glob_utils::expand_glob_patterns(&self.inner.root_path, &patterns, config)?)
    }

    /// Where `causa.modules` entries are resolved from.
    pub fn modules_root(&self) -> &Path {
        &self.inner.modules_root
    }
}

/// The `secret(id)` fetcher injected by `get_and_render`.
struct SecretFetcher {
    context: Context,
}

#[async_trait]
impl Fetcher for SecretFetcher {
    async fn fetch(&self, args: &[String]) -> anyhow::Result<Value> {
        let id = args
            .first()
            .ok_or_else(|| anyhow::anyhow!("secret() requires an id argument"))?;
        let value = self.context.secret(id).await?;
        Ok(Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("causa.yaml"), body).unwrap();
        dir
    }

    #[tokio::test]
    async fn render_secrets_false_returns_empty_string_without_resolving() {
        let dir = workspace(
            "workspace:\n  name: w\nsecrets:\n  s1:\n    backend: unknown\nout:\n  $format: \"${ secret('s1') }\"\n",
        );
        let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
        let rendered = context
            .get_and_render(Some("out"), RenderOptions { render_secrets: false, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rendered, Value::from(""));
    }

    #[tokio::test]
    async fn cancelled_token_fails_get_and_render_before_rendering() {
        let dir = workspace("workspace:\n  name: w\nout:\n  $format: \"${ configuration('workspace.name') }\"\n");
        let context = Context::init(InitOptions::new(dir.path())).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = context
            .get_and_render(Some("out"), RenderOptions::with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_token_fails_init_before_processors_run() {
        let dir = workspace("workspace:\n  name: w\n");
        let token = CancellationToken::new();
        token.cancel();

        let err = Context::init(InitOptions::new(dir.path()).with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Cancelled));
    }

    #[tokio::test]
    async fn service_is_a_per_context_singleton() {
        let dir = workspace("workspace:\n  name: w\n");
        let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            let value: usize = context.service(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                42
            });
            assert_eq!(value, 42);
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_project_external_paths_globs_relative_to_root() {
        let dir = workspace("workspace:\n  name: w\nproject:\n  externalFiles:\n    - \"docs/*.md\"\n");
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/readme.md"), "x").unwrap();
        fs::write(dir.path().join("docs/notes.txt"), "x").unwrap();

        let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
        let found = context
            .get_project_external_paths(&causa_common::glob_utils::GlobExpansionConfig::default())
            .unwrap();
        assert_eq!(found, vec![dir.path().join("docs/readme.md")]);
    }

    #[tokio::test]
    async fn require_environment_fails_when_unset() {
        let dir = workspace("workspace:\n  name: w\n");
        let context = Context::init(InitOptions::new(dir.path())).await.unwrap();
        let err = context.require_environment().unwrap_err();
        assert!(matches!(err, WorkspaceError::EnvironmentNotSet));
    }
}
