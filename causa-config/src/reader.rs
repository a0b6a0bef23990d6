use crate::error::{ConfigError, ConfigResult};
use crate::raw::RawConfiguration;
use causa_template::{Fetcher, FetcherTable, TemplateRenderer};
use causa_value::{get_path, path_segments, template, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Options controlling [`ConfigurationReader::get`] and `get_or_throw`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// When `true`, bypasses the template safety guard and returns raw
    /// template objects instead of failing with
    /// [`ConfigError::UnformattedTemplateValue`].
    pub unsafe_access: bool,
}

/// A layered configuration: an ordered list of [`RawConfiguration`]
/// layers plus the precomputed merge of all of them.
///
/// Cheap to clone: the layers and merged tree are held behind an `Arc` so
/// `merged_with` can hand back a new, independent reader without copying
/// the whole tree on every clone, matching the "immutable, fresh value
/// per merge" contract.
#[derive(Clone)]
pub struct ConfigurationReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    layers: Vec<RawConfiguration>,
    merged: Value,
    marker: String,
    renderer: TemplateRenderer,
}

impl ConfigurationReader {
    /// Builds a reader from an initial set of layers, folding them under
    /// the merge rule.
    pub fn new(layers: Vec<RawConfiguration>) -> Self {
        Self::with_marker(layers, causa_value::DEFAULT_TEMPLATE_MARKER)
    }

    /// Like [`Self::new`] but with a non-default template marker key.
    pub fn with_marker(layers: Vec<RawConfiguration>, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        let merged = fold_layers(&layers);
        Self {
            inner: Arc::new(ReaderInner {
                layers,
                merged,
                marker: marker.clone(),
                renderer: TemplateRenderer::new(marker),
            }),
        }
    }

    /// Appends `layers`, deep-cloning the reader's existing layers so the
    /// original reader (and any layer passed in) is left untouched.
    pub fn merged_with(&self, layers: impl IntoIterator<Item = RawConfiguration>) -> Self {
        let mut all = self.inner.layers.clone();
        all.extend(layers);
        Self::with_marker(all, self.inner.marker.clone())
    }

    /// The layers that make up this reader, in merge order.
    pub fn layers(&self) -> &[RawConfiguration] {
        &self.inner.layers
    }

    /// The template marker key this reader was built with.
    pub fn marker(&self) -> &str {
        &self.inner.marker
    }

    /// Returns the whole merged tree, or the value at `path`.
    ///
    /// Fails with [`ConfigError::UnformattedTemplateValue`] if the
    /// returned subtree contains a template object, unless
    /// `options.unsafe_access` is set.
    pub fn get(&self, path: Option<&str>, options: GetOptions) -> ConfigResult<Option<Value>> {
        let segments = path_segments(path.unwrap_or(""));
        let value = match get_path(&self.inner.merged, &segments) {
            Some(v) => v,
            None => return Ok(None),
        };
        if !options.unsafe_access && template::contains_rendering_object(value, &self.inner.marker) {
            return Err(ConfigError::UnformattedTemplateValue {
                path: path.unwrap_or("").to_string(),
            });
        }
        Ok(Some(value.clone()))
    }

    /// Like [`Self::get`] but fails with [`ConfigError::ValueNotFound`]
    /// when the path does not exist.
    pub fn get_or_throw(&self, path: &str, options: GetOptions) -> ConfigResult<Value> {
        self.get(Some(path), options)?.ok_or_else(|| ConfigError::ValueNotFound {
            path: path.to_string(),
        })
    }

    /// Returns the value at `path` (or the whole tree), recursively
    /// rendering all template objects under it. Injects a `configuration`
    /// fetcher bound to this reader for nested path lookups and cycle
    /// detection.
    pub async fn get_and_render(&self, fetchers: FetcherTable, path: Option<&str>) -> ConfigResult<Value> {
        let chain = Arc::new(Mutex::new(Vec::new()));
        self.render_with_chain(fetchers, path, chain).await
    }

    /// Like [`Self::get_and_render`] but fails with
    /// [`ConfigError::ValueNotFound`] if `path` does not exist.
    pub async fn get_and_render_or_throw(&self, fetchers: FetcherTable, path: &str) -> ConfigResult<Value> {
        // An absent path renders to nothing: detect that up front via a
        // plain (unsafe) get before paying for a render pass.
        self.get(Some(path), GetOptions { unsafe_access: true })?
            .ok_or_else(|| ConfigError::ValueNotFound { path: path.to_string() })?;
        self.get_and_render(fetchers, Some(path)).await
    }

    fn render_with_chain(
        &self,
        fetchers: FetcherTable,
        path: Option<&str>,
        chain: Arc<Mutex<Vec<String>>>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ConfigResult<Value>> + Send + '_>> {
        let path_key = path.unwrap_or("").to_string();
        Box::pin(async move {
            {
                let mut guard = chain.lock().expect("render chain mutex poisoned");
                if guard.iter().any(|seen| is_prefix(seen, &path_key) || is_prefix(&path_key, seen)) {
                    return Err(ConfigError::CircularTemplateReference { path: path_key });
                }
                guard.push(path_key.clone());
                trace!(chain = ?*guard, "entering render");
            }

            let subtree = self
                .get(path, GetOptions { unsafe_access: true })?
                .unwrap_or(Value::Null);

            let mut table = fetchers;
            table.insert(
                "configuration".to_string(),
                Arc::new(ConfigurationFetcher {
                    reader: self.clone(),
                    base_fetchers: table.clone(),
                    chain: chain.clone(),
                }),
            );

            let result = self.inner.renderer.render(&subtree, &table).await.map_err(unwrap_nested_config_error);

            chain.lock().expect("render chain mutex poisoned").pop();
            result
        })
    }
}

/// Un-does the wrapping a nested `configuration()` fetcher call imposes
/// on its own [`ConfigError`]: `ConfigurationFetcher::fetch` returns
/// `anyhow::Result`, so a `ConfigError` raised deep in a nested render
/// (e.g. [`ConfigError::CircularTemplateReference`]) travels back up as
/// `TemplateError::Fetch(anyhow::Error)` and would otherwise be
/// re-wrapped here as a generic `ConfigError::Template`. Downcasting
/// recovers the original `ConfigError` so it surfaces to callers
/// unchanged, as spec.md §7's propagation policy requires.
fn unwrap_nested_config_error(err: causa_template::TemplateError) -> ConfigError {
    match err {
        causa_template::TemplateError::Fetch(source) => match source.downcast::<ConfigError>() {
            Ok(config_err) => config_err,
            Err(source) => ConfigError::Template(causa_template::TemplateError::Fetch(source)),
        },
        other => ConfigError::Template(other),
    }
}

fn is_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || path.is_empty() {
        return prefix == path;
    }
    path == prefix || path.starts_with(&format!("{prefix}."))
}

/// The implicitly-injected `configuration(path)` fetcher: resolves nested
/// path references by recursively rendering the target subtree, sharing
/// the same chain of in-flight paths so cycles are caught regardless of
/// depth.
struct ConfigurationFetcher {
    reader: ConfigurationReader,
    base_fetchers: FetcherTable,
    chain: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Fetcher for ConfigurationFetcher {
    async fn fetch(&self, args: &[String]) -> anyhow::Result<Value> {
        let path = args
            .first()
            .ok_or_else(|| anyhow::anyhow!("configuration() requires a path argument"))?;
        debug!(path = %path, "configuration() fetcher resolving nested path");
        let mut fetchers = self.base_fetchers.clone();
        fetchers.remove("configuration");
        let result = self
            .reader
            .render_with_chain(fetchers, Some(path), self.chain.clone())
            .await?;
        Ok(result)
    }
}

fn fold_layers(layers: &[RawConfiguration]) -> Value {
    layers
        .iter()
        .fold(Value::empty_map(), |acc, layer| causa_value::merge(acc, layer.configuration.clone()))
}
