use crate::error::TemplateError;
use crate::expr::{self, Segment};
use crate::fetcher::FetcherTable;
use causa_value::{template, Value};
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Key a single fetcher invocation is deduplicated by: the fetcher name
/// plus its (already-parsed) string-literal arguments.
type CallKey = (String, Vec<String>);

/// The two-pass async template renderer.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    marker: String,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(causa_value::DEFAULT_TEMPLATE_MARKER)
    }
}

impl TemplateRenderer {
    /// Builds a renderer that recognizes `marker` as the template-object
    /// key (the default is `$format`).
    pub fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into() }
    }

    /// Renders `value`, invoking fetchers from `fetchers` for every
    /// template object found anywhere in the tree.
    ///
    /// For every value containing no template objects, `render(v) ==
    /// deep_clone(v)`: leaves are returned unchanged, and maps/lists are
    /// rebuilt structurally rather than mutated in place.
    pub async fn render(&self, value: &Value, fetchers: &FetcherTable) -> Result<Value, TemplateError> {
        let mut calls: IndexSet<CallKey> = IndexSet::new();
        self.discover(value, &mut calls)?;
        debug!(unique_calls = calls.len(), "template render: discovery complete");

        let cache = self.resolve_barrier(&calls, fetchers).await?;
        self.substitute(value, &cache)
    }

    /// Pass 1: walk `value`, recording every unique `(fetcher, args)`
    /// pair referenced by a template object. Does not invoke fetchers.
    fn discover(&self, value: &Value, calls: &mut IndexSet<CallKey>) -> Result<(), TemplateError> {
        if let Some(format) = template::template_format_string(value, &self.marker) {
            let segments = expr::parse(format).map_err(|cause| TemplateError::Rendering {
                template: format.to_string(),
                cause,
            })?;
            for segment in segments {
                if let Segment::Call { name, args } = segment {
                    calls.insert((name, args));
                }
            }
            return Ok(());
        }
        match value {
            Value::Map(map) => {
                for v in map.values() {
                    self.discover(v, calls)?;
                }
            }
            Value::List(list) => {
                for v in list {
                    self.discover(v, calls)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The barrier: invokes every unique call concurrently.
    async fn resolve_barrier(
        &self,
        calls: &IndexSet<CallKey>,
        fetchers: &FetcherTable,
    ) -> Result<HashMap<CallKey, Value>, TemplateError> {
        let futures = calls.iter().map(|(name, args)| {
            let fetchers = fetchers.clone();
            let name = name.clone();
            let args = args.clone();
            async move {
                let fetcher = fetchers
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| TemplateError::UnknownFetcher(name.clone()))?;
                trace!(fetcher = %name, ?args, "invoking fetcher");
                let result = fetcher.fetch(&args).await?;
                Ok::<_, TemplateError>(((name, args), result))
            }
        });
        let results = futures::future::try_join_all(futures).await?;
        Ok(results.into_iter().collect())
    }

    /// Pass 2: walk `value` again, substituting each template object with
    /// its rendered scalar. A template object inside a fetcher's returned
    /// value is left as-is (single-level substitution).
    fn substitute(&self, value: &Value, cache: &HashMap<CallKey, Value>) -> Result<Value, TemplateError> {
        if let Some(format) = template::template_format_string(value, &self.marker) {
            let segments = expr::parse(format).map_err(|cause| TemplateError::Rendering {
                template: format.to_string(),
                cause,
            })?;
            let mut rendered = String::new();
            for segment in &segments {
                match segment {
                    Segment::Literal(text) => rendered.push_str(text),
                    Segment::Call { name, args } => {
                        let key = (name.clone(), args.clone());
                        let result = cache.get(&key).ok_or_else(|| TemplateError::ReferencedData {
                            fetcher: name.clone(),
                            args: args.clone(),
                        })?;
                        if result.is_null() {
                            // Idempotence boundary: an unresolved
                            // reference leaves the template object
                            // intact rather than emitting "null".
                            return Ok(value.clone());
                        }
                        rendered.push_str(&result.to_string());
                    }
                }
            }
            return Ok(Value::String(rendered));
        }
        match value {
            Value::Map(map) => {
                let mut out = causa_value::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.substitute(v, cache)?);
                }
                Ok(Value::Map(out))
            }
            Value::List(list) => {
                let mut out = Vec::with_capacity(list.len());
                for v in list {
                    out.push(self.substitute(v, cache)?);
                }
                Ok(Value::List(out))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FnFetcher;
    use causa_value::Map;
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

    fn template(format: &str) -> Value {
        let mut m = Map::new();
        m.insert("$format".to_string(), Value::from(format));
        Value::Map(m)
    }

    #[tokio::test]
    async fn renders_a_deterministic_fetcher() {
        let renderer = TemplateRenderer::default();
        let mut fetchers: FetcherTable = HashMap::new();
        fetchers.insert(
            "configuration".to_string(),
            Arc::new(FnFetcher(|args: &[String]| {
                Ok(Value::from(format!("X:{}", args[0])))
            })),
        );
        let rendered = renderer
            .render(&template("${ configuration('x') }"), &fetchers)
            .await
            .unwrap();
        assert_eq!(rendered, Value::from("X:x"));
    }

    #[tokio::test]
    async fn values_without_templates_are_unchanged() {
        let renderer = TemplateRenderer::default();
        let fetchers: FetcherTable = HashMap::new();
        let mut m = Map::new();
        m.insert("a".to_string(), Value::from(1_i64));
        m.insert("b".to_string(), Value::List(vec![Value::from("x")]));
        let value = Value::Map(m.clone());
        let rendered = renderer.render(&value, &fetchers).await.unwrap();
        assert_eq!(rendered, Value::Map(m));
    }

    #[tokio::test]
    async fn duplicate_calls_invoke_the_fetcher_once() {
        let renderer = TemplateRenderer::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut fetchers: FetcherTable = HashMap::new();
        fetchers.insert(
            "configuration".to_string(),
            Arc::new(FnFetcher(move |args: &[String]| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(args[0].clone()))
            })),
        );
        let tree = Value::List(vec![
            template("${ configuration('x') }"),
            template("${ configuration('x') }"),
        ]);
        renderer.render(&tree, &fetchers).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolved_reference_leaves_template_intact() {
        let renderer = TemplateRenderer::default();
        let mut fetchers: FetcherTable = HashMap::new();
        fetchers.insert(
            "configuration".to_string(),
            Arc::new(FnFetcher(|_args: &[String]| Ok(Value::Null))),
        );
        let tpl = template("${ configuration('missing') }");
        let rendered = renderer.render(&tpl, &fetchers).await.unwrap();
        assert_eq!(rendered, tpl);
    }

    #[tokio::test]
    async fn unknown_fetcher_is_an_error() {
        let renderer = TemplateRenderer::default();
        let fetchers: FetcherTable = HashMap::new();
        let err = renderer
            .render(&template("${ nope('x') }"), &fetchers)
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownFetcher(name) if name == "nope"));
    }
}
