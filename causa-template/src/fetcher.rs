use async_trait::async_trait;
use causa_value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A (possibly async) callable exposed to templates. At minimum
/// `configuration` and `secret` are provided by the configuration reader
/// and the workspace context respectively.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolves a call's string-literal arguments to a value.
    ///
    /// Errors propagate unchanged to the renderer's caller (the barrier
    /// step): fetchers should return the most specific error they have,
    /// wrapped in `anyhow::Error` only for transport.
    async fn fetch(&self, args: &[String]) -> anyhow::Result<Value>;
}

/// A named table of fetchers available to a single `render` call.
pub type FetcherTable = HashMap<String, Arc<dyn Fetcher>>;

/// A fetcher backed by a plain closure, for tests and simple cases.
pub struct FnFetcher<F>(pub F)
where
    F: Fn(&[String]) -> anyhow::Result<Value> + Send + Sync;

#[async_trait]
impl<F> Fetcher for FnFetcher<F>
where
    F: Fn(&[String]) -> anyhow::Result<Value> + Send + Sync,
{
    async fn fetch(&self, args: &[String]) -> anyhow::Result<Value> {
        (self.0)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_fetcher_forwards_args_to_the_closure() {
        let fetcher = FnFetcher(|args: &[String]| Ok(Value::from(args.join(","))));
        let result = fetcher.fetch(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(result, Value::from("a,b"));
    }

    #[tokio::test]
    async fn fn_fetcher_propagates_errors() {
        let fetcher = FnFetcher(|_args: &[String]| Err(anyhow::anyhow!("boom")));
        assert!(fetcher.fetch(&[]).await.is_err());
    }
}
