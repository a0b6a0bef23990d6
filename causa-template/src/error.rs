use thiserror::Error;

/// Errors surfaced by [`crate::TemplateRenderer::render`].
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template's `${ ... }` syntax could not be parsed. Only
    /// discovery-pass parse failures are wrapped this way.
    #[error("failed to render template '{template}': {cause}")]
    Rendering {
        /// The raw format string that failed to parse.
        template: String,
        /// The underlying parse failure.
        cause: String,
    },

    /// A call referenced a fetcher name with no entry in the fetcher
    /// table supplied to `render`.
    #[error("no fetcher registered for '{0}'")]
    UnknownFetcher(String),

    /// A `(fetcher, args)` pair was required during substitution but was
    /// absent from the barrier's result cache: a programming error, never
    /// a user-facing condition.
    #[error("referenced fetcher result for {fetcher}({args:?}) was not in the barrier cache")]
    ReferencedData {
        /// The fetcher name that was looked up.
        fetcher: String,
        /// The arguments the lookup used.
        args: Vec<String>,
    },

    /// A fetcher invocation failed. Propagated unchanged: this variant is
    /// `#[error(transparent)]` so callers can still `downcast_ref` the
    /// original error type out of the `anyhow::Error`.
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
}
