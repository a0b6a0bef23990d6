use thiserror::Error;

/// Errors surfaced by [`crate::FunctionRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A name was registered twice with two distinct definition types.
    #[error("function '{name}' is already registered with a different definition type")]
    FunctionDefinitionDoesNotMatch {
        /// The colliding function name.
        name: String,
    },

    /// An implementation could not be associated with a definition.
    #[error("invalid function implementation: {0}")]
    InvalidFunction(String),

    /// `get_implementation`/`call` found zero supporting implementations.
    #[error("no implementation of '{definition}' supports the current context")]
    NoImplementationFound {
        /// The function name that was dispatched.
        definition: String,
    },

    /// `get_implementation`/`call` found more than one supporting
    /// implementation.
    #[error("more than one implementation of '{definition}' supports the current context")]
    TooManyImplementations {
        /// The function name that was dispatched.
        definition: String,
    },

    /// `validate_arguments` rejected the supplied argument map.
    #[error("invalid arguments for '{definition}': {messages}")]
    InvalidFunctionArgument {
        /// The function name whose arguments failed validation.
        definition: String,
        /// The joined (`; `-separated) list of validation failures.
        messages: String,
    },

    /// Materializing an implementation instance from the argument map
    /// failed (a malformed argument shape, not a declared-constraint
    /// failure — those are reported via `InvalidFunctionArgument`).
    #[error("failed to construct implementation for '{definition}' from arguments: {source}")]
    Materialization {
        /// The function name whose implementation failed to materialize.
        definition: String,
        /// The underlying (de)serialization error.
        source: serde_json::Error,
    },
}

/// Result type alias used throughout this crate.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
