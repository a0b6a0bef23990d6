use std::path::PathBuf;
use thiserror::Error;

/// The workspace context's top-level error, nesting every lower crate's
/// error type the way a facade crate wraps its components.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A configuration-layer operation failed.
    #[error(transparent)]
    Config(#[from] causa_config::ConfigError),

    /// The template renderer failed outside of a configuration read
    /// (e.g. rendering a processor's own arguments).
    #[error(transparent)]
    Template(#[from] causa_template::TemplateError),

    /// The function registry rejected a registration or a dispatch.
    #[error(transparent)]
    Registry(#[from] causa_registry::RegistryError),

    /// `causa.modules` named a module with no matching entry in the
    /// engine's install location.
    #[error("module '{name}' is not installed")]
    ModuleNotFound {
        /// The module identifier from `causa.modules`.
        name: String,
        /// Always `true` for this variant.
        requires_module_install: bool,
    },

    /// The installed module's declared version could not be parsed.
    #[error("could not determine the installed version of module '{name}': {message}")]
    ModuleVersion {
        /// The module identifier.
        name: String,
        /// A human-readable description of the parse failure.
        message: String,
        /// Always `true` for this variant.
        requires_module_install: bool,
    },

    /// The installed module's version does not satisfy the declared
    /// range.
    #[error("module '{name}' version '{actual}' does not satisfy required range '{required}'")]
    IncompatibleModuleVersion {
        /// The module identifier.
        name: String,
        /// The installed module's declared version.
        actual: String,
        /// The semver range from `causa.modules`.
        required: String,
        /// Always `true` for this variant.
        requires_module_install: bool,
    },

    /// A context operation that requires a project root was invoked
    /// outside of one.
    #[error("'{working_directory}' is not inside a project")]
    ContextNotAProject {
        /// The working directory the context was initialized from.
        working_directory: PathBuf,
    },

    /// An operation that requires an active environment was invoked on
    /// a context with none set.
    #[error("no environment has been set for this context")]
    EnvironmentNotSet,

    /// A processor's output did not have the required shape (a map with
    /// a map-valued `configuration` field).
    #[error("processor '{0}' returned an invalid output: expected a map with a map-valued 'configuration' field")]
    InvalidProcessorOutput(String),

    /// A secret record was malformed.
    #[error("invalid secret definition{}: {message}", secret_id.as_ref().map(|id| format!(" for '{id}'")).unwrap_or_default())]
    InvalidSecretDefinition {
        /// A human-readable description of the problem.
        message: String,
        /// The secret id, filled in once known.
        secret_id: Option<String>,
    },

    /// No registered backend implementation supports the requested
    /// backend id.
    #[error("no secret backend implementation found for '{0}'")]
    SecretBackendNotFound(String),

    /// Neither `record.backend` nor `causa.secrets.defaultBackend` was
    /// set.
    #[error("secret '{0}' does not specify a backend and causa.secrets.defaultBackend is not set")]
    SecretBackendNotSpecified(String),

    /// A secret backend resolved to no value.
    #[error("secret value not found")]
    SecretValueNotFound,

    /// `as_configuration` failed to convert the rendered tree into the
    /// caller's type via `serde_json`.
    #[error("failed to deserialize the rendered configuration: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A caller-supplied cancellation token was already cancelled at a
    /// suspension point (module loading, rendering, or dispatch).
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias used throughout this crate.
pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;
