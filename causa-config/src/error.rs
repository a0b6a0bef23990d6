use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `get_or_throw` (or `get_and_render_or_throw`) found nothing at the
    /// requested path.
    #[error("no configuration value found at path '{path}'")]
    ValueNotFound {
        /// The dotted path that was requested.
        path: String,
    },

    /// `get`/`get_or_throw` refused to return a subtree containing a
    /// template object without `{unsafe: true}`.
    #[error("value at path '{path}' contains an unformatted template; pass unsafe_access to read it raw")]
    UnformattedTemplateValue {
        /// The dotted path whose subtree contains a template object.
        path: String,
    },

    /// A template, directly or transitively, referenced a path that is a
    /// prefix of a path already being rendered.
    #[error("circular template reference detected while rendering '{path}'")]
    CircularTemplateReference {
        /// The path whose render chain closed a cycle.
        path: String,
    },

    /// Workspace/project configuration file discovery failed (zero files
    /// found, or more than one file declaring the same root).
    #[error("invalid workspace configuration files: {message}")]
    InvalidWorkspaceConfigurationFiles {
        /// A human-readable description of what went wrong.
        message: String,
    },

    /// An environment id was requested that has no `environments.<id>`
    /// entry.
    #[error("environment '{0}' is not set")]
    EnvironmentNotSet(String),

    /// A configuration source file could not be read or parsed.
    #[error("failed to read configuration file {path}: {source}")]
    FileRead {
        /// The file that failed to load.
        path: std::path::PathBuf,
        /// The underlying I/O or parse error.
        #[source]
        source: anyhow::Error,
    },

    /// The template renderer failed while resolving `get_and_render`.
    #[error(transparent)]
    Template(#[from] causa_template::TemplateError),
}

/// Result type alias used throughout this crate.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
