use thiserror::Error;
use std::path::PathBuf;

/// Errors shared by the small set of filesystem utilities in this crate.
#[derive(Debug, Error)]
pub enum CommonError {
    /// A glob pattern failed to compile.
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The underlying parser message.
        message: String,
    },

    /// Walking a directory failed (permissions, broken symlink, ...).
    #[error("failed to walk '{path}': {message}")]
    Walk {
        /// The directory being walked.
        path: PathBuf,
        /// The underlying walker message.
        message: String,
    },
}

/// Result type alias used throughout this crate.
pub type CommonResult<T> = std::result::Result<T, CommonError>;
