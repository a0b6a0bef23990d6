//! Layered configuration: merging on-disk layers plus runtime overlays,
//! exposing safe path-based getters, and discovering the workspace and
//! project roots by walking the filesystem.

mod discovery;
mod error;
mod raw;
mod reader;

pub use causa_value::{Map, Value};
pub use discovery::{list_project_paths, load_workspace_configuration, DiscoveredWorkspace};
pub use error::{ConfigError, ConfigResult};
pub use raw::{RawConfiguration, SourceType};
pub use reader::{ConfigurationReader, GetOptions};
