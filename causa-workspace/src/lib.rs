//! The workspace context: the public facade tying configuration
//! discovery, the template renderer, the function registry, module
//! loading, the service cache and secret resolution together.
//!
//! `Context::init` is the entry point: it discovers configuration,
//! loads modules, runs the processor pipeline, and returns an immutable
//! context. Everything else is a view onto that context.

pub mod context;
mod error;
pub mod logging;
pub mod modules;
pub mod secrets;
mod service;

pub use context::{
    CloneOptions, Context, InitOptions, ProcessorInstruction, ProcessorOverride, RenderOptions,
};
pub use error::{WorkspaceError, WorkspaceResult};
pub use modules::{InstalledModules, Module, ModuleCapabilities};
pub use secrets::SecretFetch;
pub use service::ServiceCache;

pub use causa_config::{GetOptions, RawConfiguration, SourceType};
pub use causa_registry::{
    ArgumentSchema, ConstraintKind, FieldConstraint, FunctionDefinition, FunctionDefinitionMeta,
    FunctionImplementation,
};
pub use causa_value::Value;
