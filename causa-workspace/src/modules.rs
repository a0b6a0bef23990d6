//! Module loading. A module is a unit of pre-installed code (elsewhere,
//! a package under `.causa/node_modules` loaded by dynamic `import()`)
//! that registers function implementations into the registry. This
//! engine has no dynamic-loading equivalent to `import()`, so "installed
//! modules" are instead supplied to [`InitOptions`] as a table of
//! [`Module`] trait objects the embedding binary compiled in — the
//! Rust-idiomatic read of "already installed in the engine's location"
//! (see DESIGN.md).

use crate::context::Context;
use crate::error::{WorkspaceError, WorkspaceResult};
use async_trait::async_trait;
use causa_registry::FunctionRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A unit of function-implementation registrations, standing in for one
/// entry under `.causa/node_modules`.
#[async_trait]
pub trait Module: Send + Sync {
    /// The module's own declared version (the `package.json` analogue).
    fn declared_version(&self) -> &str;

    /// Registers this module's function implementations.
    async fn register(&self, capabilities: &ModuleCapabilities) -> WorkspaceResult<()>;
}

/// The narrow capability object passed to a loading module. The only
/// capability is registering function implementations.
pub struct ModuleCapabilities {
    registry: Arc<Mutex<FunctionRegistry<Context>>>,
}

impl ModuleCapabilities {
    /// Runs `f` with exclusive access to the function registry.
    pub fn register_function_implementations(&self, f: impl FnOnce(&mut FunctionRegistry<Context>)) {
        let mut registry = self.registry.lock().expect("function registry mutex poisoned");
        f(&mut registry);
    }
}

/// The table of modules the engine considers installed, keyed by the
/// module identifier used in `causa.modules`.
pub type InstalledModules = HashMap<String, Arc<dyn Module>>;

fn is_semver_range(spec: &str) -> bool {
    semver::VersionReq::parse(spec).is_ok()
}

/// Loads every entry of `causa.modules` concurrently, aborting on the
/// first failure.
pub async fn load_modules(
    declared: &causa_value::Map,
    installed: &InstalledModules,
    registry: Arc<Mutex<FunctionRegistry<Context>>>,
    cancellation: Option<&CancellationToken>,
) -> WorkspaceResult<()> {
    if cancellation.is_some_and(|token| token.is_cancelled()) {
        return Err(WorkspaceError::Cancelled);
    }
    let capabilities = ModuleCapabilities { registry };
    let loads = declared.iter().map(|(name, version_spec)| {
        let name = name.clone();
        let version_spec = version_spec.as_str().unwrap_or_default().to_string();
        let installed = installed.clone();
        let capabilities = &capabilities;
        async move { load_one_module(&name, &version_spec, &installed, capabilities).await }
    });
    futures::future::try_join_all(loads).await?;
    Ok(())
}

async fn load_one_module(
    name: &str,
    version_spec: &str,
    installed: &InstalledModules,
    capabilities: &ModuleCapabilities,
) -> WorkspaceResult<()> {
    let module = installed.get(name).cloned();

    if is_semver_range(version_spec) {
        let module = module.ok_or_else(|| WorkspaceError::ModuleNotFound {
            name: name.to_string(),
            requires_module_install: true,
        })?;
        let range = semver::VersionReq::parse(version_spec).expect("validated by is_semver_range");
        let actual = semver::Version::parse(module.declared_version()).map_err(|e| WorkspaceError::ModuleVersion {
            name: name.to_string(),
            message: e.to_string(),
            requires_module_install: true,
        })?;
        if !range.matches(&actual) {
            return Err(WorkspaceError::IncompatibleModuleVersion {
                name: name.to_string(),
                actual: actual.to_string(),
                required: version_spec.to_string(),
                requires_module_install: true,
            });
        }
        debug!(module = name, version = %actual, "module version satisfies declared range");
        module.register(capabilities).await
    } else {
        debug!(module = name, spec = version_spec, "module uses a local-path spec, skipping version check");
        let Some(module) = module else {
            warn!(module = name, "local-path module is not present in the installed table");
            return Err(WorkspaceError::ModuleNotFound {
                name: name.to_string(),
                requires_module_install: true,
            });
        };
        module.register(capabilities).await
    }
}
