//! Configuration file discovery: walks the filesystem for
//! `causa.yaml`/`causa.*.yaml` files and infers the workspace and project
//! roots.

use crate::error::{ConfigError, ConfigResult};
use crate::raw::RawConfiguration;
use crate::reader::{ConfigurationReader, GetOptions};
use causa_value::Value;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// The result of [`load_workspace_configuration`].
pub struct DiscoveredWorkspace {
    /// The reader built from every discovered layer (plus the
    /// environment overlay, if any).
    pub reader: ConfigurationReader,
    /// The directory of the configuration file declaring `workspace.name`.
    pub root_path: PathBuf,
    /// The directory of the configuration file declaring `project.name`,
    /// if `working_directory` is inside a project.
    pub project_path: Option<PathBuf>,
}

/// A file matched by `causa.yaml` or `causa.*.yaml` under a single
/// directory.
fn file_name_matches(name: &str) -> bool {
    if name == "causa.yaml" {
        return true;
    }
    name.strip_prefix("causa.")
        .and_then(|rest| rest.strip_suffix(".yaml"))
        .map(|middle| !middle.is_empty() && !middle.contains(['/', '\\']))
        .unwrap_or(false)
}

/// Lists the `causa.yaml`/`causa.*.yaml` files directly inside `dir`,
/// honoring `.gitignore`, sorted descending lexicographically.
fn files_in_dir(dir: &Path) -> Vec<PathBuf> {
    let mut names = Vec::new();
    let walker = WalkBuilder::new(dir).max_depth(Some(1)).build();
    for entry in walker.flatten() {
        if entry.path() == dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if file_name_matches(name) {
                names.push(entry.path().to_path_buf());
            }
        }
    }
    names.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    names
}

/// Parses a single configuration file into a [`Value`], dispatching on
/// extension. YAML decoding is the only file-I/O contract this crate
/// owns; everything above it works on the resulting tree of
/// scalars/maps/lists.
fn parse_file(path: &Path) -> ConfigResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    serde_yaml_ng::from_str(&text).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Walks from `working_directory` up to the filesystem root, collecting
/// every matching configuration file, root-ward first: directories
/// closer to the filesystem root are merged before directories closer
/// to `working_directory`.
fn discover_files(working_directory: &Path) -> ConfigResult<Vec<PathBuf>> {
    let mut ancestors: Vec<PathBuf> = working_directory
        .ancestors()
        .map(Path::to_path_buf)
        .collect();
    ancestors.reverse(); // root-most first

    let mut files = Vec::new();
    for dir in &ancestors {
        let found = files_in_dir(dir);
        if !found.is_empty() {
            debug!(dir = %dir.display(), count = found.len(), "discovered configuration files");
        } else {
            trace!(dir = %dir.display(), "no configuration files in directory");
        }
        files.extend(found);
    }
    Ok(files)
}

/// Loads every `causa.yaml`/`causa.*.yaml` file from `working_directory`
/// up to the filesystem root, applies the optional environment overlay,
/// and determines the workspace/project roots.
pub fn load_workspace_configuration(
    working_directory: &Path,
    environment: Option<&str>,
) -> ConfigResult<DiscoveredWorkspace> {
    let files = discover_files(working_directory)?;
    if files.is_empty() {
        return Err(ConfigError::InvalidWorkspaceConfigurationFiles {
            message: format!(
                "no causa.yaml or causa.*.yaml files found from '{}' to the filesystem root",
                working_directory.display()
            ),
        });
    }

    let mut layers = Vec::with_capacity(files.len());
    let mut workspace_candidates = Vec::new();
    let mut project_candidates = Vec::new();
    for path in &files {
        let value = parse_file(path)?;
        if has_non_null_path(&value, &["workspace", "name"]) {
            workspace_candidates.push(path.clone());
        }
        if has_non_null_path(&value, &["project", "name"]) {
            project_candidates.push(path.clone());
        }
        layers.push(RawConfiguration::from_file(path.display().to_string(), value));
    }

    let mut reader = ConfigurationReader::new(layers);

    if let Some(env_id) = environment {
        let env_path = format!("environments.{env_id}");
        let env_value = reader.get_or_throw(&env_path, GetOptions { unsafe_access: true })?;
        if let Some(nested) = env_value
            .as_map()
            .and_then(|m| m.get("configuration"))
        {
            reader = reader.merged_with([RawConfiguration::from_environment(env_id, nested.clone())]);
        }
    }

    let root_path = unique_directory(&workspace_candidates, "workspace.name")?;
    let project_path = match project_candidates.len() {
        0 => None,
        1 => Some(
            project_candidates[0]
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        ),
        _ => {
            return Err(ConfigError::InvalidWorkspaceConfigurationFiles {
                message: format!(
                    "multiple configuration files declare project.name: {}",
                    display_paths(&project_candidates)
                ),
            })
        }
    };

    Ok(DiscoveredWorkspace {
        reader,
        root_path,
        project_path,
    })
}

fn unique_directory(candidates: &[PathBuf], field: &str) -> ConfigResult<PathBuf> {
    match candidates.len() {
        1 => Ok(candidates[0].parent().map(Path::to_path_buf).unwrap_or_default()),
        0 => Err(ConfigError::InvalidWorkspaceConfigurationFiles {
            message: format!("no configuration file declares {field}"),
        }),
        _ => Err(ConfigError::InvalidWorkspaceConfigurationFiles {
            message: format!("multiple configuration files declare {field}: {}", display_paths(candidates)),
        }),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn has_non_null_path(value: &Value, path: &[&str]) -> bool {
    let mut current = value;
    for key in path {
        match current.as_map().and_then(|m| m.get(*key)) {
            Some(v) => current = v,
            None => return false,
        }
    }
    !current.is_null()
}

/// Recursively globs `**/causa.yaml` and `**/causa.*.yaml` under `root`,
/// returning the unique set of directories whose file declares
/// `project.name`.
pub fn list_project_paths(root: &Path) -> ConfigResult<Vec<PathBuf>> {
    let mut projects = Vec::new();
    let walker = WalkBuilder::new(root).build();
    for entry in walker.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name_matches(name) {
            continue;
        }
        let value = parse_file(path)?;
        if has_non_null_path(&value, &["project", "name"]) {
            if let Some(dir) = path.parent() {
                if !projects.contains(&dir.to_path_buf()) {
                    projects.push(dir.to_path_buf());
                }
            }
        }
    }
    if projects.is_empty() {
        warn!(root = %root.display(), "list_project_paths found no project directories");
    }
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn file_name_matching() {
        assert!(file_name_matches("causa.yaml"));
        assert!(file_name_matches("causa.staging.yaml"));
        assert!(!file_name_matches("causa.yml"));
        assert!(!file_name_matches("other.yaml"));
    }

    #[test]
    fn discovers_workspace_and_project_roots() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("causa.yaml"), "workspace:\n  name: w\n").unwrap();
        let project_dir = root.join("project");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("causa.yaml"), "project:\n  name: p\n").unwrap();

        let discovered = load_workspace_configuration(&project_dir, None).unwrap();
        assert_eq!(discovered.root_path, root);
        assert_eq!(discovered.project_path, Some(project_dir));
    }

    #[test]
    fn missing_files_is_an_error() {
        let dir = tempdir().unwrap();
        // `/` itself is guaranteed to have no causa.yaml in the sandbox,
        // but nested unique temp dirs never collide with real configs.
        let err = load_workspace_configuration(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkspaceConfigurationFiles { .. }));
    }

    #[test]
    fn environment_overlay_is_appended() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("causa.yaml"),
            "workspace:\n  name: w\nenvironments:\n  staging:\n    configuration:\n      a: 1\n",
        )
        .unwrap();
        let discovered = load_workspace_configuration(root, Some("staging")).unwrap();
        let a = discovered
            .reader
            .get_or_throw("a", GetOptions::default())
            .unwrap();
        assert_eq!(a, Value::from(1_i64));
    }
}
