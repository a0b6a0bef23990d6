//! Gitignore-respecting glob expansion, trimmed to the one caller this
//! workspace has: resolving `project.externalFiles` patterns relative to
//! a workspace root.

use crate::error::{CommonError, CommonResult};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Configuration for a single [`expand_glob_patterns`] call.
#[derive(Debug, Clone)]
pub struct GlobExpansionConfig {
    /// Whether to respect `.gitignore`/`.git/info/exclude`.
    pub respect_gitignore: bool,
    /// Whether to follow symlinks while walking directories.
    pub follow_symlinks: bool,
    /// Whether hidden entries are candidates for matching.
    pub include_hidden: bool,
}

impl Default for GlobExpansionConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            follow_symlinks: false,
            include_hidden: false,
        }
    }
}

/// Expands `patterns` (glob syntax, matched relative to `root`) into the
/// set of files under `root` that match at least one pattern, honoring
/// gitignore and never following symlinks when `config.follow_symlinks`
/// is `false`.
pub fn expand_glob_patterns(
    root: &Path,
    patterns: &[String],
    config: &GlobExpansionConfig,
) -> CommonResult<Vec<PathBuf>> {
    let compiled: Vec<glob::Pattern> = patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| CommonError::InvalidPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect::<CommonResult<_>>()?;

    let mut match_options = glob::MatchOptions::new();
    match_options.require_literal_separator = true;
    match_options.require_literal_leading_dot = false;

    let mut matches = Vec::new();
    let walker = WalkBuilder::new(root)
        .git_ignore(config.respect_gitignore)
        .git_global(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .hidden(!config.include_hidden)
        .follow_links(config.follow_symlinks)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if compiled.iter().any(|p| p.matches_path_with(relative, match_options)) {
            trace!(path = %entry.path().display(), "external path matched");
            matches.push(entry.path().to_path_buf());
        }
    }
    Ok(matches)
}
