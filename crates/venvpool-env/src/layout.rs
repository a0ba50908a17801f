//! On-disk layout: `<base>/<runtime_version>/<environment>/`.

use std::path::{Path, PathBuf};

use venvpool_fs::list_or_empty;

use crate::environment::Environment;
use crate::error::PoolError;

/// A runtime version becomes a directory name, so keep it to a safe alphabet.
pub fn validate_runtime(runtime_version: &str) -> Result<(), PoolError> {
    let valid = !runtime_version.is_empty()
        && !runtime_version.starts_with('.')
        && runtime_version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(PoolError::InvalidRuntime(runtime_version.to_string()))
    }
}

fn visible_dirs(dir: &Path) -> Result<Vec<PathBuf>, PoolError> {
    let children = list_or_empty(dir)
        .map_err(|e| PoolError::io(format!("List {}", dir.display()), e))?;
    Ok(children
        .into_iter()
        .filter(|p| {
            let hidden = p
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            !hidden && p.is_dir()
        })
        .collect())
}

/// Runtime-version directories under `base`, sorted.
pub fn runtime_dirs(base: &Path) -> Result<Vec<PathBuf>, PoolError> {
    visible_dirs(base)
}

/// Environments of one runtime version, sorted by name.
pub fn environments_in(version_dir: &Path) -> Result<Vec<Environment>, PoolError> {
    Ok(visible_dirs(version_dir)?
        .into_iter()
        .map(Environment::open)
        .collect())
}

/// Every environment of every runtime version.
pub fn all_environments(base: &Path) -> Result<Vec<Environment>, PoolError> {
    let mut all = Vec::new();
    for version_dir in runtime_dirs(base)? {
        all.extend(environments_in(&version_dir)?);
    }
    Ok(all)
}
