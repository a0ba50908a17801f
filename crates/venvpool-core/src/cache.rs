//! Process-scoped session cache.
//!
//! Constructed once by the caller and handed to collaborators explicitly; nothing
//! here is global. Manifests are memoized per environment path: an environment is
//! installed into exactly once, at creation, so a manifest read after that stays
//! valid until the environment is deleted (paths are never reused).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::installed::InstalledPackages;

#[derive(Debug, Default)]
pub struct SessionCache {
    manifests: Mutex<HashMap<PathBuf, Arc<InstalledPackages>>>,
    download_dir: Option<PathBuf>,
}

impl SessionCache {
    pub fn new(download_dir: Option<PathBuf>) -> Self {
        Self {
            manifests: Mutex::new(HashMap::new()),
            download_dir,
        }
    }

    /// Directory the installer may use for downloaded archives, if configured.
    pub fn download_dir(&self) -> Option<&Path> {
        self.download_dir.as_deref()
    }

    pub fn manifest(&self, env_path: &Path) -> Option<Arc<InstalledPackages>> {
        self.manifests.lock().ok()?.get(env_path).cloned()
    }

    /// Return the cached manifest for `env_path`, or load and remember it.
    pub fn manifest_or_load<E>(
        &self,
        env_path: &Path,
        load: impl FnOnce() -> Result<InstalledPackages, E>,
    ) -> Result<Arc<InstalledPackages>, E> {
        if let Some(hit) = self.manifest(env_path) {
            return Ok(hit);
        }
        let loaded = Arc::new(load()?);
        if let Ok(mut guard) = self.manifests.lock() {
            guard.insert(env_path.to_path_buf(), Arc::clone(&loaded));
        }
        Ok(loaded)
    }

    /// Forget the manifest of an environment that was installed into or deleted.
    pub fn invalidate(&self, env_path: &Path) {
        if let Ok(mut guard) = self.manifests.lock() {
            guard.remove(env_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_manifest_loaded_once_until_invalidated() {
        let cache = SessionCache::default();
        let loads = Cell::new(0);
        let load = || -> Result<InstalledPackages, ()> {
            loads.set(loads.get() + 1);
            let mut installed = InstalledPackages::new();
            installed.insert_version("woo", "1.0");
            Ok(installed)
        };
        let path = Path::new("/pool/3/env1");
        let first = cache.manifest_or_load(path, load).unwrap();
        let second = cache.manifest_or_load(path, load).unwrap();
        assert_eq!(first, second);
        assert_eq!(loads.get(), 1);

        cache.invalidate(path);
        cache.manifest_or_load(path, load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_load_error_not_cached() {
        let cache = SessionCache::new(Some(PathBuf::from("/tmp/dl")));
        let path = Path::new("/pool/3/env2");
        let err = cache.manifest_or_load(path, || Err::<InstalledPackages, _>("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.manifest(path).is_none());
        assert_eq!(cache.download_dir(), Some(Path::new("/tmp/dl")));
    }
}
