//! One virtual environment in a pool and the write-locked handle that owns it.
//!
//! An environment's identity is its path. Its runtime version is the name of
//! the directory it lives in. Everything that mutates or inspects contents
//! goes through [`LockedEnvironment`], which can only be obtained by winning
//! the write lock (or by creating the environment).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use venvpool_core::installed::InstalledPackages;
use venvpool_fs::{is_not_found, LockError, LockState, ReadLock, SharedDir};

use crate::collab::Toolchain;
use crate::error::{PoolError, Step};
use crate::requirements::RequirementSpec;

#[derive(Debug, Clone)]
pub struct Environment {
    path: PathBuf,
    lock: SharedDir,
}

impl Environment {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = SharedDir::new(&path);
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn runtime_version(&self) -> Option<&str> {
        self.path.parent()?.file_name()?.to_str()
    }

    /// Lock state right now, for display.
    pub fn state(&self) -> Result<LockState, LockError> {
        self.lock.state()
    }

    /// Try for exclusive ownership; `None` if anyone else holds any lock.
    pub fn try_write_lock(&self) -> Result<Option<LockedEnvironment>, LockError> {
        if self.lock.try_write_lock()? {
            Ok(Some(LockedEnvironment::held(self.clone())))
        } else {
            Ok(None)
        }
    }

    pub fn try_read_lock(&self) -> Result<Option<ReadLock>, LockError> {
        self.lock.try_read_lock()
    }

    /// Provision a new environment at `destination`, which must not exist yet.
    ///
    /// The environment comes back write-locked: no `readlocks/` exists until the
    /// returned handle releases it, so no other process can lock it meanwhile.
    /// On failure the directory is removed before returning.
    pub fn create(
        runtime_version: &str,
        destination: PathBuf,
        toolchain: &Toolchain,
    ) -> Result<LockedEnvironment, PoolError> {
        fs::create_dir(&destination)
            .map_err(|e| PoolError::io(format!("Create {}", destination.display()), e))?;
        let locked = LockedEnvironment::held(Environment::open(destination));
        if let Err(source) = toolchain.provisioner.create(runtime_version, locked.path()) {
            let path = locked.path().to_path_buf();
            discard(locked, toolchain);
            return Err(PoolError::collaborator(Step::Provision, path, source));
        }
        Ok(locked)
    }
}

/// Exclusive ownership of an environment.
///
/// Dropping the handle without [`unlock`](Self::unlock), [`delete`](Self::delete)
/// or [`downgrade`](Self::downgrade) releases the write lock best-effort.
#[derive(Debug)]
pub struct LockedEnvironment {
    env: Environment,
    held: bool,
}

impl LockedEnvironment {
    fn held(env: Environment) -> Self {
        Self { env, held: true }
    }

    pub fn path(&self) -> &Path {
        self.env.path()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Install `specs` with the toolchain's installer. No-op when empty.
    pub fn install(&self, specs: &[RequirementSpec], toolchain: &Toolchain) -> Result<(), PoolError> {
        if specs.is_empty() {
            return Ok(());
        }
        let args: Vec<String> = specs.iter().flat_map(RequirementSpec::install_args).collect();
        let result = toolchain.installer.install(self.path(), &args);
        toolchain.cache.invalidate(self.path());
        result.map_err(|source| PoolError::collaborator(Step::Install, self.path(), source))
    }

    /// Manifest of installed packages, memoized in the session cache.
    pub fn installed(&self, toolchain: &Toolchain) -> Result<Arc<InstalledPackages>, PoolError> {
        toolchain
            .cache
            .manifest_or_load(self.path(), || toolchain.manifest.installed(self.path()))
            .map_err(|source| PoolError::collaborator(Step::ReadManifest, self.path(), source))
    }

    /// True iff every requirement is already satisfied here. Reads only.
    pub fn compatible(&self, required: &[RequirementSpec], toolchain: &Toolchain) -> Result<bool, PoolError> {
        if required.iter().any(|spec| matches!(spec, RequirementSpec::Opaque(_))) {
            return Ok(false);
        }
        let installed = self.installed(toolchain)?;
        Ok(required.iter().all(|spec| spec.compatible(&installed)))
    }

    pub fn unlock(mut self) -> Result<(), LockError> {
        self.held = false;
        self.env.lock.write_unlock()
    }

    /// Turn the write lock into a read lock with no unlocked window.
    pub fn downgrade(mut self) -> Result<(Environment, ReadLock), LockError> {
        let read = self.env.lock.downgrade()?;
        self.held = false;
        Ok((self.env.clone(), read))
    }

    /// Remove the environment from disk. The lock token goes with it.
    pub fn delete(mut self, toolchain: &Toolchain) -> Result<(), PoolError> {
        self.held = false;
        toolchain.cache.invalidate(self.path());
        remove_tree(self.path())
    }
}

impl Drop for LockedEnvironment {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.env.lock.write_unlock() {
                tracing::warn!("Failed to release {}: {}", self.env.path.display(), e);
            }
        }
    }
}

pub(crate) fn remove_tree(path: &Path) -> Result<(), PoolError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(PoolError::io(format!("Remove {}", path.display()), e)),
    }
}

/// Delete a half-built environment, logging instead of failing.
pub(crate) fn discard(locked: LockedEnvironment, toolchain: &Toolchain) {
    let path = locked.path().to_path_buf();
    if let Err(e) = locked.delete(toolchain) {
        tracing::warn!("Failed to remove partial environment {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_toolchain, FakeBehaviour};

    #[test]
    fn test_create_is_born_write_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour::default());
        let locked = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap();
        let env = locked.environment().clone();
        assert_eq!(env.state().unwrap(), LockState::WriteLocked);
        assert!(env.try_write_lock().unwrap().is_none());
        assert!(env.try_read_lock().unwrap().is_none());
        locked.unlock().unwrap();
        assert_eq!(env.state().unwrap(), LockState::Unlocked);
    }

    #[test]
    fn test_failed_provision_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour {
            fail_provision: true,
            ..FakeBehaviour::default()
        });
        let err = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap_err();
        assert_eq!(err.step(), Some(Step::Provision));
        assert!(!tmp.path().join("env").exists());
    }

    #[test]
    fn test_install_then_compatible() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour::default());
        let locked = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap();
        let base = tmp.path();
        let want = crate::requirements::parse_specs(["yay==2.5"], base).unwrap();
        assert!(!locked.compatible(&want, &toolchain).unwrap());
        locked.install(&want, &toolchain).unwrap();
        assert!(locked.compatible(&want, &toolchain).unwrap());
        let newer = crate::requirements::parse_specs(["yay>=3"], base).unwrap();
        assert!(!locked.compatible(&newer, &toolchain).unwrap());
        assert!(locked.compatible(&[], &toolchain).unwrap());
        locked.unlock().unwrap();
    }

    #[test]
    fn test_opaque_never_compatible() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour::default());
        let locked = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap();
        let want = crate::requirements::parse_specs(["foo; sys_platform == 'linux'"], tmp.path()).unwrap();
        locked.install(&want, &toolchain).unwrap();
        assert!(!locked.compatible(&want, &toolchain).unwrap());
        locked.unlock().unwrap();
    }

    #[test]
    fn test_drop_releases_write_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour::default());
        let locked = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap();
        let env = locked.environment().clone();
        drop(locked);
        assert_eq!(env.state().unwrap(), LockState::Unlocked);
    }

    #[test]
    fn test_downgrade_blocks_writers() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(FakeBehaviour::default());
        let locked = Environment::create("3.11", tmp.path().join("env"), &toolchain).unwrap();
        let (env, mut read) = locked.downgrade().unwrap();
        assert!(env.try_write_lock().unwrap().is_none());
        read.unlock().unwrap();
        let again = env.try_write_lock().unwrap().unwrap();
        again.unlock().unwrap();
    }

    #[test]
    fn test_runtime_version_from_parent() {
        let env = Environment::open("/pool/3.11/venv-abc");
        assert_eq!(env.runtime_version(), Some("3.11"));
    }
}
