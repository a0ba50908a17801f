//! Pool of reusable environments, one directory per runtime version.
//!
//! Acquisition scans existing environments in name order and takes the first
//! one it can write-lock whose manifest satisfies the requirements. Lock
//! acquisition and the compatibility check happen under the same write lock,
//! so a contender either fails to lock or sees a consistent environment. When
//! nothing fits, a fresh environment is created, installed into, and handed
//! out still write-locked.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;
use venvpool_core::cache::SessionCache;
use venvpool_core::config::PoolConfig;
use venvpool_core::installed::InstalledPackages;
use venvpool_core::interrupt::Interrupt;
use venvpool_fs::{LockError, ReadLock};

use crate::collab::builder::bin_dir;
use crate::collab::Toolchain;
use crate::environment::{discard, Environment, LockedEnvironment};
use crate::error::PoolError;
use crate::layout;
use crate::requirements::RequirementSpec;

/// Base directory holding one [`Pool`] per runtime version.
#[derive(Debug, Clone)]
pub struct PoolRoot {
    base: PathBuf,
    toolchain: Arc<Toolchain>,
    interrupt: Interrupt,
}

impl PoolRoot {
    pub fn new(base: impl Into<PathBuf>, toolchain: Toolchain) -> Self {
        Self {
            base: base.into(),
            toolchain: Arc::new(toolchain),
            interrupt: Interrupt::new(),
        }
    }

    /// Poll `interrupt` while acquiring; a raised flag aborts with
    /// [`PoolError::Interrupted`] after cleaning up.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Pool at the configured directory with the venv/pip collaborators.
    pub fn from_config(config: &PoolConfig) -> Self {
        let cache = Arc::new(SessionCache::new(config.pip_cache_dir.clone()));
        Self::new(config.pool_dir.clone(), Toolchain::system(cache))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn pool(&self, runtime_version: &str) -> Result<Pool, PoolError> {
        layout::validate_runtime(runtime_version)?;
        Ok(Pool {
            dir: self.base.join(runtime_version),
            runtime_version: runtime_version.to_string(),
            toolchain: Arc::clone(&self.toolchain),
            interrupt: self.interrupt.clone(),
        })
    }

    pub fn acquire(
        &self,
        runtime_version: &str,
        requirements: &[RequirementSpec],
        ephemeral: bool,
    ) -> Result<Checkout, PoolError> {
        self.pool(runtime_version)?.acquire(requirements, ephemeral)
    }
}

/// Environments of a single runtime version.
#[derive(Debug, Clone)]
pub struct Pool {
    dir: PathBuf,
    runtime_version: String,
    toolchain: Arc<Toolchain>,
    interrupt: Interrupt,
}

impl Pool {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn environments(&self) -> Result<Vec<Environment>, PoolError> {
        layout::environments_in(&self.dir)
    }

    /// Check out an environment satisfying `requirements`.
    ///
    /// Ephemeral checkouts always get a fresh environment, deleted on release.
    pub fn acquire(&self, requirements: &[RequirementSpec], ephemeral: bool) -> Result<Checkout, PoolError> {
        self.check_interrupt()?;
        if !ephemeral {
            if let Some(locked) = self.reuse(requirements)? {
                tracing::info!("Reuse {}", locked.path().display());
                return Ok(Checkout::new(locked, false, Arc::clone(&self.toolchain)));
            }
        }
        let locked = self.create(requirements)?;
        Ok(Checkout::new(locked, ephemeral, Arc::clone(&self.toolchain)))
    }

    fn reuse(&self, requirements: &[RequirementSpec]) -> Result<Option<LockedEnvironment>, PoolError> {
        for env in self.environments()? {
            self.check_interrupt()?;
            let locked = match env.try_write_lock() {
                Ok(Some(locked)) => locked,
                Ok(None) => {
                    tracing::debug!("Busy: {}", env.path().display());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", env.path().display(), e);
                    continue;
                }
            };
            match locked.compatible(requirements, &self.toolchain) {
                Ok(true) => return Ok(Some(locked)),
                Ok(false) => release_quietly(locked),
                Err(e) => {
                    release_quietly(locked);
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    fn create(&self, requirements: &[RequirementSpec]) -> Result<LockedEnvironment, PoolError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| PoolError::io(format!("Create {}", self.dir.display()), e))?;
        let destination = self.dir.join(format!("venv-{}", Uuid::new_v4().simple()));
        tracing::info!("Create {}", destination.display());
        let locked = Environment::create(&self.runtime_version, destination, &self.toolchain)?;
        // A collaborator that survives the interrupt may still report success;
        // the environment is discarded either way.
        let result = self
            .check_interrupt()
            .and_then(|()| locked.install(requirements, &self.toolchain))
            .and_then(|()| self.check_interrupt());
        if let Err(e) = result {
            tracing::info!("Discard {}: {}", locked.path().display(), e);
            discard(locked, &self.toolchain);
            return Err(e);
        }
        Ok(locked)
    }

    fn check_interrupt(&self) -> Result<(), PoolError> {
        if self.interrupt.is_raised() {
            Err(PoolError::Interrupted)
        } else {
            Ok(())
        }
    }
}

fn release_quietly(locked: LockedEnvironment) {
    let path = locked.path().to_path_buf();
    if let Err(e) = locked.unlock() {
        tracing::warn!("Failed to release {}: {}", path.display(), e);
    }
}

/// A write-locked environment handed out by [`Pool::acquire`].
///
/// [`release`](Self::release) deletes an ephemeral environment and unlocks any
/// other. Dropping an unreleased checkout does the same, logging failures.
#[derive(Debug)]
pub struct Checkout {
    locked: Option<LockedEnvironment>,
    path: PathBuf,
    ephemeral: bool,
    toolchain: Arc<Toolchain>,
}

impl Checkout {
    fn new(locked: LockedEnvironment, ephemeral: bool, toolchain: Arc<Toolchain>) -> Self {
        Self {
            path: locked.path().to_path_buf(),
            locked: Some(locked),
            ephemeral,
            toolchain,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn bin_dir(&self) -> PathBuf {
        bin_dir(&self.path)
    }

    pub fn installed(&self) -> Result<Arc<InstalledPackages>, PoolError> {
        match &self.locked {
            Some(locked) => locked.installed(&self.toolchain),
            None => Ok(Arc::new(InstalledPackages::new())),
        }
    }

    pub fn release(mut self) -> Result<(), PoolError> {
        match self.locked.take() {
            Some(locked) => finish(locked, self.ephemeral, &self.toolchain),
            None => Ok(()),
        }
    }

    /// Keep using the environment under a read lock: others may reuse it
    /// concurrently but nobody can modify or delete it.
    pub fn into_shared(mut self) -> Result<SharedCheckout, PoolError> {
        if self.ephemeral {
            return Err(PoolError::EphemeralShare(self.path.clone()));
        }
        let Some(locked) = self.locked.take() else {
            return Err(LockError::State {
                path: self.path.clone(),
                reason: "checkout already released",
            }
            .into());
        };
        let (env, read) = locked.downgrade()?;
        Ok(SharedCheckout { env, read })
    }
}

fn finish(locked: LockedEnvironment, ephemeral: bool, toolchain: &Toolchain) -> Result<(), PoolError> {
    if ephemeral {
        tracing::debug!("Delete ephemeral {}", locked.path().display());
        locked.delete(toolchain)
    } else {
        Ok(locked.unlock()?)
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(locked) = self.locked.take() {
            if let Err(e) = finish(locked, self.ephemeral, &self.toolchain) {
                tracing::warn!("Failed to release {}: {}", self.path.display(), e);
            }
        }
    }
}

/// A checked-out environment held under a read lock.
#[derive(Debug)]
pub struct SharedCheckout {
    env: Environment,
    read: ReadLock,
}

impl SharedCheckout {
    pub fn path(&self) -> &Path {
        self.env.path()
    }

    pub fn bin_dir(&self) -> PathBuf {
        bin_dir(self.env.path())
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.read.unlock()
    }
}
