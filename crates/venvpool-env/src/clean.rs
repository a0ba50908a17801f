//! Remove idle environments from the pool.
//!
//! Cleaning is two-phase so a caller can show what would go and ask first:
//! [`Cleaner::lock_idle`] write-locks every idle environment, then the
//! resulting [`IdleSet`] is either removed or released. Busy environments are
//! never locked, so they are never deleted.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::environment::LockedEnvironment;
use crate::error::PoolError;
use crate::layout;
use crate::pool::PoolRoot;

#[derive(Debug, Clone)]
pub struct Cleaner {
    root: PoolRoot,
}

impl Cleaner {
    pub fn new(root: &PoolRoot) -> Self {
        Self { root: root.clone() }
    }

    pub fn lock_idle(&self) -> Result<IdleSet, PoolError> {
        let mut idle = Vec::new();
        let mut busy = Vec::new();
        for env in layout::all_environments(self.root.base())? {
            match env.try_write_lock() {
                Ok(Some(locked)) => {
                    let size = dir_size(locked.path());
                    idle.push((locked, size));
                }
                Ok(None) => busy.push(env.path().to_path_buf()),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", env.path().display(), e);
                    busy.push(env.path().to_path_buf());
                }
            }
        }
        Ok(IdleSet {
            root: self.root.clone(),
            idle,
            busy,
        })
    }
}

/// Idle environments held write-locked, with their apparent sizes.
///
/// Dropped without [`remove`](Self::remove) or [`release`](Self::release),
/// every environment is unlocked again.
#[derive(Debug)]
pub struct IdleSet {
    root: PoolRoot,
    idle: Vec<(LockedEnvironment, u64)>,
    busy: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: usize,
    pub failed: usize,
    pub freed: u64,
}

impl IdleSet {
    pub fn entries(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.idle.iter().map(|(locked, size)| (locked.path(), *size))
    }

    pub fn len(&self) -> usize {
        self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.idle.iter().map(|(_, size)| size).sum()
    }

    /// Environments that were in use and left alone.
    pub fn busy(&self) -> &[PathBuf] {
        &self.busy
    }

    pub fn remove(mut self) -> CleanReport {
        let mut report = CleanReport::default();
        for (locked, size) in self.idle.drain(..) {
            let path = locked.path().to_path_buf();
            match locked.delete(self.root.toolchain()) {
                Ok(()) => {
                    tracing::info!("Removed {}", path.display());
                    report.removed += 1;
                    report.freed += size;
                }
                Err(e) => {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Unlock everything without deleting, newest lock first.
    pub fn release(mut self) -> Result<(), PoolError> {
        let mut first_error = None;
        while let Some((locked, _)) = self.idle.pop() {
            if let Err(e) = locked.unlock() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Total length of regular files under `path`. Hardlinked files count in full
/// in every environment that links them.
fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
