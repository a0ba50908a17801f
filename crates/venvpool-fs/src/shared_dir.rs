//! Directory-as-mutex.
//!
//! State lives in `<root>/readlocks`:
//!
//! | `readlocks/`        | meaning                          |
//! |---------------------|----------------------------------|
//! | exists, empty       | unlocked                         |
//! | does not exist      | exclusively write-locked         |
//! | exists, has files   | one outstanding read lock per file |
//!
//! Every transition is a single atomic filesystem call, so two processes can
//! never both observe success. Nothing here waits: a failed attempt returns
//! `false`/`None` and the caller moves on.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{is_not_empty, is_not_found, LockError};
use crate::reader;

pub const READLOCKS: &str = "readlocks";

/// Observed lock state, for display only. Never base a decision on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    WriteLocked,
    ReadLocked(usize),
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlocked => write!(f, "idle"),
            Self::WriteLocked => write!(f, "write-locked"),
            Self::ReadLocked(n) => write!(f, "read-locked ({})", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedDir {
    root: PathBuf,
    readlocks: PathBuf,
}

impl SharedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let readlocks = root.join(READLOCKS);
        Self { root, readlocks }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take the exclusive lock iff there are no readers and no other writer.
    ///
    /// Orphaned reader files of dead processes are swept first, best-effort.
    pub fn try_write_lock(&self) -> Result<bool, LockError> {
        self.sweep();
        match fs::remove_dir(&self.readlocks) {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) || is_not_empty(&e) => Ok(false),
            Err(e) => Err(LockError::io(
                format!("Write-lock {}", self.root.display()),
                e,
            )),
        }
    }

    /// Release the exclusive lock.
    pub fn write_unlock(&self) -> Result<(), LockError> {
        match fs::create_dir(&self.readlocks) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(LockError::state(
                &self.root,
                "write_unlock while not write-locked",
            )),
            Err(e) => Err(LockError::io(
                format!("Write-unlock {}", self.root.display()),
                e,
            )),
        }
    }

    /// Register as a reader. `None` while write-locked.
    pub fn try_read_lock(&self) -> Result<Option<ReadLock>, LockError> {
        let path = self.readlocks.join(reader::new_reader_name());
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Some(ReadLock::new(path))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(LockError::io(
                format!("Read-lock {}", self.root.display()),
                e,
            )),
        }
    }

    /// Turn a held write lock into a read lock with no unlocked window in between.
    ///
    /// The reader file is created inside a staging directory which is then
    /// renamed onto `readlocks/`.
    pub fn downgrade(&self) -> Result<ReadLock, LockError> {
        if self.readlocks.exists() {
            return Err(LockError::state(&self.root, "downgrade while not write-locked"));
        }
        let staging = self
            .root
            .join(format!(".{}-{}", READLOCKS, Uuid::new_v4().simple()));
        fs::create_dir(&staging).map_err(|e| {
            LockError::io(format!("Create {}", staging.display()), e)
        })?;
        let name = reader::new_reader_name();
        let staged = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging.join(&name));
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&staging);
            return Err(LockError::io(format!("Downgrade {}", self.root.display()), e));
        }
        if let Err(e) = fs::rename(&staging, &self.readlocks) {
            let _ = fs::remove_dir_all(&staging);
            return Err(LockError::io(format!("Downgrade {}", self.root.display()), e));
        }
        Ok(ReadLock::new(self.readlocks.join(name)))
    }

    /// Current state as seen right now; may be stale by the time it is returned.
    pub fn state(&self) -> Result<LockState, LockError> {
        match fs::read_dir(&self.readlocks) {
            Ok(entries) => {
                let n = entries.filter_map(Result::ok).count();
                Ok(if n == 0 {
                    LockState::Unlocked
                } else {
                    LockState::ReadLocked(n)
                })
            }
            Err(e) if is_not_found(&e) => Ok(LockState::WriteLocked),
            Err(e) => Err(LockError::io(
                format!("Inspect {}", self.readlocks.display()),
                e,
            )),
        }
    }

    /// Remove reader files left behind by dead processes. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let entries = match fs::read_dir(&self.readlocks) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut swept = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !reader::is_orphaned(name) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::info!("Swept orphaned read lock {} in {}", name, self.root.display());
                    swept += 1;
                }
                Err(e) if is_not_found(&e) => {}
                Err(e) => {
                    tracing::debug!("Could not sweep {}: {}", entry.path().display(), e);
                }
            }
        }
        swept
    }
}

/// An outstanding read lock: owns one reader file inside `readlocks/`.
///
/// Dropping without [`ReadLock::unlock`] removes the file best-effort.
#[derive(Debug)]
pub struct ReadLock {
    path: PathBuf,
    released: bool,
}

impl ReadLock {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn unlock(&mut self) -> Result<(), LockError> {
        let result = fs::remove_file(&self.path);
        match result {
            Ok(()) => {
                self.released = true;
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                self.released = true;
                Err(LockError::state(&self.path, "read lock already released"))
            }
            Err(e) => Err(LockError::io(
                format!("Read-unlock {}", self.path.display()),
                e,
            )),
        }
    }
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = fs::remove_file(&self.path) {
                if !is_not_found(&e) {
                    tracing::warn!("Leaked read lock {}: {}", self.path.display(), e);
                }
            }
        }
    }
}
