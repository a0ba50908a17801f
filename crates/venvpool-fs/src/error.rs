use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`crate::SharedDir`] operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock protocol was violated, e.g. a double unlock. Always a bug in the caller.
    #[error("Lock state violation at {}: {reason}", path.display())]
    State { path: PathBuf, reason: &'static str },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn state(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::State {
            path: path.into(),
            reason,
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// OS error code of an `Io` error.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            Self::State { .. } => None,
        }
    }
}

/// `ENOENT`.
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// `ENOTEMPTY`, or `EEXIST` which some platforms return from `rmdir` on a non-empty directory.
pub fn is_not_empty(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        if let Some(code) = err.raw_os_error() {
            return code == Errno::ENOTEMPTY as i32 || code == Errno::EEXIST as i32;
        }
    }
    err.kind() == io::ErrorKind::DirectoryNotEmpty
}
