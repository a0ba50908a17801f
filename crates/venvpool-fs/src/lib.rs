//! Filesystem primitives for sharing directories between unrelated processes.
//!
//! [`SharedDir`] turns any directory into a multi-reader/single-writer mutex
//! using nothing but atomic `mkdir`, `rmdir`, `rename` and create-new file
//! semantics. There is no daemon and no shared memory; every operation is a
//! non-blocking attempt.

pub mod error;
pub mod listing;
pub mod reader;
pub mod shared_dir;

pub use error::{is_not_empty, is_not_found, LockError};
pub use listing::list_or_empty;
pub use shared_dir::{LockState, ReadLock, SharedDir, READLOCKS};
