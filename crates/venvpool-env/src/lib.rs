//! Pooled Python virtual environments.
//!
//! A [`PoolRoot`] holds one directory per runtime version, each containing any
//! number of environments. Processes check environments out with
//! [`PoolRoot::acquire`], which reuses an idle compatible environment or builds
//! a fresh one. All coordination between processes goes through the
//! filesystem locks of `venvpool-fs`; nothing here ever waits on a lock.

pub mod clean;
pub mod collab;
pub mod compact;
pub mod environment;
pub mod error;
pub mod layout;
pub mod pool;
pub mod requirements;

#[cfg(test)]
mod testing;

pub use clean::{CleanReport, Cleaner, IdleSet};
pub use collab::{Installer, ManifestReader, Provisioner, Toolchain};
pub use compact::{CompactReport, Compactor};
pub use environment::{Environment, LockedEnvironment};
pub use error::{CollaboratorError, PoolError, Step};
pub use pool::{Checkout, Pool, PoolRoot, SharedCheckout};
pub use requirements::{parse_specs, read_requirements_file, EditableProject, RequirementSpec};
