//! Collaborators: the external tools that build and inspect environments.
//!
//! Pool logic only talks to these traits. The default implementations shell
//! out to `python -m venv` and `pip`, and read `site-packages` directly; tests
//! substitute fakes that never spawn a process.

pub mod builder;
pub mod site_packages;

use std::path::Path;
use std::sync::Arc;

use venvpool_core::cache::SessionCache;
use venvpool_core::installed::InstalledPackages;

use crate::error::CollaboratorError;

pub use builder::{PipInstaller, VenvProvisioner};
pub use site_packages::SitePackagesReader;

/// Creates an empty environment for a runtime version.
pub trait Provisioner: Send + Sync {
    /// `destination` already exists and is empty apart from nothing the
    /// provisioner needs to care about.
    fn create(&self, runtime_version: &str, destination: &Path) -> Result<(), CollaboratorError>;
}

/// Installs packages into an existing environment.
pub trait Installer: Send + Sync {
    fn install(&self, environment: &Path, args: &[String]) -> Result<(), CollaboratorError>;
}

/// Reports what an environment has installed.
pub trait ManifestReader: Send + Sync {
    fn installed(&self, environment: &Path) -> Result<InstalledPackages, CollaboratorError>;
}

/// The collaborators and session cache one pool session works with.
pub struct Toolchain {
    pub provisioner: Box<dyn Provisioner>,
    pub installer: Box<dyn Installer>,
    pub manifest: Box<dyn ManifestReader>,
    pub cache: Arc<SessionCache>,
}

impl Toolchain {
    /// venv + pip + site-packages scanning.
    pub fn system(cache: Arc<SessionCache>) -> Self {
        Self {
            provisioner: Box::new(VenvProvisioner),
            installer: Box::new(PipInstaller::new(Arc::clone(&cache))),
            manifest: Box::new(SitePackagesReader),
            cache,
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
