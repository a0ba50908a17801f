//! In-process collaborators for tests: no interpreter, no network.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use venvpool_core::cache::SessionCache;
use venvpool_core::installed::InstalledPackages;
use venvpool_core::interrupt::Interrupt;
use venvpool_core::requirement::{Operator, Requirement};

use crate::collab::{Installer, ManifestReader, Provisioner, Toolchain};
use crate::error::CollaboratorError;

pub(crate) const FAKE_MANIFEST: &str = "fake-manifest.json";

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBehaviour {
    pub fail_provision: bool,
    pub fail_install: bool,
    pub provisions: Arc<AtomicUsize>,
    pub installs: Arc<AtomicUsize>,
    /// Raised once an install has finished, as if Ctrl-C arrived during it.
    pub interrupt_after_install: Option<Interrupt>,
}

struct FakeProvisioner(FakeBehaviour);

impl Provisioner for FakeProvisioner {
    fn create(&self, runtime_version: &str, destination: &Path) -> Result<(), CollaboratorError> {
        self.0.provisions.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(destination.join("bin")).map_err(|source| io(destination, source))?;
        fs::write(
            destination.join("pyvenv.cfg"),
            format!("version = {}\n", runtime_version),
        )
        .map_err(|source| io(destination, source))?;
        if self.0.fail_provision {
            return Err(CollaboratorError::Failed {
                program: "fake-venv".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "provision refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Records `name==version` arguments (version `1.0` when unpinned) and
/// `-e <path>` arguments in a JSON manifest inside the environment.
struct FakeInstaller(FakeBehaviour);

impl Installer for FakeInstaller {
    fn install(&self, environment: &Path, args: &[String]) -> Result<(), CollaboratorError> {
        self.0.installs.fetch_add(1, Ordering::SeqCst);
        // Leave a partial install behind, as a real failing pip would.
        fs::write(environment.join("partial"), args.join(" ")).map_err(|source| io(environment, source))?;
        if self.0.fail_install {
            return Err(CollaboratorError::Failed {
                program: "fake-pip".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "no matching distribution".to_string(),
            });
        }
        let mut installed = read_manifest(environment)?;
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            if arg == "-e" {
                if let Some(location) = args.next() {
                    let name = Path::new(location)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    installed.insert_editable(&name, location);
                }
                continue;
            }
            if let Ok(req) = Requirement::parse(arg) {
                let version = req
                    .specifiers()
                    .iter()
                    .find(|s| s.operator() == Operator::Eq && !s.is_wildcard())
                    .map(|s| s.version().to_string())
                    .unwrap_or_else(|| "1.0".to_string());
                installed.insert_version(req.name(), version);
            }
        }
        let json = serde_json::to_string(&installed).map_err(|e| CollaboratorError::Manifest {
            path: environment.join(FAKE_MANIFEST),
            reason: e.to_string(),
        })?;
        fs::write(environment.join(FAKE_MANIFEST), json).map_err(|source| io(environment, source))?;
        if let Some(interrupt) = &self.0.interrupt_after_install {
            interrupt.raise();
        }
        Ok(())
    }
}

struct FakeManifest;

impl ManifestReader for FakeManifest {
    fn installed(&self, environment: &Path) -> Result<InstalledPackages, CollaboratorError> {
        read_manifest(environment)
    }
}

fn read_manifest(environment: &Path) -> Result<InstalledPackages, CollaboratorError> {
    let path = environment.join(FAKE_MANIFEST);
    match fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text).map_err(|e| CollaboratorError::Manifest {
            path,
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InstalledPackages::new()),
        Err(source) => Err(io(environment, source)),
    }
}

fn io(path: &Path, source: std::io::Error) -> CollaboratorError {
    CollaboratorError::Io {
        context: format!("Fake collaborator at {}", path.display()),
        source,
    }
}

pub(crate) fn fake_toolchain(behaviour: FakeBehaviour) -> Toolchain {
    Toolchain {
        provisioner: Box::new(FakeProvisioner(behaviour.clone())),
        installer: Box::new(FakeInstaller(behaviour)),
        manifest: Box::new(FakeManifest),
        cache: Arc::new(SessionCache::default()),
    }
}
