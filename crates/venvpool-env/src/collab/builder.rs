//! Build Python virtual environments and install into them (venv / pip).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use venvpool_core::cache::SessionCache;

use super::{Installer, Provisioner};
use crate::error::CollaboratorError;

/// Stops pip from prompting a desktop keyring for index credentials.
const KEYRING_BACKEND: (&str, &str) = ("PYTHON_KEYRING_BACKEND", "keyring.backends.null.Keyring");

/// `python<runtime> -m venv <dest>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VenvProvisioner;

impl Provisioner for VenvProvisioner {
    fn create(&self, runtime_version: &str, destination: &Path) -> Result<(), CollaboratorError> {
        let python = which_python(runtime_version)?;
        tracing::debug!("Create venv {} with {}", destination.display(), python.display());
        let mut cmd = Command::new(&python);
        cmd.arg("-m").arg("venv").arg(destination);
        run_checked(cmd, &python.to_string_lossy())
    }
}

/// `<env>/bin/pip install <args>`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    cache: Arc<SessionCache>,
}

impl PipInstaller {
    pub fn new(cache: Arc<SessionCache>) -> Self {
        Self { cache }
    }
}

impl Installer for PipInstaller {
    fn install(&self, environment: &Path, args: &[String]) -> Result<(), CollaboratorError> {
        if args.is_empty() {
            return Ok(());
        }
        let pip = pip_path(environment);
        let mut cmd = Command::new(&pip);
        if pip.file_name().map(|n| n == "python").unwrap_or(false) {
            cmd.arg("-m").arg("pip");
        }
        cmd.arg("install").args(args);
        cmd.env(KEYRING_BACKEND.0, KEYRING_BACKEND.1);
        if let Some(dir) = self.cache.download_dir() {
            cmd.env("PIP_CACHE_DIR", dir);
        }
        tracing::debug!("Install: {}", args.join(" "));
        run_checked(cmd, "pip install")
    }
}

/// Interpreter for a runtime version: `python3.11` for `3.11`; bare `3` also
/// accepts `python3` and `python`.
fn which_python(runtime_version: &str) -> Result<PathBuf, CollaboratorError> {
    let mut candidates = vec![format!("python{}", runtime_version)];
    if runtime_version == "3" {
        candidates.push("python".to_string());
    }
    for name in &candidates {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }
    Err(CollaboratorError::NotFound {
        program: candidates[0].clone(),
        reason: format!("none of {} on PATH", candidates.join(", ")),
    })
}

fn pip_path(env_dir: &Path) -> PathBuf {
    let pip_bin = env_dir.join("bin").join("pip");
    let pip_scripts = env_dir.join("Scripts").join("pip.exe");
    if pip_bin.exists() {
        pip_bin
    } else if pip_scripts.exists() {
        pip_scripts
    } else {
        env_dir.join("bin").join("python") // fallback: python -m pip
    }
}

/// Directory holding the environment's executables.
pub fn bin_dir(env_dir: &Path) -> PathBuf {
    let scripts = env_dir.join("Scripts");
    if !env_dir.join("bin").exists() && scripts.exists() {
        scripts
    } else {
        env_dir.join("bin")
    }
}

fn run_checked(mut cmd: Command, program: &str) -> Result<(), CollaboratorError> {
    let out = cmd.output().map_err(|source| CollaboratorError::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !out.status.success() {
        return Err(CollaboratorError::Failed {
            program: program.to_string(),
            status: out.status.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pip_path_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(pip_path(tmp.path()), tmp.path().join("bin").join("python"));
        std::fs::create_dir(tmp.path().join("bin")).unwrap();
        std::fs::write(tmp.path().join("bin").join("pip"), "").unwrap();
        assert_eq!(pip_path(tmp.path()), tmp.path().join("bin").join("pip"));
    }

    #[test]
    fn test_bin_dir_prefers_bin() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(bin_dir(tmp.path()), tmp.path().join("bin"));
        std::fs::create_dir(tmp.path().join("Scripts")).unwrap();
        assert_eq!(bin_dir(tmp.path()), tmp.path().join("Scripts"));
    }

    #[test]
    fn test_missing_interpreter() {
        let err = which_python("0.0-no-such-runtime").unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound { .. }));
    }

    #[test]
    fn test_empty_install_is_noop() {
        let installer = PipInstaller::new(Arc::new(SessionCache::default()));
        let tmp = tempfile::tempdir().unwrap();
        installer.install(tmp.path(), &[]).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        match run_checked(cmd, "sh") {
            Err(CollaboratorError::Failed { program, stderr, .. }) => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
