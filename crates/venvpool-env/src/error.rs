use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use venvpool_core::requirement::RequirementError;
use venvpool_fs::LockError;

/// Failure of an external collaborator (interpreter lookup, venv, pip, manifest scan).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{program} not found: {reason}")]
    NotFound { program: String, reason: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed metadata in {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Provision,
    Install,
    ReadManifest,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Provision => "provision",
            Self::Install => "install",
            Self::ReadManifest => "read manifest",
        })
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{step} failed for {}: {source}", path.display())]
    Collaborator {
        step: Step,
        path: PathBuf,
        #[source]
        source: CollaboratorError,
    },

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error("Invalid runtime version {0:?}")]
    InvalidRuntime(String),

    #[error("Ephemeral checkout of {} cannot be shared", .0.display())]
    EphemeralShare(PathBuf),

    #[error("Interrupted")]
    Interrupted,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PoolError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn collaborator(step: Step, path: impl Into<PathBuf>, source: CollaboratorError) -> Self {
        Self::Collaborator {
            step,
            path: path.into(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// The failing collaborator step, if this error came from one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Collaborator { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_names_step() {
        let err = PoolError::collaborator(
            Step::Install,
            "/pool/3.11/venv-x",
            CollaboratorError::Failed {
                program: "pip".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "No matching distribution".to_string(),
            },
        );
        let text = err.to_string();
        assert!(text.starts_with("install failed for /pool/3.11/venv-x"), "{}", text);
        assert_eq!(err.step(), Some(Step::Install));
        assert_eq!(Step::ReadManifest.to_string(), "read manifest");
    }
}
