//! What a caller may ask an environment to contain.
//!
//! A requirements line is one of three kinds, decided once at parse time:
//! a versioned project the matcher understands, an editable source checkout,
//! or something only the installer understands (markers, URLs, pip options).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use venvpool_core::installed::InstalledPackages;
use venvpool_core::requirement::{requirement_line, Requirement, RequirementError};

use crate::error::PoolError;

/// A source checkout installed in development mode (`pip install -e <location>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableProject {
    location: PathBuf,
}

impl EditableProject {
    /// `location` is resolved against `base_dir` and canonicalized when it exists.
    pub fn new(location: &Path, base_dir: &Path) -> Self {
        let joined = if location.is_absolute() {
            location.to_path_buf()
        } else {
            base_dir.join(location)
        };
        let location = fs::canonicalize(&joined).unwrap_or(joined);
        Self { location }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementSpec {
    Plain(Requirement),
    Editable(EditableProject),
    /// Passed to the installer verbatim; never matches an existing environment.
    Opaque(String),
}

impl RequirementSpec {
    /// Parse one requirements line. Relative editable paths resolve against `base_dir`.
    pub fn parse(line: &str, base_dir: &Path) -> Result<Self, RequirementError> {
        let line = line.trim();
        if let Some(location) = editable_location(line) {
            if location.is_empty() {
                return Err(RequirementError::InvalidRequirement(line.to_string()));
            }
            return Ok(Self::Editable(EditableProject::new(
                Path::new(location),
                base_dir,
            )));
        }
        if line.starts_with('-') {
            return Ok(Self::Opaque(line.to_string()));
        }
        match Requirement::parse(line) {
            Ok(req) => Ok(Self::Plain(req)),
            Err(RequirementError::Unsupported(_)) => Ok(Self::Opaque(line.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Does `installed` already satisfy this requirement?
    pub fn compatible(&self, installed: &InstalledPackages) -> bool {
        match self {
            Self::Plain(req) => installed
                .version(req.key())
                .map_or(false, |version| req.accept(version)),
            Self::Editable(project) => installed.has_editable_at(project.location()),
            Self::Opaque(_) => false,
        }
    }

    pub fn to_requirement_string(&self) -> String {
        match self {
            Self::Plain(req) => req.to_string(),
            Self::Editable(project) => format!("-e {}", project.location().display()),
            Self::Opaque(raw) => raw.clone(),
        }
    }

    /// Arguments to append to `pip install`.
    pub fn install_args(&self) -> Vec<String> {
        match self {
            Self::Plain(req) => vec![req.to_string()],
            Self::Editable(project) => vec![
                "-e".to_string(),
                project.location().to_string_lossy().into_owned(),
            ],
            Self::Opaque(raw) if raw.starts_with('-') => {
                raw.split_whitespace().map(String::from).collect()
            }
            Self::Opaque(raw) => vec![raw.clone()],
        }
    }
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_requirement_string())
    }
}

fn editable_location(line: &str) -> Option<&str> {
    for flag in ["--editable", "-e"] {
        if let Some(rest) = line.strip_prefix(flag) {
            if let Some(value) = rest.strip_prefix('=') {
                return Some(value.trim());
            }
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Some(rest.trim());
            }
        }
    }
    None
}

/// Parse requirement lines, skipping blanks and comments.
pub fn parse_specs<I, S>(lines: I, base_dir: &Path) -> Result<Vec<RequirementSpec>, RequirementError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| requirement_line(line.as_ref()).map(|l| RequirementSpec::parse(l, base_dir)))
        .collect()
}

/// Read a requirements file; editable paths inside it resolve against its directory.
pub fn read_requirements_file(path: &Path) -> Result<Vec<RequirementSpec>, PoolError> {
    let content = fs::read_to_string(path)
        .map_err(|e| PoolError::io(format!("Read {}", path.display()), e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(parse_specs(content.lines(), base_dir)?)
}
