//! What an environment has installed: distribution versions and editable links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::requirement::normalize_name;

/// Manifest of one environment, keyed by normalized distribution name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackages {
    versions: BTreeMap<String, String>,
    editables: BTreeMap<String, PathBuf>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_version(&mut self, name: &str, version: impl Into<String>) {
        self.versions.insert(normalize_name(name), version.into());
    }

    pub fn insert_editable(&mut self, name: &str, location: impl Into<PathBuf>) {
        self.editables.insert(normalize_name(name), location.into());
    }

    /// Installed version of `name`, matched on the normalized name.
    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions.get(&normalize_name(name)).map(String::as_str)
    }

    /// True if any editable install points at `location`.
    pub fn has_editable_at(&self, location: &Path) -> bool {
        self.editables.values().any(|p| p == location)
    }

    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.versions
    }

    pub fn editables(&self) -> &BTreeMap<String, PathBuf> {
        &self.editables
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.editables.is_empty()
    }
}
