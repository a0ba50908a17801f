//! Read an environment's installed distributions straight from `site-packages`.
//!
//! Much faster than asking pip: only the `Name` and `Version` headers of each
//! `*.dist-info/METADATA` are read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use venvpool_core::installed::InstalledPackages;
use venvpool_fs::list_or_empty;

use super::ManifestReader;
use crate::error::CollaboratorError;

const DIST_INFO: &str = ".dist-info";
const EGG_LINK: &str = ".egg-link";

#[derive(Debug, Clone, Copy, Default)]
pub struct SitePackagesReader;

impl ManifestReader for SitePackagesReader {
    fn installed(&self, environment: &Path) -> Result<InstalledPackages, CollaboratorError> {
        let mut installed = InstalledPackages::new();
        for site_packages in site_packages_dirs(environment)? {
            read_site_packages(&site_packages, &mut installed)?;
        }
        Ok(installed)
    }
}

/// `lib/python*/site-packages` on unix layouts, `Lib/site-packages` on Windows.
fn site_packages_dirs(env_dir: &Path) -> Result<Vec<PathBuf>, CollaboratorError> {
    let lib = env_dir.join("lib");
    let mut dirs: Vec<PathBuf> = list_or_empty(&lib)
        .map_err(|e| io_error(&lib, e))?
        .into_iter()
        .map(|p| p.join("site-packages"))
        .filter(|p| p.is_dir())
        .collect();
    let windows = env_dir.join("Lib").join("site-packages");
    if windows.is_dir() && !dirs.contains(&windows) {
        dirs.push(windows);
    }
    Ok(dirs)
}

fn read_site_packages(dir: &Path, installed: &mut InstalledPackages) -> Result<(), CollaboratorError> {
    for entry in list_or_empty(dir).map_err(|e| io_error(dir, e))? {
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(DIST_INFO) {
            let (project, version) = read_metadata(&entry.join("METADATA"))?;
            if let Some(location) = editable_location(&entry.join("direct_url.json")) {
                installed.insert_editable(&project, location);
            }
            installed.insert_version(&project, version);
        } else if let Some(project) = name.strip_suffix(EGG_LINK) {
            let content = fs::read_to_string(&entry).map_err(|e| io_error(&entry, e))?;
            if let Some(first) = content.lines().next().map(str::trim).filter(|l| !l.is_empty()) {
                installed.insert_editable(project, canonical(Path::new(first)));
            }
        }
    }
    Ok(())
}

/// `Name` and `Version` from the header block of a METADATA file.
fn read_metadata(path: &Path) -> Result<(String, String), CollaboratorError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let mut name = None;
    let mut version = None;
    for line in content.lines() {
        if line.is_empty() {
            break; // headers end, description body follows
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        match field {
            "Name" => name = Some(value.trim().to_string()),
            "Version" => version = Some(value.trim().to_string()),
            _ => {}
        }
        if name.is_some() && version.is_some() {
            break;
        }
    }
    match (name, version) {
        (Some(name), Some(version)) => Ok((name, version)),
        _ => Err(CollaboratorError::Manifest {
            path: path.to_path_buf(),
            reason: "missing Name or Version".to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct DirectUrl {
    url: String,
    #[serde(default)]
    dir_info: Option<DirInfo>,
}

#[derive(Debug, Deserialize)]
struct DirInfo {
    #[serde(default)]
    editable: bool,
}

/// Source location recorded by a modern editable install, if any.
fn editable_location(path: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(path).ok()?;
    let direct: DirectUrl = serde_json::from_str(&content).ok()?;
    if !direct.dir_info.map_or(false, |d| d.editable) {
        return None;
    }
    let local = direct.url.strip_prefix("file://")?;
    Some(canonical(Path::new(&percent_decode(local))))
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn io_error(path: &Path, source: std::io::Error) -> CollaboratorError {
    CollaboratorError::Io {
        context: format!("Read {}", path.display()),
        source,
    }
}
