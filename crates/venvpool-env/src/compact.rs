//! Compaction: hardlink byte-identical files across idle environments.
//!
//! Every environment of every runtime version is write-locked first; busy ones
//! are skipped. Deduplication only ever touches the locked set, and every lock
//! taken is released in reverse order whatever happens in between.

use std::collections::HashMap;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use venvpool_core::interrupt::Interrupt;
use walkdir::WalkDir;

use crate::environment::LockedEnvironment;
use crate::error::PoolError;
use crate::layout;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactReport {
    /// Environments locked and scanned.
    pub environments: usize,
    /// Environments skipped because someone else held a lock.
    pub busy: usize,
    pub files_scanned: usize,
    pub files_linked: usize,
    pub bytes_saved: u64,
    /// Per-environment and per-file failures that were logged and skipped.
    pub errors: usize,
    /// Stopped early on request; locks were still released.
    pub interrupted: bool,
}

#[derive(Debug, Clone)]
pub struct Compactor {
    base: PathBuf,
    interrupt: Interrupt,
}

impl Compactor {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            interrupt: Interrupt::new(),
        }
    }

    /// Stop between environments and between link groups once `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn compact(&self) -> Result<CompactReport, PoolError> {
        let mut report = CompactReport::default();
        let mut locked: Vec<LockedEnvironment> = Vec::new();
        for env in layout::all_environments(&self.base)? {
            if self.interrupt.is_raised() {
                break;
            }
            match env.try_write_lock() {
                Ok(Some(held)) => locked.push(held),
                Ok(None) => {
                    tracing::debug!("Busy: {}", env.path().display());
                    report.busy += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", env.path().display(), e);
                    report.errors += 1;
                }
            }
        }
        report.environments = locked.len();

        let roots: Vec<PathBuf> = locked.iter().map(|l| l.path().to_path_buf()).collect();
        let stats = dedupe(&roots, &self.interrupt);
        report.files_scanned = stats.scanned;
        report.files_linked = stats.linked;
        report.bytes_saved = stats.bytes_saved;
        report.errors += stats.errors;
        report.interrupted = self.interrupt.is_raised();
        if report.interrupted {
            tracing::warn!("Compaction interrupted, releasing {} environments", locked.len());
        }

        let mut first_unlock_error = None;
        while let Some(held) = locked.pop() {
            let path = held.path().to_path_buf();
            if let Err(e) = held.unlock() {
                tracing::warn!("Failed to release {}: {}", path.display(), e);
                first_unlock_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_unlock_error {
            return Err(e.into());
        }
        tracing::info!(
            "Compacted {} environments ({} busy): linked {} files, saved {} bytes",
            report.environments,
            report.busy,
            report.files_linked,
            report.bytes_saved
        );
        Ok(report)
    }
}

#[derive(Debug, Default)]
struct DedupStats {
    scanned: usize,
    linked: usize,
    bytes_saved: u64,
    errors: usize,
}

#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    len: u64,
    device: u64,
    inode: Option<u64>,
    mode: u32,
    nlink: u64,
}

impl FileEntry {
    fn same_inode(&self, other: &FileEntry) -> bool {
        self.inode.is_some() && self.inode == other.inode
    }
}

#[cfg(unix)]
fn file_entry(path: PathBuf, meta: &Metadata) -> FileEntry {
    use std::os::unix::fs::MetadataExt;
    FileEntry {
        path,
        len: meta.len(),
        device: meta.dev(),
        inode: Some(meta.ino()),
        mode: meta.mode() & 0o7777,
        nlink: meta.nlink(),
    }
}

#[cfg(not(unix))]
fn file_entry(path: PathBuf, meta: &Metadata) -> FileEntry {
    FileEntry {
        path,
        len: meta.len(),
        device: 0,
        inode: None,
        mode: meta.permissions().readonly() as u32,
        nlink: 1,
    }
}

/// Only files agreeing on all of these can become one inode.
type LinkKey = (u64, u64, u32);

fn link_key(entry: &FileEntry) -> LinkKey {
    (entry.device, entry.len, entry.mode)
}

fn dedupe(roots: &[PathBuf], interrupt: &Interrupt) -> DedupStats {
    let mut stats = DedupStats::default();
    if interrupt.is_raised() {
        return stats;
    }

    let mut by_key: HashMap<LinkKey, Vec<FileEntry>> = HashMap::new();
    for root in roots {
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Walk {}: {}", root.display(), e);
                    stats.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Stat {}: {}", entry.path().display(), e);
                    stats.errors += 1;
                    continue;
                }
            };
            if meta.len() == 0 {
                continue;
            }
            stats.scanned += 1;
            let file = file_entry(entry.into_path(), &meta);
            by_key.entry(link_key(&file)).or_default().push(file);
        }
    }

    let candidates: Vec<FileEntry> = by_key
        .into_values()
        .filter(|group| group.len() > 1)
        .flatten()
        .collect();
    let hashed: Vec<(FileEntry, io::Result<String>)> = candidates
        .into_par_iter()
        .map(|file| {
            let digest = sha256_file(&file.path);
            (file, digest)
        })
        .collect();

    let mut by_digest: HashMap<(LinkKey, String), Vec<FileEntry>> = HashMap::new();
    for (file, digest) in hashed {
        match digest {
            Ok(digest) => by_digest.entry((link_key(&file), digest)).or_default().push(file),
            Err(e) => {
                tracing::warn!("Hash {}: {}", file.path.display(), e);
                stats.errors += 1;
            }
        }
    }
    let mut groups: Vec<Vec<FileEntry>> = by_digest
        .into_values()
        .filter(|group| group.len() > 1)
        .collect();
    for group in &mut groups {
        // Keep the inode that already has the most links, so fewer files change.
        group.sort_by(|a, b| b.nlink.cmp(&a.nlink).then_with(|| a.path.cmp(&b.path)));
    }
    groups.sort_by(|a, b| a[0].path.cmp(&b[0].path));

    for group in groups {
        if interrupt.is_raised() {
            break;
        }
        link_group(&group, &mut stats);
    }
    stats
}

fn link_group(group: &[FileEntry], stats: &mut DedupStats) {
    let Some((keep, rest)) = group.split_first() else {
        return;
    };
    // Links each replaced inode still has; its bytes are freed when this hits zero.
    let mut remaining: HashMap<u64, u64> = HashMap::new();
    for dup in rest {
        if dup.same_inode(keep) {
            continue;
        }
        match files_equal(&keep.path, &dup.path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!("Compare {}: {}", dup.path.display(), e);
                stats.errors += 1;
                continue;
            }
        }
        if let Err(e) = replace_with_link(&keep.path, &dup.path) {
            tracing::warn!("Link {}: {}", dup.path.display(), e);
            stats.errors += 1;
            continue;
        }
        stats.linked += 1;
        match dup.inode {
            Some(inode) => {
                let left = remaining.entry(inode).or_insert(dup.nlink);
                *left = left.saturating_sub(1);
                if *left == 0 {
                    stats.bytes_saved += dup.len;
                }
            }
            None => stats.bytes_saved += dup.len,
        }
    }
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];
    loop {
        let n = fa.read(&mut buf_a)?;
        if n == 0 {
            // Same length was checked up front; anything left in `b` means it changed.
            return Ok(fb.read(&mut buf_b[..1])? == 0);
        }
        fb.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

/// Atomically make `dup` another name for `keep`'s inode.
fn replace_with_link(keep: &Path, dup: &Path) -> io::Result<()> {
    let parent = dup.parent().unwrap_or_else(|| Path::new("."));
    let name = dup
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.venvpool-link", name, Uuid::new_v4().simple()));
    fs::hard_link(keep, &tmp)?;
    if let Err(e) = fs::rename(&tmp, dup) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
