//! Environment management commands: list and clean pooled environments.
//!
//! Pooled environments live in `<pool>/<runtime version>/venv-*`, the pool
//! being `~/.cache/venvpool/pool` (or `$VENVPOOL_DIR`, or `--pool-dir`).

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use venvpool_env::{layout, Cleaner, PoolRoot};

#[derive(Debug, Serialize)]
struct EnvRow {
    runtime: String,
    path: PathBuf,
    state: String,
    modified: Option<DateTime<Local>>,
}

/// `venvpool list`
pub fn cmd_list(root: &PoolRoot, json: bool) -> Result<()> {
    let envs = layout::all_environments(root.base())
        .with_context(|| format!("List {}", root.base().display()))?;
    let rows: Vec<EnvRow> = envs
        .iter()
        .map(|env| EnvRow {
            runtime: env.runtime_version().unwrap_or_default().to_string(),
            path: env.path().to_path_buf(),
            state: match env.state() {
                Ok(state) => state.to_string(),
                Err(e) => format!("unknown ({})", e),
            },
            modified: std::fs::metadata(env.path())
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        eprintln!("No pooled environments found at {}", root.base().display());
        return Ok(());
    }
    for row in &rows {
        let name = row.path.file_name().unwrap_or_default().to_string_lossy();
        let modified = row
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<8} {:<40} {:<18} {}", row.runtime, name, row.state, modified);
    }
    Ok(())
}

/// `venvpool clean`
pub fn cmd_clean(root: &PoolRoot, dry_run: bool, force: bool) -> Result<()> {
    let idle = Cleaner::new(root)
        .lock_idle()
        .with_context(|| format!("Scan {}", root.base().display()))?;

    for busy in idle.busy() {
        eprintln!("  ⏳ In use, kept: {}", busy.display());
    }
    if idle.is_empty() {
        eprintln!("No idle environments found at {}", root.base().display());
        idle.release()?;
        return Ok(());
    }

    eprintln!(
        "🗂  Idle environments ({}) in {}:",
        idle.len(),
        root.base().display()
    );
    eprintln!();
    for (path, size) in idle.entries() {
        let runtime = path
            .parent()
            .and_then(|p| p.file_name())
            .unwrap_or_default()
            .to_string_lossy();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        eprintln!("  • {}/{} ({})", runtime, name, format_size(size));
    }
    eprintln!();
    eprintln!("Total: {} ({} environments)", format_size(idle.total_size()), idle.len());

    if dry_run {
        eprintln!();
        eprintln!("(Dry run: no files removed. Remove --dry-run to delete.)");
        idle.release()?;
        return Ok(());
    }

    // Confirm removal; the environments stay locked while we wait.
    if !force {
        eprint!("\nRemove all idle environments? [y/N] ");
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            eprintln!("Cancelled.");
            idle.release()?;
            return Ok(());
        }
    }

    let total = idle.len();
    let report = idle.remove();
    eprintln!();
    if report.failed == 0 {
        eprintln!(
            "✓ Removed {} environment(s), freed {}",
            report.removed,
            format_size(report.freed)
        );
    } else {
        eprintln!(
            "⚠ Removed {}/{} environments ({} errors)",
            report.removed, total, report.failed
        );
    }
    Ok(())
}

/// Format byte size to human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
