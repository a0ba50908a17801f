//! `venvpool compact` / `venvpool-compact`.

use anyhow::{Context, Result};
use venvpool_env::{Compactor, PoolRoot};

use super::env::format_size;
use super::EXIT_INTERRUPTED;

/// Exit code is 1 only when something failed on disk; busy environments are normal.
pub fn cmd_compact(root: &PoolRoot) -> Result<i32> {
    let report = Compactor::new(root.base())
        .with_interrupt(root.interrupt().clone())
        .compact()
        .with_context(|| format!("Compact {}", root.base().display()))?;

    eprintln!(
        "Compacted {} environment(s), {} busy: linked {} of {} files, freed {}",
        report.environments,
        report.busy,
        report.files_linked,
        report.files_scanned,
        format_size(report.bytes_saved)
    );
    if report.interrupted {
        eprintln!("Interrupted, all environments released.");
        return Ok(EXIT_INTERRUPTED);
    }
    if report.errors > 0 {
        eprintln!("⚠ {} error(s), see log", report.errors);
        return Ok(1);
    }
    Ok(0)
}
