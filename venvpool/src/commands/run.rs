//! `venvpool run`: acquire an environment, run a program in it, release it.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use venvpool_env::{parse_specs, read_requirements_file, PoolRoot, RequirementSpec};

pub fn cmd_run(
    root: &PoolRoot,
    python: &str,
    requirement_files: &[PathBuf],
    reqs: &[String],
    ephemeral: bool,
    command: &[String],
) -> Result<i32> {
    let (program, args) = command.split_first().context("No program given")?;
    let specs = collect_specs(requirement_files, reqs)?;

    let checkout = root
        .acquire(python, &specs, ephemeral)
        .with_context(|| format!("Acquire python {} environment", python))?;
    if root.interrupt().is_raised() {
        checkout.release()?;
        return Ok(super::EXIT_INTERRUPTED);
    }

    let status = if checkout.is_ephemeral() {
        // Nobody else can use it anyway; keep the write lock until deletion.
        let status = run_in(checkout.path(), &checkout.bin_dir(), program, args);
        checkout.release()?;
        status?
    } else {
        let shared = checkout.into_shared()?;
        let status = run_in(shared.path(), &shared.bin_dir(), program, args);
        shared.release()?;
        status?
    };
    Ok(exit_code(status))
}

fn collect_specs(requirement_files: &[PathBuf], reqs: &[String]) -> Result<Vec<RequirementSpec>> {
    let mut specs = Vec::new();
    for file in requirement_files {
        specs.extend(
            read_requirements_file(file)
                .with_context(|| format!("Read requirements from {}", file.display()))?,
        );
    }
    let cwd = std::env::current_dir().context("Current directory")?;
    specs.extend(parse_specs(reqs, &cwd)?);
    Ok(specs)
}

/// Run `program` as if the environment were activated.
fn run_in(env_dir: &Path, bin_dir: &Path, program: &str, args: &[String]) -> Result<ExitStatus> {
    let mut path_entries = vec![bin_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        path_entries.extend(std::env::split_paths(&existing));
    }
    let path: OsString = std::env::join_paths(path_entries).context("Build PATH")?;

    let resolved = resolve_program(bin_dir, program);
    tracing::debug!("Run {} in {}", resolved.display(), env_dir.display());
    Command::new(&resolved)
        .args(args)
        .env("PATH", path)
        .env("VIRTUAL_ENV", env_dir)
        .env_remove("PYTHONHOME")
        .status()
        .with_context(|| format!("Run {}", program))
}

/// Bare names prefer the environment's own executables.
fn resolve_program(bin_dir: &Path, program: &str) -> PathBuf {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return PathBuf::from(program);
    }
    for candidate in [program.to_string(), format!("{}.exe", program)] {
        let path = bin_dir.join(&candidate);
        if path.is_file() {
            return path;
        }
    }
    PathBuf::from(program)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
