//! venvpool CLI library, shared by the venvpool and venvpool-compact binaries.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use venvpool_core::config::PoolConfig;
use venvpool_core::interrupt::Interrupt;
use venvpool_env::{PoolError, PoolRoot};

pub use commands::EXIT_INTERRUPTED;

/// Run the CLI: parse args and dispatch to command handlers.
/// Returns the process exit code.
pub fn run_cli() -> Result<i32> {
    let cli = Cli::parse();
    venvpool_core::observability::init_tracing();
    let interrupt = install_interrupt_handler()?;

    let config = PoolConfig::from_env().with_pool_dir(cli.pool_dir);
    let root = PoolRoot::from_config(&config).with_interrupt(interrupt);
    tracing::debug!("Pool at {}", root.base().display());

    match cli.command {
        Commands::Compact => commands::compact::cmd_compact(&root),
        Commands::List { json } => {
            commands::env::cmd_list(&root, json)?;
            Ok(0)
        }
        Commands::Clean { dry_run, force } => {
            commands::env::cmd_clean(&root, dry_run, force)?;
            Ok(0)
        }
        Commands::Run {
            python,
            requirement,
            req,
            ephemeral,
            command,
        } => {
            let python = python.unwrap_or_else(|| config.python.clone());
            commands::run::cmd_run(&root, &python, &requirement, &req, ephemeral, &command)
        }
    }
}

/// Entry point of `venvpool-compact`: compact the configured pool, no arguments.
pub fn run_compact() -> Result<i32> {
    venvpool_core::observability::init_tracing();
    let interrupt = install_interrupt_handler()?;
    let root = PoolRoot::from_config(&PoolConfig::from_env()).with_interrupt(interrupt);
    commands::compact::cmd_compact(&root)
}

/// Exit code for an error that escaped a command.
pub fn error_exit_code(err: &anyhow::Error) -> i32 {
    let interrupted = err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<PoolError>(), Some(PoolError::Interrupted)));
    if interrupted {
        EXIT_INTERRUPTED
    } else {
        1
    }
}

/// Ctrl+C only raises the flag; the process keeps running so that whatever
/// holds a lock releases it (or removes a half-built environment) on the
/// ordinary error path. Subprocesses in the foreground group get the signal
/// themselves and fail on their own.
fn install_interrupt_handler() -> Result<Interrupt> {
    let interrupt = Interrupt::new();
    let flag = interrupt.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Received Ctrl+C, cleaning up...");
        flag.raise();
    })
    .context("Failed to set Ctrl+C handler")?;
    Ok(interrupt)
}
