use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// venvpool - reusable Python virtual environments shared between processes
#[derive(Parser, Debug)]
#[command(name = "venvpool")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pool base directory (default: $VENVPOOL_DIR or the user cache dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub pool_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hardlink identical files across idle environments to save disk space
    Compact,

    /// List pooled environments and their lock state
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove idle environments (busy ones are always kept)
    Clean {
        /// Dry run: show what would be removed without deleting
        #[arg(long)]
        dry_run: bool,

        /// Force removal without confirmation
        #[arg(long, short)]
        force: bool,
    },

    /// Run a program inside an environment satisfying the given requirements
    Run {
        /// Runtime version, e.g. 3.11 (default: $VENVPOOL_PYTHON or 3)
        #[arg(long, value_name = "VERSION")]
        python: Option<String>,

        /// Requirements file (repeatable)
        #[arg(short = 'r', long = "requirement", value_name = "FILE")]
        requirement: Vec<PathBuf>,

        /// Single requirement, e.g. "requests>=2" or "-e ./proj" (repeatable)
        #[arg(long = "req", value_name = "REQ", allow_hyphen_values = true)]
        req: Vec<String>,

        /// Use a fresh environment and delete it afterwards
        #[arg(long)]
        ephemeral: bool,

        /// Program and its arguments
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        command: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "venvpool", "--pool-dir", "/tmp/p", "run", "--python", "3.11", "-r", "req.txt", "--req",
            "yay>=2", "--ephemeral", "--", "python", "-c", "print(1)",
        ])
        .unwrap();
        assert_eq!(cli.pool_dir, Some(PathBuf::from("/tmp/p")));
        match cli.command {
            Commands::Run {
                python,
                requirement,
                req,
                ephemeral,
                command,
            } => {
                assert_eq!(python.as_deref(), Some("3.11"));
                assert_eq!(requirement, vec![PathBuf::from("req.txt")]);
                assert_eq!(req, vec!["yay>=2"]);
                assert!(ephemeral);
                assert_eq!(command, vec!["python", "-c", "print(1)"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_editable_req_value() {
        let cli = Cli::try_parse_from(["venvpool", "run", "--req", "-e ./proj", "--", "tool"]).unwrap();
        match cli.command {
            Commands::Run { req, .. } => assert_eq!(req, vec!["-e ./proj"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_program() {
        assert!(Cli::try_parse_from(["venvpool", "run", "--req", "yay"]).is_err());
    }

    #[test]
    fn test_clean_flags() {
        let cli = Cli::try_parse_from(["venvpool", "clean", "--dry-run", "-f"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Clean {
                dry_run: true,
                force: true
            }
        ));
    }
}
