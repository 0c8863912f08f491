//! `doclinks`: normalize markdown link targets across a documentation tree.

/// kebab-case detection and conversion.
mod case;
/// `fix` and `check` over a whole tree.
mod commands;
/// `.doclinks.toml` loading and validation.
mod config;
/// Markdown rendering of fatal errors.
mod diagnostics;
/// The crate error type.
mod error;
/// Per-document normalization.
mod normalizer;
/// `renames list/add/remove`.
mod renames;
/// Markdown and JSON run reports.
mod report;
/// The link rewrite rules.
mod rules;
/// Inline link extraction.
mod scanner;
/// Shared domain types.
mod types;
/// Tree walking and the file index.
mod walker;
/// `watch` mode.
mod watch;
/// Atomic writes and file renames.
mod writer;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;

/// Command line.
#[derive(Parser)]
#[command(name = "doclinks", version, about = "Normalize markdown link targets across a documentation tree")]
struct Cli {
    /// Command to run
    #[command(subcommand)]
    command: Commands,

    /// Root of the documentation tree
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Log every file and rewritten link to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Exit 1 if any document would change (no writes)
    Check {
        /// Output format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
    /// Rewrite link targets in place and rename mis-cased files
    Fix {
        /// Compute and report changes without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
    /// Manage the known-rename table in .doclinks.toml
    Renames {
        /// What to do with the table
        #[command(subcommand)]
        action: RenameAction,
    },
    /// Run check, then re-check whenever a document changes
    Watch {
        /// Output format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
}

/// `renames` subcommands.
#[derive(Subcommand)]
enum RenameAction {
    /// Add a rename (old target -> replacement)
    Add {
        /// Target as it appears in old links
        from: String,
        /// Replacement inserted verbatim
        to: String,
    },
    /// Show all configured renames
    List,
    /// Remove a rename
    Remove {
        /// Target key to remove
        from: String,
    },
}

/// Parse the command line, run one command, map its result to an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = cli.dir;
    let result = match cli.command {
        Commands::Check { format } => commands::check(&root, format),
        Commands::Fix { dry_run, format } => commands::fix(&root, dry_run, format),
        Commands::Renames { action } => run_rename_action(&root, action).map(|()| return ExitCode::SUCCESS),
        Commands::Watch { format } => watch::run(&root, format),
    };

    return result.unwrap_or_else(|e| {
        diagnostics::print_error(&e);
        return ExitCode::FAILURE;
    });
}

/// Dispatch a `renames` subcommand.
///
/// # Errors
///
/// Returns errors from config reading, validation, or writing.
fn run_rename_action(root: &std::path::Path, action: RenameAction) -> Result<(), error::Error> {
    return match action {
        RenameAction::Add { from, to } => renames::cmd_add(root, &from, &to),
        RenameAction::List => renames::cmd_list(root),
        RenameAction::Remove { from } => renames::cmd_remove(root, &from),
    };
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "doclinks=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
