//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable selecting the live database file.
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Ward CLI - Safe schema migrations for local databases
#[derive(Parser, Debug)]
#[command(name = "ward")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Ward CLI - Safe schema migrations for local databases", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate, review and apply pending schema migrations
    Migrate(MigrateArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Generate and show the diff without applying anything
    #[arg(long, conflicts_with = "production")]
    pub preview: bool,

    /// Apply to a production database (asks for an extra confirmation)
    #[arg(long)]
    pub production: bool,

    /// Path to the live database file
    #[arg(short, long, env = DATABASE_PATH_ENV)]
    pub database: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}
