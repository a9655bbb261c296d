//! # ward-migrate
//!
//! Migration safety engine for local SQLite-backed projects.
//!
//! This crate provides functionality for:
//! - Running an external migration generator with a hard timeout
//! - Snapshotting generated SQL artifacts and diffing them across a run
//! - Classifying each generated statement by data-loss risk
//! - Backing up the live database before destructive changes
//! - Gating destructive changes behind a typed confirmation phrase
//! - Applying the change set and restoring the backup on failure
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │  Generator   │────▶│ Snapshot Diff  │────▶│ Classifier  │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                                                    │
//!                                                    ▼
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │    Apply     │◀────│ Confirm Gate   │◀────│  Backup     │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!        │ failure
//!        ▼
//! ┌──────────────┐
//! │   Restore    │
//! └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ward_migrate::{MigrationConfig, MigrationEngine, MigrationMode, ProcessRunner};
//!
//! async fn migrate(prompter: &dyn Prompter, reporter: &dyn Reporter) -> MigrateResult<()> {
//!     let config = MigrationConfig::new()
//!         .project_root(".")
//!         .database_path("local.db");
//!     let runner = ProcessRunner::new(".").timeout(config.timeout);
//!
//!     let mut engine = MigrationEngine::new(config, &runner, prompter, reporter);
//!     let outcome = engine.run(MigrationMode::Apply).await?;
//!     println!("{} changes", outcome.changes().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Destructive changes
//!
//! `DROP TABLE` and `DROP COLUMN` are always destructive. Column modifications
//! are destructive when they touch nullability, change the data type or rename
//! the column. Before any destructive change is applied the database file is
//! exported to `backups/db-<timestamp>.sqlite` and the operator must type the
//! confirmation phrase (`delete data` by default).

/// Version of the engine crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod apply;
pub mod backup;
pub mod classify;
pub mod command;
pub mod engine;
pub mod error;
pub mod gate;
pub mod present;
pub mod snapshot;

// Re-exports
pub use apply::{ApplyOrchestrator, FailureCause, apply_error};
pub use backup::{BackupManager, MigrationBackup, backup_file_name};
pub use classify::{ChangeKind, MigrationChange, PatternClassifier, StatementClassifier, classify};
pub use command::{CommandResult, CommandRunner, ExternalCommand, ProcessRunner};
pub use engine::{
    MigrationConfig, MigrationEngine, MigrationMode, MigrationOutcome, MigrationPhase,
};
pub use error::{MigrateResult, MigrationError};
pub use gate::{ConfirmationGate, GateDecision, Prompter, requires_confirmation};
pub use present::{DiffSummary, Reporter, present};
pub use snapshot::{SqlSnapshot, split_statements};
