//! Error types for the migration safety engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can terminate a migration run.
///
/// Declining the confirmation gate and running without a database file to
/// back up are not errors; see [`crate::MigrationOutcome::Declined`] and
/// [`crate::BackupManager::backup`] returning `None`.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// An external command exceeded its deadline.
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    ProcessTimeout {
        /// The command line that was running.
        command: String,
        /// The deadline that was exceeded.
        timeout: Duration,
        /// Whether the database was restored from backup before this error surfaced.
        rolled_back: bool,
    },

    /// The generator reported a conflicting or ambiguous schema state.
    #[error("Migration generation hit a conflict, resolve it manually and re-run: {0}")]
    GenerationConflict(String),

    /// The generator exited unsuccessfully for any other reason.
    #[error("Migration generation failed: {0}")]
    GenerationFailed(String),

    /// Applying failed because the target database could not be reached.
    #[error("Could not connect to the database: {0}")]
    ConnectionError(String),

    /// Applying failed because of a migration merge conflict.
    #[error("Migration conflict while applying: {0}")]
    ConflictError(String),

    /// Applying failed for an unrecognized reason.
    #[error("Failed to apply migration:\n{}", join_output(.stderr, .stdout))]
    ApplyFailure {
        /// Captured standard error of the apply command.
        stderr: String,
        /// Captured standard output of the apply command.
        stdout: String,
    },

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the database engine while exporting a backup.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

fn join_output(stderr: &str, stdout: &str) -> String {
    [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl MigrationError {
    /// Create a generation conflict error.
    pub fn generation_conflict(msg: impl Into<String>) -> Self {
        Self::GenerationConflict(msg.into())
    }

    /// Create a generation failure error.
    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an apply-time conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConflictError(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error was raised by the apply step, after any backup
    /// had already been restored.
    pub fn is_rolled_back(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::ConflictError(_) | Self::ApplyFailure { .. } => true,
            Self::ProcessTimeout { rolled_back, .. } => *rolled_back,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_command() {
        let err = MigrationError::ProcessTimeout {
            command: "npx drizzle-kit push".to_string(),
            timeout: Duration::from_secs(30),
            rolled_back: false,
        };
        assert_eq!(err.to_string(), "`npx drizzle-kit push` timed out after 30s");
        assert!(!err.is_rolled_back());
    }

    #[test]
    fn test_apply_errors_are_rolled_back() {
        assert!(MigrationError::connection("ECONNREFUSED").is_rolled_back());
        assert!(MigrationError::conflict("merge").is_rolled_back());
        assert!(!MigrationError::generation_conflict("ambiguous").is_rolled_back());
        assert!(!MigrationError::other("x").is_rolled_back());
    }

    #[test]
    fn test_apply_failure_separates_streams() {
        let err = MigrationError::ApplyFailure {
            stderr: "error: near \"x\"".to_string(),
            stdout: "pushing schema...".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to apply migration:\nerror: near \"x\"\npushing schema..."
        );

        let err = MigrationError::ApplyFailure {
            stderr: String::new(),
            stdout: "only stdout\n".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to apply migration:\nonly stdout");
    }
}
