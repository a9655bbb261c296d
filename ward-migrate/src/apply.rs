//! Applying the change set and rolling back on failure.

use std::time::Duration;

use tracing::{error, info};

use crate::backup::{BackupManager, MigrationBackup};
use crate::command::{CommandResult, CommandRunner, ExternalCommand};
use crate::error::{MigrateResult, MigrationError};
use crate::present::Reporter;

const CONNECTION_MARKERS: &[&str] = &[
    "econnrefused",
    "connection refused",
    "etimedout",
    "timed out",
    "enotfound",
    "host not found",
    "could not connect",
    "unable to open database",
];

const CONFLICT_MARKERS: &[&str] = &["conflict", "merge", "already exists"];

/// Why an external migration command failed, judged from its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The database could not be reached.
    Connection,
    /// Migration history or schema state conflicts.
    Conflict,
    /// Anything else.
    Unknown,
}

impl FailureCause {
    /// Inspect command output for known failure markers.
    pub fn from_output(output: &str) -> Self {
        let output = output.to_lowercase();
        if CONNECTION_MARKERS.iter().any(|m| output.contains(m)) {
            Self::Connection
        } else if CONFLICT_MARKERS.iter().any(|m| output.contains(m)) {
            Self::Conflict
        } else {
            Self::Unknown
        }
    }
}

/// Map a failed apply result to an error.
pub fn apply_error(
    command: &ExternalCommand,
    result: &CommandResult,
    timeout: Duration,
    rolled_back: bool,
) -> MigrationError {
    if result.timed_out {
        return MigrationError::ProcessTimeout {
            command: command.to_string(),
            timeout,
            rolled_back,
        };
    }

    let output = result.combined_output();
    match FailureCause::from_output(&output) {
        FailureCause::Connection => MigrationError::connection(output),
        FailureCause::Conflict => MigrationError::conflict(output),
        FailureCause::Unknown => MigrationError::ApplyFailure {
            stderr: result.stderr.clone(),
            stdout: result.stdout.clone(),
        },
    }
}

/// Runs the apply command and restores the backup if it fails.
///
/// Never retries; a failed apply is surfaced for the operator to re-run.
pub struct ApplyOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
    backups: &'a BackupManager,
    command: &'a ExternalCommand,
    timeout: Duration,
}

impl<'a> ApplyOrchestrator<'a> {
    /// Create an orchestrator for `command`.
    pub fn new(
        runner: &'a dyn CommandRunner,
        backups: &'a BackupManager,
        command: &'a ExternalCommand,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            backups,
            command,
            timeout,
        }
    }

    /// Apply, restoring `backup` on failure.
    ///
    /// On success the backup is left on disk.
    pub async fn apply(
        &self,
        backup: Option<&MigrationBackup>,
        reporter: &dyn Reporter,
    ) -> MigrateResult<()> {
        let result = self.runner.run(self.command).await;
        if result.success {
            info!(command = %self.command, "migration applied");
            return Ok(());
        }

        error!(command = %self.command, timed_out = result.timed_out, "apply failed");

        if let Some(backup) = backup {
            if let Err(restore_err) = self.backups.restore(backup) {
                let cause = apply_error(self.command, &result, self.timeout, false);
                return Err(MigrationError::other(format!(
                    "{} (restoring {} also failed: {})",
                    cause,
                    backup.backup_path.display(),
                    restore_err
                )));
            }
            reporter.warn(&format!(
                "Database restored from backup {}",
                backup.backup_path.display()
            ));
        }

        Err(apply_error(
            self.command,
            &result,
            self.timeout,
            backup.is_some(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_cause() {
        assert_eq!(
            FailureCause::from_output("Error: connect ECONNREFUSED 127.0.0.1:5432"),
            FailureCause::Connection
        );
        assert_eq!(FailureCause::from_output("getaddrinfo ENOTFOUND db"), FailureCause::Connection);
        assert_eq!(
            FailureCause::from_output("Migration conflict detected in journal"),
            FailureCause::Conflict
        );
        assert_eq!(
            FailureCause::from_output("table `users` already exists"),
            FailureCause::Conflict
        );
        assert_eq!(FailureCause::from_output("syntax error near FOO"), FailureCause::Unknown);
    }

    #[test]
    fn test_apply_error_mapping() {
        let cmd = ExternalCommand::new("npx", ["drizzle-kit", "push"]);
        let timeout = Duration::from_secs(30);

        let err = apply_error(&cmd, &CommandResult::failed("connect ECONNREFUSED"), timeout, true);
        assert!(matches!(err, MigrationError::ConnectionError(_)));

        let err = apply_error(&cmd, &CommandResult::failed("merge conflict"), timeout, true);
        assert!(matches!(err, MigrationError::ConflictError(_)));

        let err = apply_error(&cmd, &CommandResult::failed("near \"x\": syntax error"), timeout, true);
        match err {
            MigrationError::ApplyFailure { stderr, .. } => assert!(stderr.contains("syntax error")),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = apply_error(&cmd, &CommandResult::timed_out(&cmd, timeout), timeout, false);
        assert!(matches!(err, MigrationError::ProcessTimeout { rolled_back: false, .. }));
    }
}
