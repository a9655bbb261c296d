//! Migration engine: generate, diff, classify, gate, apply.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::apply::{ApplyOrchestrator, FailureCause};
use crate::backup::{BackupManager, DEFAULT_BACKUPS_DIR, MigrationBackup};
use crate::classify::{MigrationChange, PatternClassifier, StatementClassifier};
use crate::command::{CommandResult, CommandRunner, DEFAULT_TIMEOUT, ExternalCommand};
use crate::error::{MigrateResult, MigrationError};
use crate::gate::{ConfirmationGate, DEFAULT_CONFIRMATION_PHRASE, Prompter, requires_confirmation};
use crate::present::{Reporter, present};
use crate::snapshot::{SqlSnapshot, split_statements};

/// Default directory of generated SQL artifacts, relative to the project root.
pub const DEFAULT_MIGRATIONS_DIR: &str = "drizzle";

/// Default live database file, relative to the project root.
pub const DEFAULT_DATABASE_PATH: &str = "local.db";

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Project root; relative paths below are resolved against it.
    pub project_root: PathBuf,
    /// Directory the generator writes SQL artifacts into.
    pub migrations_dir: PathBuf,
    /// Directory backups are written to.
    pub backups_dir: PathBuf,
    /// The live database file.
    pub database_path: PathBuf,
    /// Command that generates pending migrations.
    pub generate_command: ExternalCommand,
    /// Command that applies them.
    pub apply_command: ExternalCommand,
    /// Deadline for each external command.
    pub timeout: Duration,
    /// Phrase required to apply destructive changes.
    pub confirmation_phrase: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            backups_dir: PathBuf::from(DEFAULT_BACKUPS_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            generate_command: ExternalCommand::new("npx", ["drizzle-kit", "generate"]),
            apply_command: ExternalCommand::new("npx", ["drizzle-kit", "push"]),
            timeout: DEFAULT_TIMEOUT,
            confirmation_phrase: DEFAULT_CONFIRMATION_PHRASE.to_string(),
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project root.
    pub fn project_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_root = dir.into();
        self
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the backups directory.
    pub fn backups_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backups_dir = dir.into();
        self
    }

    /// Set the live database file.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the generate command.
    pub fn generate_command(mut self, command: ExternalCommand) -> Self {
        self.generate_command = command;
        self
    }

    /// Set the apply command.
    pub fn apply_command(mut self, command: ExternalCommand) -> Self {
        self.apply_command = command;
        self
    }

    /// Set the external command timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the destructive confirmation phrase.
    pub fn confirmation_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.confirmation_phrase = phrase.into();
        self
    }

    /// Resolve `path` against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// How far a run may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Generate, diff and apply.
    #[default]
    Apply,
    /// Generate and diff only.
    Preview,
    /// Apply behind an extra yes/no confirmation.
    Production,
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Not started.
    Idle,
    /// Generator running.
    Generating,
    /// Comparing SQL snapshots.
    Diffing,
    /// Changes classified and presented.
    Classified,
    /// Backup attempted ahead of a destructive apply.
    BackupTaken,
    /// Waiting on the operator.
    Confirming,
    /// Operator agreed.
    Confirmed,
    /// Operator declined; terminal.
    Declined,
    /// Apply command running.
    Applying,
    /// Apply succeeded; terminal.
    Applied,
    /// Apply failed and the backup was restored; terminal.
    RolledBack,
}

/// How a run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Generation produced no recognized changes.
    NoChanges,
    /// Changes were shown but not applied.
    Previewed {
        /// Classified changes.
        changes: Vec<MigrationChange>,
    },
    /// The operator declined; nothing was applied.
    Declined {
        /// Classified changes.
        changes: Vec<MigrationChange>,
        /// Backup taken before asking, kept for inspection.
        backup: Option<MigrationBackup>,
    },
    /// Changes were applied.
    Applied {
        /// Classified changes.
        changes: Vec<MigrationChange>,
        /// Backup taken before applying, left on disk.
        backup: Option<MigrationBackup>,
    },
}

impl MigrationOutcome {
    /// Classified changes of the run.
    pub fn changes(&self) -> &[MigrationChange] {
        match self {
            Self::NoChanges => &[],
            Self::Previewed { changes }
            | Self::Declined { changes, .. }
            | Self::Applied { changes, .. } => changes,
        }
    }

    /// Backup taken during the run, if any.
    pub fn backup(&self) -> Option<&MigrationBackup> {
        match self {
            Self::Declined { backup, .. } | Self::Applied { backup, .. } => backup.as_ref(),
            _ => None,
        }
    }
}

/// Drives one migration run.
pub struct MigrationEngine<'a, C = PatternClassifier> {
    config: MigrationConfig,
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
    reporter: &'a dyn Reporter,
    classifier: C,
    backups: BackupManager,
    gate: ConfirmationGate,
    phase: MigrationPhase,
}

impl<'a> MigrationEngine<'a, PatternClassifier> {
    /// Create an engine with the default statement classifier.
    pub fn new(
        config: MigrationConfig,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self::with_classifier(config, runner, prompter, reporter, PatternClassifier::new())
    }
}

impl<'a, C: StatementClassifier> MigrationEngine<'a, C> {
    /// Create an engine with a custom statement classifier.
    pub fn with_classifier(
        config: MigrationConfig,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
        reporter: &'a dyn Reporter,
        classifier: C,
    ) -> Self {
        let backups = BackupManager::new(config.resolve(&config.backups_dir));
        let gate = ConfirmationGate::new(config.confirmation_phrase.clone());
        Self {
            config,
            runner,
            prompter,
            reporter,
            classifier,
            backups,
            gate,
            phase: MigrationPhase::Idle,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The phase the last run reached.
    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// Run generate, diff, classify and, unless previewing, apply.
    pub async fn run(&mut self, mode: MigrationMode) -> MigrateResult<MigrationOutcome> {
        let migrations_dir = self.config.resolve(&self.config.migrations_dir);

        self.transition(MigrationPhase::Generating);
        let before = SqlSnapshot::capture(&migrations_dir)?;
        let generated = self.runner.run(&self.config.generate_command).await;
        self.check_generation(&generated)?;

        self.transition(MigrationPhase::Diffing);
        let after = SqlSnapshot::capture(&migrations_dir)?;
        let statements: Vec<String> = after
            .changed_since(&before)
            .iter()
            .flat_map(|content| split_statements(content))
            .collect();
        debug!(statements = statements.len(), "collected generated statements");

        let changes = self.classifier.classify_all(&statements);
        self.transition(MigrationPhase::Classified);
        present(&changes, self.reporter);

        if changes.is_empty() {
            return Ok(MigrationOutcome::NoChanges);
        }

        if mode == MigrationMode::Preview {
            self.reporter
                .info("Preview mode: changes were generated but not applied.");
            return Ok(MigrationOutcome::Previewed { changes });
        }

        let destructive = requires_confirmation(&changes);
        let backup = if destructive {
            let backup = self.take_backup()?;
            self.transition(MigrationPhase::BackupTaken);
            backup
        } else {
            None
        };

        if mode == MigrationMode::Production || destructive {
            self.transition(MigrationPhase::Confirming);
        }

        if mode == MigrationMode::Production
            && !self.gate.confirm_production(self.prompter).is_confirmed()
        {
            return Ok(self.decline(changes, backup));
        }

        if destructive && !self.gate.confirm_destructive(self.prompter).is_confirmed() {
            return Ok(self.decline(changes, backup));
        }

        if mode == MigrationMode::Production || destructive {
            self.transition(MigrationPhase::Confirmed);
        }

        self.transition(MigrationPhase::Applying);
        let orchestrator = ApplyOrchestrator::new(
            self.runner,
            &self.backups,
            &self.config.apply_command,
            self.config.timeout,
        );
        let applied = orchestrator.apply(backup.as_ref(), self.reporter).await;
        if let Err(e) = applied {
            let phase = if backup.is_some() {
                MigrationPhase::RolledBack
            } else {
                MigrationPhase::Applying
            };
            self.transition(phase);
            return Err(e);
        }

        self.transition(MigrationPhase::Applied);
        self.reporter.success(&format!("Applied {} schema changes", changes.len()));
        if let Some(backup) = &backup {
            self.reporter
                .info(&format!("Backup kept at {}", backup.backup_path.display()));
        }

        Ok(MigrationOutcome::Applied { changes, backup })
    }

    fn check_generation(&self, result: &CommandResult) -> MigrateResult<()> {
        if result.success {
            return Ok(());
        }
        if result.timed_out {
            return Err(MigrationError::ProcessTimeout {
                command: self.config.generate_command.to_string(),
                timeout: self.config.timeout,
                rolled_back: false,
            });
        }

        let output = result.combined_output();
        if FailureCause::from_output(&output) == FailureCause::Conflict {
            Err(MigrationError::generation_conflict(output))
        } else {
            Err(MigrationError::generation_failed(output))
        }
    }

    fn take_backup(&self) -> MigrateResult<Option<MigrationBackup>> {
        let source = self.config.resolve(&self.config.database_path);
        let backup = self.backups.backup(&source)?;
        match &backup {
            Some(backup) => self
                .reporter
                .info(&format!("Backup written to {}", backup.backup_path.display())),
            None => self.reporter.warn(&format!(
                "No database found at {}, continuing without a backup",
                source.display()
            )),
        }
        Ok(backup)
    }

    fn decline(
        &mut self,
        changes: Vec<MigrationChange>,
        backup: Option<MigrationBackup>,
    ) -> MigrationOutcome {
        self.transition(MigrationPhase::Declined);
        self.reporter.warn("Migration cancelled, nothing was applied.");
        if let Some(backup) = &backup {
            self.reporter
                .info(&format!("Backup kept at {}", backup.backup_path.display()));
        }
        MigrationOutcome::Declined { changes, backup }
    }

    fn transition(&mut self, phase: MigrationPhase) {
        debug!(from = ?self.phase, to = ?phase, "migration phase");
        if phase == MigrationPhase::Applied || phase == MigrationPhase::RolledBack {
            info!(phase = ?phase, "migration finished");
        }
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .project_root("/srv/app")
            .migrations_dir("db/migrations")
            .database_path("/var/data/app.db")
            .timeout(Duration::from_secs(5))
            .confirmation_phrase("yes really");

        assert_eq!(config.resolve(&config.migrations_dir), PathBuf::from("/srv/app/db/migrations"));
        assert_eq!(config.resolve(&config.database_path), PathBuf::from("/var/data/app.db"));
        assert_eq!(config.resolve(&config.backups_dir), PathBuf::from("/srv/app/backups"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.confirmation_phrase, "yes really");
    }

    #[test]
    fn test_default_commands() {
        let config = MigrationConfig::default();
        assert_eq!(config.generate_command.to_string(), "npx drizzle-kit generate");
        assert_eq!(config.apply_command.to_string(), "npx drizzle-kit push");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_outcome_accessors() {
        assert!(MigrationOutcome::NoChanges.changes().is_empty());
        assert!(MigrationOutcome::NoChanges.backup().is_none());
    }
}
