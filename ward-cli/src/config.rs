//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ward_migrate::backup::DEFAULT_BACKUPS_DIR;
use ward_migrate::engine::{DEFAULT_DATABASE_PATH, DEFAULT_MIGRATIONS_DIR};
use ward_migrate::gate::DEFAULT_CONFIRMATION_PHRASE;
use ward_migrate::{ExternalCommand, MigrationConfig};

use crate::error::CliResult;

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "ward.toml";

/// Ward CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationsConfig,

    /// Command that generates migrations
    pub generator: CommandConfig,

    /// Command that applies migrations
    pub apply: CommandConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.fill_command_defaults();
        Ok(config)
    }

    /// Load `ward.toml` from `root`, or defaults if there is none
    pub fn load_or_default(root: &Path) -> CliResult<Self> {
        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();
            config.fill_command_defaults();
            Ok(config)
        }
    }

    /// Build the engine configuration for a project rooted at `root`.
    ///
    /// `database` overrides the configured database path.
    pub fn to_migration_config(&self, root: &Path, database: Option<&Path>) -> MigrationConfig {
        let database_path = database
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.database.path.clone());

        MigrationConfig::new()
            .project_root(root)
            .migrations_dir(&self.migrations.directory)
            .backups_dir(&self.migrations.backups_dir)
            .database_path(database_path)
            .generate_command(self.generator.to_command())
            .apply_command(self.apply.to_command())
            .timeout(Duration::from_secs(self.migrations.timeout_secs))
            .confirmation_phrase(self.migrations.confirmation_phrase.clone())
    }

    fn fill_command_defaults(&mut self) {
        if self.generator.program.is_empty() {
            self.generator = CommandConfig::drizzle("generate");
        }
        if self.apply.program.is_empty() {
            self.apply = CommandConfig::drizzle("push");
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the live database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// Migration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory the generator writes SQL into
    pub directory: PathBuf,

    /// Directory for database backups
    pub backups_dir: PathBuf,

    /// Timeout for each external command, in seconds
    pub timeout_secs: u64,

    /// Phrase required to apply destructive changes
    pub confirmation_phrase: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            backups_dir: PathBuf::from(DEFAULT_BACKUPS_DIR),
            timeout_secs: 30,
            confirmation_phrase: DEFAULT_CONFIRMATION_PHRASE.to_string(),
        }
    }
}

/// An external command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Program to run
    pub program: String,

    /// Arguments to pass
    pub args: Vec<String>,
}

impl CommandConfig {
    fn drizzle(subcommand: &str) -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["drizzle-kit".to_string(), subcommand.to_string()],
        }
    }

    /// Convert to an engine command
    pub fn to_command(&self) -> ExternalCommand {
        ExternalCommand::new(self.program.clone(), self.args.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();

        let engine = config.to_migration_config(dir.path(), None);
        assert_eq!(engine.generate_command.to_string(), "npx drizzle-kit generate");
        assert_eq!(engine.apply_command.to_string(), "npx drizzle-kit push");
        assert_eq!(engine.resolve(&engine.database_path), dir.path().join("local.db"));
        assert_eq!(engine.timeout, Duration::from_secs(30));
        assert_eq!(engine.confirmation_phrase, "delete data");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[database]
path = "data/app.sqlite"

[migrations]
timeout_secs = 5

[apply]
program = "./apply.sh"
"#,
        )
        .unwrap();

        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.database.path, PathBuf::from("data/app.sqlite"));
        assert_eq!(config.migrations.timeout_secs, 5);
        assert_eq!(config.migrations.directory, PathBuf::from("drizzle"));
        assert_eq!(config.apply.to_command().to_string(), "./apply.sh");
        assert_eq!(config.generator.to_command().to_string(), "npx drizzle-kit generate");
    }

    #[test]
    fn test_database_override_wins() {
        let config = Config::default();
        let engine = config.to_migration_config(Path::new("/app"), Some(Path::new("/tmp/other.db")));
        assert_eq!(engine.database_path, PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[database\npath = ").unwrap();
        let err = Config::load_or_default(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
