//! `ward migrate` - Generate, review and apply schema migrations.

use tracing::{debug, info};
use ward_migrate::{MigrationEngine, MigrationMode, MigrationOutcome, ProcessRunner};

use crate::cli::MigrateArgs;
use crate::config::Config;
use crate::error::CliResult;
use crate::output::{self, TerminalPrompter, TerminalReporter, success};

/// Run the migrate command
pub async fn run(args: MigrateArgs) -> CliResult<()> {
    output::header("Migrate");

    let root = match &args.project {
        Some(project) => project.clone(),
        None => std::env::current_dir()?,
    };
    let config = Config::load_or_default(&root)?;
    let engine_config = config.to_migration_config(&root, args.database.as_deref());
    let mode = migration_mode(&args);
    info!(root = %root.display(), "loaded project configuration");
    debug!(
        migrations = %engine_config.migrations_dir.display(),
        database = %engine_config.database_path.display(),
        mode = mode_label(mode),
        timeout = ?engine_config.timeout,
        "resolved migration settings"
    );

    output::kv("Project", &root.display().to_string());
    output::kv(
        "Migrations",
        &engine_config.resolve(&engine_config.migrations_dir).display().to_string(),
    );
    output::kv(
        "Database",
        &engine_config.resolve(&engine_config.database_path).display().to_string(),
    );
    output::kv("Mode", mode_label(mode));
    output::newline();

    let runner = ProcessRunner::new(&root).timeout(engine_config.timeout);
    let prompter = TerminalPrompter;
    let reporter = TerminalReporter;

    let mut engine = MigrationEngine::new(engine_config, &runner, &prompter, &reporter);
    let outcome = engine.run(mode).await?;
    debug!(phase = ?engine.phase(), "migration finished");

    output::newline();
    match outcome {
        MigrationOutcome::NoChanges => success("Database schema is up to date"),
        MigrationOutcome::Previewed { changes } => {
            output::info(&format!("{} changes pending", changes.len()));
            output::dim("Run `ward migrate` to apply them.");
        }
        MigrationOutcome::Declined { .. } => output::info("Migration cancelled by user."),
        MigrationOutcome::Applied { .. } => success("Migration complete"),
    }

    Ok(())
}

fn migration_mode(args: &MigrateArgs) -> MigrationMode {
    if args.preview {
        MigrationMode::Preview
    } else if args.production {
        MigrationMode::Production
    } else {
        MigrationMode::Apply
    }
}

fn mode_label(mode: MigrationMode) -> &'static str {
    match mode {
        MigrationMode::Apply => "apply",
        MigrationMode::Preview => "preview",
        MigrationMode::Production => "production",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_mode() {
        let args = MigrateArgs::default();
        assert_eq!(migration_mode(&args), MigrationMode::Apply);

        let args = MigrateArgs {
            preview: true,
            ..Default::default()
        };
        assert_eq!(migration_mode(&args), MigrationMode::Preview);

        let args = MigrateArgs {
            production: true,
            ..Default::default()
        };
        assert_eq!(migration_mode(&args), MigrationMode::Production);
    }
}
