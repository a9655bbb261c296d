//! Rendering of classified changes grouped by risk.

use crate::classify::{ChangeKind, MigrationChange};

/// Sink for user-facing progress and diff output.
///
/// Kept separate from `tracing` diagnostics so that the engine can be driven
/// against a recording reporter in tests.
pub trait Reporter: Send + Sync {
    /// A section title.
    fn section(&self, text: &str);
    /// An indented list entry.
    fn item(&self, text: &str);
    /// An informational line.
    fn info(&self, text: &str);
    /// A warning line.
    fn warn(&self, text: &str);
    /// A success line.
    fn success(&self, text: &str);
    /// A blank line.
    fn newline(&self);
}

/// Changes partitioned by risk, in presentation order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiffSummary<'a> {
    /// Tables being created.
    pub new_tables: Vec<&'a MigrationChange>,
    /// Columns being added.
    pub new_columns: Vec<&'a MigrationChange>,
    /// Non-destructive column modifications.
    pub modified_columns: Vec<&'a MigrationChange>,
    /// Every change that can lose data, regardless of kind.
    pub destructive: Vec<&'a MigrationChange>,
}

impl<'a> DiffSummary<'a> {
    /// Partition `changes` into presentation groups.
    pub fn from_changes(changes: &'a [MigrationChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            if change.destructive {
                summary.destructive.push(change);
                continue;
            }
            match change.kind {
                ChangeKind::CreateTable => summary.new_tables.push(change),
                ChangeKind::AddColumn => summary.new_columns.push(change),
                ChangeKind::ModifyColumn => summary.modified_columns.push(change),
                // Drops are always destructive.
                ChangeKind::DropColumn | ChangeKind::DropTable => summary.destructive.push(change),
            }
        }
        summary
    }

    /// Check whether there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty()
            && self.new_columns.is_empty()
            && self.modified_columns.is_empty()
            && self.destructive.is_empty()
    }
}

/// Data-loss warning for a destructive change.
pub fn data_loss_warning(change: &MigrationChange) -> String {
    match change.kind {
        ChangeKind::DropTable => format!("All rows in table '{}' will be permanently deleted", change.table),
        ChangeKind::DropColumn => format!(
            "All data in column '{}' will be permanently deleted",
            change.target()
        ),
        _ => format!("Existing data in '{}' may be lost or rejected", change.target()),
    }
}

/// Write `changes` to `reporter`: new tables, new columns, modified columns,
/// then destructive changes with a data-loss warning each.
pub fn present(changes: &[MigrationChange], reporter: &dyn Reporter) {
    let summary = DiffSummary::from_changes(changes);
    if summary.is_empty() {
        reporter.info("No schema changes detected.");
        return;
    }

    let groups = [
        ("New tables", &summary.new_tables),
        ("New columns", &summary.new_columns),
        ("Modified columns", &summary.modified_columns),
    ];
    for (title, group) in groups {
        if group.is_empty() {
            continue;
        }
        reporter.section(title);
        for change in group {
            reporter.item(&change.target());
        }
        reporter.newline();
    }

    if !summary.destructive.is_empty() {
        reporter.section("Destructive changes");
        for change in &summary.destructive {
            reporter.item(&change.to_string());
            reporter.warn(&data_loss_warning(change));
        }
        reporter.newline();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Reporter that records every call as `kind: text`.
    #[derive(Default)]
    struct RecordingReporter {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        fn push(&self, kind: &str, text: &str) {
            self.lines.lock().unwrap().push(format!("{}: {}", kind, text));
        }
    }

    impl Reporter for RecordingReporter {
        fn section(&self, text: &str) {
            self.push("section", text);
        }
        fn item(&self, text: &str) {
            self.push("item", text);
        }
        fn info(&self, text: &str) {
            self.push("info", text);
        }
        fn warn(&self, text: &str) {
            self.push("warn", text);
        }
        fn success(&self, text: &str) {
            self.push("success", text);
        }
        fn newline(&self) {}
    }

    #[test]
    fn test_empty_changes() {
        let reporter = RecordingReporter::default();
        present(&[], &reporter);
        assert_eq!(reporter.lines(), vec!["info: No schema changes detected.".to_string()]);
    }

    #[test]
    fn test_groups_in_fixed_order() {
        let changes = classify([
            "DROP TABLE sessions",
            r#"ALTER TABLE "users" ALTER COLUMN "name" SET DEFAULT ''"#,
            "ALTER TABLE users ADD COLUMN bio text",
            "CREATE TABLE posts (id integer)",
            r#"ALTER TABLE "users" ALTER COLUMN "email" SET NOT NULL"#,
        ]);

        let reporter = RecordingReporter::default();
        present(&changes, &reporter);

        assert_eq!(
            reporter.lines(),
            vec![
                "section: New tables",
                "item: posts",
                "section: New columns",
                "item: users.bio",
                "section: Modified columns",
                "item: users.name",
                "section: Destructive changes",
                "item: drop table sessions",
                "warn: All rows in table 'sessions' will be permanently deleted",
                "item: modify column users.email",
                "warn: Existing data in 'users.email' may be lost or rejected",
            ]
        );
    }

    #[test]
    fn test_summary_partition() {
        let changes = classify(["ALTER TABLE t DROP COLUMN c", "CREATE TABLE u (id int)"]);
        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.new_tables.len(), 1);
        assert_eq!(summary.destructive.len(), 1);
        assert!(summary.new_columns.is_empty());
        assert!(summary.modified_columns.is_empty());
    }
}
