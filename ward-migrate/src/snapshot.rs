//! Snapshots of generated SQL artifacts and before/after diffing.
//!
//! The generator writes new versioned files rather than editing existing
//! ones, so a changed file is treated as wholly new content to classify
//! instead of computing a line diff.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::MigrateResult;

/// Marker the generator places between statements in one file.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// Relative artifact path to file content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlSnapshot {
    files: BTreeMap<PathBuf, String>,
}

impl SqlSnapshot {
    /// Recursively read every SQL file below `dir`.
    ///
    /// A missing directory yields an empty snapshot.
    pub fn capture(dir: &Path) -> MigrateResult<Self> {
        let mut snapshot = Self::default();
        if dir.is_dir() {
            walk(dir, dir, &mut snapshot.files)?;
        }
        debug!(dir = %dir.display(), files = snapshot.len(), "captured SQL snapshot");
        Ok(snapshot)
    }

    /// Number of files captured.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check whether no files were captured.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Content of the file at `path`, relative to the snapshot root.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    /// Insert a file, replacing any previous content.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Content of every file in `self` that is new or changed relative to
    /// `before`, ordered by path.
    pub fn changed_since(&self, before: &SqlSnapshot) -> Vec<String> {
        self.files
            .iter()
            .filter(|(path, content)| before.files.get(*path) != Some(*content))
            .map(|(_, content)| content.clone())
            .collect()
    }
}

/// Convenience wrapper for [`SqlSnapshot::capture`].
pub fn snapshot(dir: &Path) -> MigrateResult<SqlSnapshot> {
    SqlSnapshot::capture(dir)
}

/// Convenience wrapper for [`SqlSnapshot::changed_since`].
pub fn diff(before: &SqlSnapshot, after: &SqlSnapshot) -> Vec<String> {
    after.changed_since(before)
}

/// Split file content into individual statements.
///
/// Splits on the generator's breakpoint marker and on `;`, drops `--`
/// comment lines and empty fragments.
pub fn split_statements(content: &str) -> Vec<String> {
    content
        .split(STATEMENT_BREAKPOINT)
        .flat_map(|chunk| chunk.split(';'))
        .map(|fragment| {
            fragment
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, String>) -> MigrateResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, files)?;
        } else if is_sql_file(&path) {
            let content = std::fs::read_to_string(&path)?;
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            files.insert(relative, content);
        }
    }
    Ok(())
}
