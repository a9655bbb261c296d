//! Pre-apply database snapshots and restore.
//!
//! Backups are exported through SQLite's own serializer rather than copied
//! from the filesystem, so a write in flight cannot produce a torn copy.
//! Backup files are never deleted here; they stay on disk for inspection.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, DatabaseName, OpenFlags};
use tracing::{debug, info, warn};

use crate::error::MigrateResult;

/// Default directory for backup files, relative to the project root.
pub const DEFAULT_BACKUPS_DIR: &str = "backups";

/// A live database file paired with its timestamped copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationBackup {
    /// The live database file.
    pub source_path: PathBuf,
    /// The snapshot written before applying.
    pub backup_path: PathBuf,
}

/// Creates and restores database backups.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_dir: PathBuf,
}

impl BackupManager {
    /// Create a manager writing into `backups_dir`.
    pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
        }
    }

    /// The directory backups are written to.
    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Snapshot `source` into the backups directory.
    ///
    /// Returns `Ok(None)` when `source` does not exist: there is nothing to
    /// protect and the migration proceeds without a rollback point.
    pub fn backup(&self, source: &Path) -> MigrateResult<Option<MigrationBackup>> {
        if !source.exists() {
            warn!(path = %source.display(), "database file not found, continuing without a backup");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.backups_dir)?;

        let conn = Connection::open_with_flags(
            source,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let image = conn.serialize(DatabaseName::Main)?;

        let backup_path = self.backups_dir.join(backup_file_name(Utc::now()));
        std::fs::write(&backup_path, &*image)?;

        info!(
            source = %source.display(),
            backup = %backup_path.display(),
            bytes = image.len(),
            "database backup written"
        );

        Ok(Some(MigrationBackup {
            source_path: source.to_path_buf(),
            backup_path,
        }))
    }

    /// Overwrite the live database with the backup's bytes.
    ///
    /// Stale `-wal`/`-shm` sidecars are removed so they cannot be replayed
    /// over the restored image.
    pub fn restore(&self, backup: &MigrationBackup) -> MigrateResult<()> {
        let bytes = std::fs::read(&backup.backup_path)?;
        std::fs::write(&backup.source_path, bytes)?;

        for suffix in ["-wal", "-shm"] {
            let mut sidecar = backup.source_path.clone().into_os_string();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                debug!(path = %sidecar.display(), "removing stale sidecar");
                std::fs::remove_file(&sidecar)?;
            }
        }

        info!(
            source = %backup.source_path.display(),
            backup = %backup.backup_path.display(),
            "database restored from backup"
        );
        Ok(())
    }
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUPS_DIR)
    }
}

/// `db-<ISO 8601 timestamp with ':' replaced by '-'>.sqlite`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "db-{}.sqlite",
        at.to_rfc3339_opts(SecondsFormat::Millis, true).replace(':', "-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seed_database(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (id INTEGER PRIMARY KEY, token TEXT NOT NULL);
             INSERT INTO sessions (token) VALUES ('a'), ('b'), ('c');",
        )
        .unwrap();
    }

    #[test]
    fn test_backup_file_name() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap();
        assert_eq!(backup_file_name(at), "db-2026-10-18T09-05-07.000Z.sqlite");
    }

    #[test]
    fn test_missing_source_yields_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));

        let backup = manager.backup(&dir.path().join("missing.db")).unwrap();
        assert!(backup.is_none());
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn test_backup_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local.db");
        seed_database(&source);

        let manager = BackupManager::new(dir.path().join("backups"));
        let backup = manager.backup(&source).unwrap().unwrap();

        assert_eq!(backup.source_path, source);
        assert!(backup.backup_path.starts_with(dir.path().join("backups")));
        let name = backup.backup_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("db-") && name.ends_with(".sqlite"));
        assert!(!name.contains(':'));

        let copy = Connection::open(&backup.backup_path).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_restore_is_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local.db");
        seed_database(&source);
        let original = std::fs::read(&source).unwrap();

        let manager = BackupManager::new(dir.path().join("backups"));
        let backup = manager.backup(&source).unwrap().unwrap();

        {
            let conn = Connection::open(&source).unwrap();
            conn.execute_batch("DROP TABLE sessions; CREATE TABLE other (x TEXT);")
                .unwrap();
        }
        assert_ne!(std::fs::read(&source).unwrap(), original);

        manager.restore(&backup).unwrap();
        assert_eq!(std::fs::read(&source).unwrap(), original);

        // Restoring again leaves the same bytes.
        manager.restore(&backup).unwrap();
        assert_eq!(std::fs::read(&source).unwrap(), original);
    }

    #[test]
    fn test_non_database_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local.db");
        std::fs::write(&source, b"definitely not sqlite, just some plain bytes here").unwrap();

        let manager = BackupManager::new(dir.path().join("backups"));
        assert!(manager.backup(&source).is_err());
    }

    #[test]
    fn test_restore_removes_stale_wal_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local.db");
        {
            let conn = Connection::open(&source).unwrap();
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
                .unwrap();
        }
        seed_database(&source);

        let manager = BackupManager::new(dir.path().join("backups"));
        let backup = manager.backup(&source).unwrap().unwrap();

        let wal = dir.path().join("local.db-wal");
        let shm = dir.path().join("local.db-shm");
        let stale = dir.path().join("stale");
        std::fs::create_dir_all(&stale).unwrap();
        {
            let conn = Connection::open(&source).unwrap();
            conn.execute_batch(
                "PRAGMA wal_autocheckpoint=0;
                 INSERT INTO sessions (token) VALUES ('d'), ('e');",
            )
            .unwrap();
            assert!(wal.exists());
            std::fs::copy(&wal, stale.join("wal")).unwrap();
            std::fs::copy(&shm, stale.join("shm")).unwrap();
        }
        // Leave the uncheckpointed log behind as if the writer had crashed.
        std::fs::copy(stale.join("wal"), &wal).unwrap();
        std::fs::copy(stale.join("shm"), &shm).unwrap();

        manager.restore(&backup).unwrap();

        assert!(!wal.exists());
        assert!(!shm.exists());
        let conn = Connection::open(&source).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
