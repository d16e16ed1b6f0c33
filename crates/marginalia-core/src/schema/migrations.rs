//! Versioned schema migrations.
//!
//! The catalog is an ordered list of [`Migration`] values, applied strictly
//! ascending by version. Each applied version is recorded in the
//! `schema_version` table, which doubles as the audit trail. The runner is
//! invoked once at process start, before the application serves anything;
//! a failed run must keep the process from starting.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::parse_timestamp;

const VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

const MIGRATION_001: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    color TEXT DEFAULT '#ffffff',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users (id)
);
";

const MIGRATION_002_TABLES: &str = "
CREATE TABLE IF NOT EXISTS flags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    color TEXT DEFAULT '#667eea',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS list_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    flag_id INTEGER,
    position INTEGER DEFAULT 0,
    completed BOOLEAN DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (note_id) REFERENCES notes (id) ON DELETE CASCADE,
    FOREIGN KEY (flag_id) REFERENCES flags (id) ON DELETE SET NULL
);
";

/// The full, ordered catalog of released schema versions.
pub fn catalog() -> Vec<Migration> {
    vec![
        Migration::new(1, "initial tables", |conn| {
            conn.execute_batch(MIGRATION_001)?;
            Ok(())
        }),
        Migration::new(2, "rich text content and checklist nodes", |conn| {
            add_column(conn, "notes", "content_html TEXT")?;
            conn.execute_batch(MIGRATION_002_TABLES)?;
            Ok(())
        }),
        // v2 already ships `completed` on fresh databases; this upgrades the
        // ones created before it existed.
        Migration::new(3, "checklist completion state", |conn| {
            add_column(conn, "list_items", "completed BOOLEAN DEFAULT 0")
        }),
        Migration::new(4, "pinned notes", |conn| {
            add_column(conn, "notes", "is_pinned BOOLEAN DEFAULT 0")
        }),
    ]
}

/// `ALTER TABLE .. ADD COLUMN`, treating "duplicate column name" as success.
///
/// A crash between a migration's apply and its record leaves the column in
/// place; the re-run must recognize that instead of wedging the schema.
fn add_column(conn: &Connection, table: &str, column_def: &str) -> Result<()> {
    match conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column_def};")) {
        Ok(()) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(_, Some(ref message)))
            if message.contains("duplicate column name") =>
        {
            log::debug!("column already present on {table}: {column_def}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// One step in the schema's evolution.
///
/// The apply action may batch multiple statements; they execute in issued
/// order on the single connection. It must be safe to re-invoke after a prior
/// partial failure left its structural change in place (see
/// [`MigrationRunner::run_pending`]).
pub struct Migration {
    version: u32,
    description: &'static str,
    apply: Box<dyn Fn(&Connection) -> Result<()>>,
}

impl Migration {
    /// # Panics
    ///
    /// Panics if `version` is zero; version 0 means "nothing applied yet".
    #[must_use]
    pub fn new(
        version: u32,
        description: &'static str,
        apply: impl Fn(&Connection) -> Result<()> + 'static,
    ) -> Self {
        assert!(version > 0, "migration versions start at 1");
        Self {
            version,
            description,
            apply: Box::new(apply),
        }
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A row of the `schema_version` audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// Outcome of a [`MigrationRunner::run_pending`] invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions newly applied by this run, in application order.
    pub applied: Vec<u32>,
    /// Schema version after the run.
    pub current_version: u32,
}

/// Applies pending migrations against a single, exclusively owned connection.
#[derive(Debug)]
pub struct MigrationRunner<'a> {
    conn: &'a Connection,
    migrations: Vec<Migration>,
}

impl<'a> MigrationRunner<'a> {
    /// Runner over the released [`catalog`].
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_catalog(conn, catalog())
    }

    /// Runner over a caller-supplied catalog. The catalog is re-sorted
    /// ascending by version.
    ///
    /// # Panics
    ///
    /// Panics if two entries share a version.
    #[must_use]
    pub fn with_catalog(conn: &'a Connection, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(Migration::version);
        for pair in migrations.windows(2) {
            assert!(
                pair[0].version() != pair[1].version(),
                "duplicate migration version {}",
                pair[0].version()
            );
        }
        Self { conn, migrations }
    }

    /// Register one more migration before the run begins.
    ///
    /// # Panics
    ///
    /// Panics if the version collides with a catalog entry.
    pub fn add_migration(&mut self, migration: Migration) {
        assert!(
            self.migrations
                .iter()
                .all(|m| m.version() != migration.version()),
            "duplicate migration version {}",
            migration.version()
        );
        self.migrations.push(migration);
        self.migrations.sort_by_key(Migration::version);
    }

    /// The full catalog, ascending by version.
    #[must_use]
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Current schema version: `MAX(version)` over the recorded rows, or 0
    /// for a database the runner has never touched (no `schema_version`
    /// table, or no rows).
    ///
    /// Only the missing table maps to 0; any other store failure propagates,
    /// so a transient failure cannot masquerade as a fresh database.
    pub fn current_version(&self) -> Result<u32> {
        if !self.version_table_exists()? {
            return Ok(0);
        }
        let version: Option<u32> =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version.unwrap_or(0))
    }

    /// Catalog versions not yet applied, ascending.
    pub fn pending(&self) -> Result<Vec<u32>> {
        let current = self.current_version()?;
        Ok(self
            .migrations
            .iter()
            .map(Migration::version)
            .filter(|version| *version > current)
            .collect())
    }

    /// The append-only audit trail, ascending by version.
    pub fn history(&self) -> Result<Vec<AppliedMigration>> {
        if !self.version_table_exists()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT version, description, applied_at FROM schema_version ORDER BY version ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let raw: String = row.get(2)?;
                Ok(AppliedMigration {
                    version: row.get(0)?,
                    description: row.get(1)?,
                    applied_at: parse_timestamp(2, &raw)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Bring the database up to the catalog's highest version.
    ///
    /// Pending migrations run strictly sequentially, each recorded in
    /// `schema_version` on success. The first failure aborts the run and
    /// surfaces as [`Error::Migration`] naming the version. The exception is
    /// an "already exists"-shaped structural conflict: that is the footprint
    /// of a crash between apply and record, and is treated as success.
    pub fn run_pending(&self) -> Result<MigrationReport> {
        let current = self.current_version()?;
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version() > current)
            .collect();

        if pending.is_empty() {
            log::info!("schema up to date at version {current}");
            return Ok(MigrationReport {
                applied: Vec::new(),
                current_version: current,
            });
        }

        log::info!(
            "database at version {current}, {} pending migration(s)",
            pending.len()
        );
        self.conn.execute_batch(VERSION_TABLE)?;

        let mut applied = Vec::new();
        for migration in pending {
            log::info!(
                "applying migration v{}: {}",
                migration.version(),
                migration.description()
            );
            match (migration.apply)(self.conn) {
                Ok(()) => {}
                Err(err) if is_benign_conflict(&err) => {
                    log::warn!(
                        "migration v{} found its change already in place: {err}",
                        migration.version()
                    );
                }
                Err(err) => {
                    return Err(Error::Migration {
                        version: migration.version(),
                        source: Box::new(err),
                    });
                }
            }
            self.record(migration.version(), migration.description())
                .map_err(|err| Error::Migration {
                    version: migration.version(),
                    source: Box::new(err),
                })?;
            applied.push(migration.version());
        }

        let current_version = applied.last().copied().unwrap_or(current);
        log::info!("applied {} migration(s), now at version {current_version}", applied.len());
        Ok(MigrationReport {
            applied,
            current_version,
        })
    }

    fn version_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn record(&self, version: u32, description: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_version (version, description) VALUES (?1, ?2)",
            rusqlite::params![version, description],
        )?;
        Ok(())
    }
}

/// `true` when the store reports a structural change that is already in
/// place. A `UNIQUE constraint failed` never matches: constraint violations
/// on data are fatal.
fn is_benign_conflict(err: &Error) -> bool {
    match err {
        Error::Database(rusqlite::Error::SqliteFailure(_, Some(message))) => {
            message.contains("duplicate column name") || message.contains("already exists")
        }
        _ => false,
    }
}
