//! SQLite schema: the database handle and the versioned migrations that
//! evolve it.

pub mod db;
pub mod migrations;

pub use db::Database;
pub use migrations::{
    catalog, AppliedMigration, Migration, MigrationReport, MigrationRunner,
};

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a `datetime('now')`-formatted column into a UTC timestamp.
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}
