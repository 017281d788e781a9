//src/db/mod.rs
//! SQLite persistence. Each submodule owns one aggregate and exposes plain
//! functions over a `rusqlite::Connection`; compound mutations take
//! `&mut Connection` and run inside a transaction.
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::APP_DIR;

pub mod exercises;
pub mod groups;
mod loaders;
pub mod plans;
pub mod positions;
pub mod sets;
pub mod workouts;

const DB_FILE_NAME: &str = "journal.sqlite";
const DATA_ENV_VAR: &str = "GYM_JOURNAL_DATA_DIR";

/// Forward-only schema scripts, applied in order and tracked in `user_version`.
const MIGRATIONS: &[(u32, &str)] = &[
    (1, include_str!("../../migrations/0001_initial.sql")),
    (2, include_str!("../../migrations/0002_positions.sql")),
];

pub const LATEST_SCHEMA_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration to schema version {version} failed: {source}")]
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
    #[error("Exercise name must be unique (case-insensitive): '{0}' already exists.")]
    ExerciseNameNotUnique(String),
    #[error("Group name must be unique (case-insensitive): '{0}' already exists.")]
    GroupNameNotUnique(String),
    #[error("Exercise not found: {0}")]
    ExerciseNotFound(String),
    #[error("Exercise group not found: {0}")]
    GroupNotFound(String),
    #[error("Workout not found: ID {0}")]
    WorkoutNotFound(i64),
    #[error("Workout plan not found: ID {0}")]
    PlanNotFound(i64),
    #[error("Entry not found: ID {0}")]
    EntryNotFound(i64),
    #[error("No entry at position {position} in workout {workout_id}")]
    NoEntryAtPosition { workout_id: i64, position: u32 },
    #[error("Set not found: ID {0}")]
    SetNotFound(i64),
    #[error("Expected set not found: ID {0}")]
    ExpectedSetNotFound(i64),
    #[error("Position {position} is out of range (0..{len})")]
    PositionOutOfRange { position: u32, len: u32 },
    #[error("Entry {entry_id} does not reference {expected}")]
    EntryTargetMismatch { entry_id: i64, expected: String },
    #[error("Exercise '{exercise}' is not part of group '{group}'")]
    ExerciseNotInGroup { exercise: String, group: String },
    #[error("Database connection lock was poisoned")]
    StorePoisoned,
}

impl Error {
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ExerciseNotFound(_)
                | Self::GroupNotFound(_)
                | Self::WorkoutNotFound(_)
                | Self::PlanNotFound(_)
                | Self::EntryNotFound(_)
                | Self::NoEntryAtPosition { .. }
                | Self::SetNotFound(_)
                | Self::ExpectedSetNotFound(_)
        )
    }
}

/// True when `e` is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Gets the path to the SQLite database file within the app's data directory.
pub fn get_db_path() -> Result<PathBuf, Error> {
    let app_dir = match std::env::var(DATA_ENV_VAR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::data_dir().ok_or(Error::DataDir)?.join(APP_DIR),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection with foreign keys enforced.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// Brings the schema up to [`LATEST_SCHEMA_VERSION`].
pub fn init_db(conn: &mut Connection) -> Result<(), Error> {
    migrate_to(conn, LATEST_SCHEMA_VERSION)
}

pub fn schema_version(conn: &Connection) -> Result<u32, Error> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Applies every migration newer than the current `user_version` up to
/// `target`. Foreign keys are switched off while tables are rebuilt and
/// checked before each commit.
pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<(), Error> {
    conn.pragma_update(None, "foreign_keys", false)?;
    let result = apply_migrations(conn, target);
    conn.pragma_update(None, "foreign_keys", true)?;
    result
}

fn apply_migrations(conn: &mut Connection, target: u32) -> Result<(), Error> {
    let current = schema_version(conn)?;
    for &(version, sql) in MIGRATIONS
        .iter()
        .filter(|(v, _)| *v > current && *v <= target)
    {
        info!(version, "Applying schema migration");
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|source| Error::Migration { version, source })?;
        let violations: i64 =
            tx.query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| {
                row.get(0)
            })?;
        if violations > 0 {
            return Err(Error::Migration {
                version,
                source: rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
                    Some(format!("{violations} foreign key violation(s) after migration")),
                ),
            });
        }
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }
    debug!(version = schema_version(conn)?, "Schema up to date");
    Ok(())
}

/// Shared handle to the single connection. Store work runs on blocking
/// threads, so access is serialized through a mutex.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens and migrates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut conn = open_db(path)?;
        init_db(&mut conn)?;
        Ok(Self::new(conn))
    }

    /// A migrated in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        init_db(&mut conn)?;
        Ok(Self::new(conn))
    }

    pub fn with_conn<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<Error>,
    {
        let mut guard = self.conn.lock().map_err(|_| Error::StorePoisoned)?;
        op(&mut guard)
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_opt_timestamp(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(idx, &s)).transpose()
}

pub(crate) fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn join_muscles(muscles: &[String]) -> String {
    muscles
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn split_muscles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_and_sort_lexically() {
        let a = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::milliseconds(1500);
        let (fa, fb) = (format_timestamp(a), format_timestamp(b));
        assert!(fa < fb);
        assert_eq!(parse_timestamp(0, &fb).unwrap(), b);
    }

    #[test]
    fn muscles_are_trimmed_and_compacted() {
        let joined = join_muscles(&[" chest".into(), String::new(), "triceps ".into()]);
        assert_eq!(joined, "chest,triceps");
        assert_eq!(split_muscles(&joined), vec!["chest", "triceps"]);
        assert!(split_muscles("").is_empty());
    }

    #[test]
    fn fresh_database_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_db(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), LATEST_SCHEMA_VERSION);
        // Running again is a no-op.
        init_db(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), LATEST_SCHEMA_VERSION);
    }
}
