//src/transfer.rs
//! CSV export/import and whole-database backup/restore.
//!
//! The CSV is one file with a header row. Each record is one of:
//! - an exercise (`workout_id` and `group` empty, `exercise` set),
//! - a group membership (`workout_id` empty, `group` set, `exercise` optional),
//! - a workout with no entries (`workout_id` set, `exercise` and `group` empty),
//! - a workout entry, optionally carrying one set (`completed` non-empty).
use chrono::{DateTime, Utc};
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, exercises, groups, positions, sets, workouts};
use crate::models::{
    Category, EntryTarget, NewExercise, NewSet, PositionOwner, SetType, TargetRef, Weight, WorkoutFilters,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] db::Error),
    #[error("Malformed record {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(db::Error::Connection(e))
    }
}

/// How much of an import file made it into the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub total: usize,
}

impl ImportReport {
    /// Share of records imported; an empty file counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.imported as f64 / self.total as f64
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
struct CsvRecord {
    workout_id: Option<i64>,
    workout_created_at: Option<String>,
    workout_completed_at: Option<String>,
    workout_note: Option<String>,
    position: Option<u32>,
    exercise: Option<String>,
    group: Option<String>,
    muscles: Option<String>,
    category: Option<Category>,
    equipment: Option<String>,
    thumbnail: Option<String>,
    reps: Option<i64>,
    weight_kg: Option<f64>,
    weight_lb: Option<f64>,
    rir: Option<i64>,
    rpe: Option<f64>,
    completed: Option<bool>,
    completed_at: Option<String>,
    set_type: Option<SetType>,
    set_created_at: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Writes every exercise, group membership and workout set. Returns the
/// number of records written (header excluded).
pub fn export_csv<W: io::Write>(conn: &Connection, writer: W) -> Result<usize, Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut written = 0;

    for exercise in exercises::list_exercises(conn, &Default::default())? {
        wtr.serialize(CsvRecord {
            exercise: Some(exercise.name),
            muscles: Some(exercise.muscles.join(",")),
            category: Some(exercise.category),
            equipment: exercise.equipment,
            thumbnail: exercise.thumbnail,
            ..Default::default()
        })?;
        written += 1;
    }

    for group in groups::list_groups(conn)? {
        if group.exercises.is_empty() {
            wtr.serialize(CsvRecord {
                group: Some(group.name.clone()),
                ..Default::default()
            })?;
            written += 1;
        }
        for member in &group.exercises {
            wtr.serialize(CsvRecord {
                group: Some(group.name.clone()),
                exercise: Some(member.name.clone()),
                ..Default::default()
            })?;
            written += 1;
        }
    }

    let mut all = workouts::list_workouts(conn, &WorkoutFilters::default())?;
    all.reverse();
    for workout in all {
        let head = CsvRecord {
            workout_id: Some(workout.id),
            workout_created_at: Some(db::format_timestamp(workout.created_at)),
            workout_completed_at: workout.completed_at.map(db::format_timestamp),
            workout_note: workout.note.clone(),
            ..Default::default()
        };
        if workout.entries.is_empty() {
            wtr.serialize(&head)?;
            written += 1;
        }
        for entry in &workout.entries {
            let mut row = CsvRecord {
                position: Some(entry.position),
                ..head.clone()
            };
            match &entry.target {
                EntryTarget::Exercise(e) => row.exercise = Some(e.name.clone()),
                EntryTarget::Group(g) => row.group = Some(g.name.clone()),
            }
            if entry.sets.is_empty() {
                wtr.serialize(&row)?;
                written += 1;
            }
            for set in &entry.sets {
                wtr.serialize(CsvRecord {
                    reps: set.reps,
                    weight_kg: set.weight.map(|w| w.kg),
                    weight_lb: set.weight.map(|w| w.lb),
                    rir: set.rir,
                    rpe: set.rpe,
                    completed: Some(set.completed),
                    completed_at: set.completed_at.map(db::format_timestamp),
                    set_type: Some(set.set_type),
                    set_created_at: Some(db::format_timestamp(set.created_at)),
                    ..row.clone()
                })?;
                written += 1;
            }
        }
    }

    wtr.flush()?;
    info!(records = written, "Exported CSV");
    Ok(written)
}

pub fn export_csv_file(conn: &Connection, path: &Path) -> Result<usize, Error> {
    let file = std::fs::File::create(path)?;
    export_csv(conn, io::BufWriter::new(file))
}

#[derive(Default)]
struct ImportState {
    workouts: HashMap<i64, i64>,
    entries: HashMap<(i64, u32), i64>,
}

/// What a successfully applied record added to the id maps.
#[derive(Default)]
struct RowEffect {
    workout: Option<(i64, i64)>,
    entry: Option<((i64, u32), i64)>,
}

fn parse_ts(line: u64, value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::MalformedRow {
            line,
            reason: format!("bad timestamp '{value}': {e}"),
        })
}

fn exercise_id_for(conn: &Connection, record: &CsvRecord, name: &str) -> Result<i64, Error> {
    let new = NewExercise {
        name: name.to_string(),
        muscles: non_empty(&record.muscles)
            .map(|m| m.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default(),
        category: record.category.unwrap_or_default(),
        equipment: non_empty(&record.equipment).map(ToString::to_string),
        thumbnail: non_empty(&record.thumbnail).map(ToString::to_string),
    };
    Ok(exercises::get_or_create_exercise(conn, &new)?.0)
}

fn group_id_for(conn: &Connection, name: &str) -> Result<i64, Error> {
    match groups::get_group_by_name(conn, name)? {
        Some(group) => Ok(group.id),
        None => Ok(groups::insert_group(conn, name, &[])?),
    }
}

fn apply_record(
    conn: &Connection,
    line: u64,
    record: &CsvRecord,
    state: &ImportState,
) -> Result<RowEffect, Error> {
    let exercise = non_empty(&record.exercise);
    let group = non_empty(&record.group);
    let mut effect = RowEffect::default();

    let Some(csv_workout_id) = record.workout_id else {
        match (exercise, group) {
            (Some(name), None) => {
                exercise_id_for(conn, record, name)?;
            }
            (member, Some(group_name)) => {
                let group_id = group_id_for(conn, group_name)?;
                if let Some(name) = member {
                    let exercise_id = exercise_id_for(conn, record, name)?;
                    groups::add_member(conn, group_id, exercise_id)?;
                }
            }
            (None, None) => {
                return Err(Error::MalformedRow {
                    line,
                    reason: "neither exercise nor group given".to_string(),
                })
            }
        }
        return Ok(effect);
    };

    let workout_id = match state.workouts.get(&csv_workout_id) {
        Some(&id) => id,
        None => {
            let created_at = match non_empty(&record.workout_created_at) {
                Some(ts) => parse_ts(line, ts)?,
                None => Utc::now(),
            };
            let id = workouts::create_workout(conn, non_empty(&record.workout_note), created_at)?;
            if let Some(ts) = non_empty(&record.workout_completed_at) {
                workouts::set_workout_completed(conn, id, Some(parse_ts(line, ts)?))?;
            }
            effect.workout = Some((csv_workout_id, id));
            id
        }
    };

    let target = match (exercise, group) {
        (None, None) => return Ok(effect),
        (Some(name), None) => TargetRef::Exercise(exercise_id_for(conn, record, name)?),
        (None, Some(name)) => TargetRef::Group(group_id_for(conn, name)?),
        (Some(_), Some(_)) => {
            return Err(Error::MalformedRow {
                line,
                reason: "workout entry names both an exercise and a group".to_string(),
            })
        }
    };

    let position = record.position.ok_or_else(|| Error::MalformedRow {
        line,
        reason: "workout entry without position".to_string(),
    })?;
    let key = (csv_workout_id, position);
    let entry_id = match state.entries.get(&key) {
        Some(&id) => id,
        None => {
            let (id, _) = positions::append_position(conn, PositionOwner::Workout(workout_id), target)?;
            effect.entry = Some((key, id));
            id
        }
    };

    let Some(completed) = record.completed else {
        return Ok(effect);
    };
    let weight = match (record.weight_kg, record.weight_lb) {
        (Some(kg), Some(lb)) => Some(Weight { lb, kg }),
        (Some(kg), None) => Some(Weight::from_kg(kg)),
        (None, Some(lb)) => Some(Weight::from_lb(lb)),
        (None, None) => None,
    };
    let created_at = match non_empty(&record.set_created_at) {
        Some(ts) => parse_ts(line, ts)?,
        None => Utc::now(),
    };
    let set_id = sets::add_set(
        conn,
        entry_id,
        &NewSet {
            reps: record.reps,
            weight,
            rir: record.rir,
            rpe: record.rpe,
            set_type: record.set_type.unwrap_or_default(),
        },
        created_at,
    )?;
    if completed {
        let completed_at = match non_empty(&record.completed_at) {
            Some(ts) => parse_ts(line, ts)?,
            None => created_at,
        };
        sets::set_completion(conn, set_id, Some(completed_at))?;
    }
    Ok(effect)
}

fn import_records<R: io::Read>(tx: &mut Transaction, reader: R) -> Result<ImportReport, Error> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut state = ImportState::default();
    let mut report = ImportReport { imported: 0, total: 0 };

    for (index, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        report.total += 1;
        // Header is line 1.
        let line = index as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "Skipping unreadable CSV record");
                continue;
            }
        };

        let sp = tx.savepoint()?;
        match apply_record(&sp, line, &record, &state) {
            Ok(effect) => {
                sp.commit()?;
                if let Some((csv_id, id)) = effect.workout {
                    state.workouts.insert(csv_id, id);
                }
                if let Some((key, id)) = effect.entry {
                    state.entries.insert(key, id);
                }
                report.imported += 1;
            }
            Err(e) => {
                // Dropping the savepoint rolls the record back.
                warn!(line, error = %e, "Skipping CSV record");
            }
        }
    }
    Ok(report)
}

/// Imports a CSV produced by [`export_csv`] in one transaction. Records that
/// fail to parse or apply are skipped and counted in the report.
pub fn import_csv<R: io::Read>(conn: &mut Connection, reader: R) -> Result<ImportReport, Error> {
    let mut tx = conn.transaction()?;
    let report = import_records(&mut tx, reader)?;
    tx.commit()?;
    info!(imported = report.imported, total = report.total, "Imported CSV");
    Ok(report)
}

pub fn import_csv_file(conn: &mut Connection, path: &Path) -> Result<ImportReport, Error> {
    let file = std::fs::File::open(path)?;
    import_csv(conn, io::BufReader::new(file))
}

fn log_progress(p: Progress) {
    debug!(remaining = p.remaining, pages = p.pagecount, "Backup progress");
}

/// Copies the live database to `dest` with SQLite's online backup.
pub fn backup(conn: &Connection, dest: &Path) -> Result<(), Error> {
    conn.backup(DatabaseName::Main, dest, Some(log_progress as fn(Progress)))?;
    info!(path = %dest.display(), "Database backed up");
    Ok(())
}

/// Replaces the live database with the snapshot at `src`, then migrates it
/// to the current schema.
pub fn restore(conn: &mut Connection, src: &Path) -> Result<(), Error> {
    if !src.is_file() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("backup file not found: {}", src.display()),
        )));
    }
    conn.restore(DatabaseName::Main, src, Some(log_progress))?;
    db::init_db(conn)?;
    let version = db::schema_version(conn)?;
    info!(path = %src.display(), version, "Database restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_of_empty_import_is_complete() {
        assert_eq!(ImportReport { imported: 0, total: 0 }.fraction(), 1.0);
        assert_eq!(ImportReport { imported: 3, total: 4 }.fraction(), 0.75);
    }
}
