//src/db/sets.rs
use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use super::positions::entry_owner;
use super::{conversion_error, format_timestamp, parse_opt_timestamp, parse_timestamp, Error};
use crate::models::{ExerciseSet, NewSet, PositionOwner, SetType, SetUpdate, Weight};

const SET_COLUMNS: &str = "s.id, s.position_id, s.reps, s.weight_lb, s.weight_kg, s.rir, s.rpe, \
                           s.completed, s.completed_at, s.set_type, s.created_at";

/// A completed set together with the exercise and workout it was logged in.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub workout_id: i64,
    pub workout_created_at: DateTime<Utc>,
    pub set: ExerciseSet,
}

fn map_set_at(row: &Row, offset: usize) -> Result<ExerciseSet, rusqlite::Error> {
    let weight = match (
        row.get::<_, Option<f64>>(offset + 3)?,
        row.get::<_, Option<f64>>(offset + 4)?,
    ) {
        (Some(lb), Some(kg)) => Some(Weight { lb, kg }),
        (Some(lb), None) => Some(Weight::from_lb(lb)),
        (None, Some(kg)) => Some(Weight::from_kg(kg)),
        (None, None) => None,
    };
    let set_type_str: String = row.get(offset + 9)?;
    let created_at_str: String = row.get(offset + 10)?;
    Ok(ExerciseSet {
        id: row.get(offset)?,
        entry_id: row.get(offset + 1)?,
        reps: row.get(offset + 2)?,
        weight,
        rir: row.get(offset + 5)?,
        rpe: row.get(offset + 6)?,
        completed: row.get(offset + 7)?,
        completed_at: parse_opt_timestamp(offset + 8, row.get(offset + 8)?)?,
        set_type: SetType::from_str(&set_type_str).map_err(|e| conversion_error(offset + 9, e))?,
        created_at: parse_timestamp(offset + 10, &created_at_str)?,
    })
}

fn map_row_to_set(row: &Row) -> Result<ExerciseSet, rusqlite::Error> {
    map_set_at(row, 0)
}

/// Sets of one entry in the order they were logged.
pub fn sets_for_entry(conn: &Connection, entry_id: i64) -> Result<Vec<ExerciseSet>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SET_COLUMNS} FROM exercise_sets s WHERE s.position_id = ?1 ORDER BY s.id ASC"
        ))
        .map_err(Error::QueryFailed)?;
    let sets = stmt
        .query_map(params![entry_id], map_row_to_set)
        .map_err(Error::QueryFailed)?;
    sets.collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

/// Logs a set against a workout entry. Plan entries cannot hold sets.
pub fn add_set(conn: &Connection, entry_id: i64, new: &NewSet, now: DateTime<Utc>) -> Result<i64, Error> {
    if !matches!(entry_owner(conn, entry_id)?, PositionOwner::Workout(_)) {
        return Err(Error::EntryNotFound(entry_id));
    }
    conn.execute(
        "INSERT INTO exercise_sets (position_id, reps, weight_lb, weight_kg, rir, rpe, completed, set_type, created_at)
         VALUES (:entry, :reps, :lb, :kg, :rir, :rpe, 0, :set_type, :created_at)",
        named_params! {
            ":entry": entry_id,
            ":reps": new.reps,
            ":lb": new.weight.map(|w| w.lb),
            ":kg": new.weight.map(|w| w.kg),
            ":rir": new.rir,
            ":rpe": new.rpe,
            ":set_type": new.set_type.to_string(),
            ":created_at": format_timestamp(now),
        },
    )
    .map_err(Error::InsertFailed)?;
    let id = conn.last_insert_rowid();
    debug!(id, entry_id, "Added set");
    Ok(id)
}

pub fn get_set(conn: &Connection, id: i64) -> Result<ExerciseSet, Error> {
    conn.query_row(
        &format!("SELECT {SET_COLUMNS} FROM exercise_sets s WHERE s.id = ?1"),
        params![id],
        map_row_to_set,
    )
    .optional()
    .map_err(Error::QueryFailed)?
    .ok_or(Error::SetNotFound(id))
}

/// Updates the given fields of a set. Weight is always written in both units.
pub fn update_set(conn: &Connection, id: i64, update: &SetUpdate) -> Result<(), Error> {
    let mut params_map: HashMap<&str, Box<dyn ToSql>> = HashMap::new();
    let mut updates = Vec::new();

    if let Some(reps) = update.reps {
        updates.push("reps = :reps");
        params_map.insert(":reps", Box::new(reps));
    }
    if let Some(weight) = update.weight {
        updates.push("weight_lb = :lb");
        updates.push("weight_kg = :kg");
        params_map.insert(":lb", Box::new(weight.map(|w| w.lb)));
        params_map.insert(":kg", Box::new(weight.map(|w| w.kg)));
    }
    if let Some(rir) = update.rir {
        updates.push("rir = :rir");
        params_map.insert(":rir", Box::new(rir));
    }
    if let Some(rpe) = update.rpe {
        updates.push("rpe = :rpe");
        params_map.insert(":rpe", Box::new(rpe));
    }
    if let Some(set_type) = update.set_type {
        updates.push("set_type = :set_type");
        params_map.insert(":set_type", Box::new(set_type.to_string()));
    }

    if updates.is_empty() {
        get_set(conn, id)?;
        return Ok(());
    }

    let sql = format!("UPDATE exercise_sets SET {} WHERE id = :id", updates.join(", "));
    params_map.insert(":id", Box::new(id));
    let params_for_exec: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (*k, v.as_ref()))
        .collect();

    let rows = conn
        .execute(&sql, params_for_exec.as_slice())
        .map_err(Error::UpdateFailed)?;
    if rows == 0 {
        return Err(Error::SetNotFound(id));
    }
    Ok(())
}

/// Marks a set complete at `completed_at`, or incomplete when `None`.
pub fn set_completion(
    conn: &Connection,
    id: i64,
    completed_at: Option<DateTime<Utc>>,
) -> Result<(), Error> {
    let rows = conn
        .execute(
            "UPDATE exercise_sets SET completed = ?1, completed_at = ?2 WHERE id = ?3",
            params![completed_at.is_some(), completed_at.map(format_timestamp), id],
        )
        .map_err(Error::UpdateFailed)?;
    if rows == 0 {
        return Err(Error::SetNotFound(id));
    }
    Ok(())
}

pub fn delete_set(conn: &Connection, id: i64) -> Result<(), Error> {
    let rows = conn
        .execute("DELETE FROM exercise_sets WHERE id = ?1", params![id])
        .map_err(Error::DeleteFailed)?;
    if rows == 0 {
        return Err(Error::SetNotFound(id));
    }
    Ok(())
}

const RECORD_SELECT: &str = "SELECT e.id, e.name, w.id, w.created_at, s.id, s.position_id, s.reps, \
     s.weight_lb, s.weight_kg, s.rir, s.rpe, s.completed, s.completed_at, s.set_type, s.created_at
     FROM exercise_sets s
     JOIN positions p ON p.id = s.position_id
     JOIN workouts w ON w.id = p.workout_id
     JOIN exercises e ON e.id = p.exercise_id
     WHERE s.completed = 1";

fn map_record(row: &Row) -> Result<SetRecord, rusqlite::Error> {
    let created: String = row.get(3)?;
    Ok(SetRecord {
        exercise_id: row.get(0)?,
        exercise_name: row.get(1)?,
        workout_id: row.get(2)?,
        workout_created_at: parse_timestamp(3, &created)?,
        set: map_set_at(row, 4)?,
    })
}

fn query_records(
    conn: &Connection,
    filter: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<SetRecord>, Error> {
    let sql = format!("{RECORD_SELECT} {filter} ORDER BY w.created_at ASC, p.position ASC, s.id ASC");
    let mut stmt = conn.prepare(&sql).map_err(Error::QueryFailed)?;
    let rows = stmt
        .query_map(params, map_record)
        .map_err(Error::QueryFailed)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

/// Completed sets logged for one exercise, oldest workout first. Sets
/// recorded while the entry was still a group placeholder are not included.
pub fn completed_sets_for_exercise(conn: &Connection, exercise_id: i64) -> Result<Vec<SetRecord>, Error> {
    query_records(conn, "AND e.id = ?1", &[&exercise_id])
}

/// Completed sets of every exercise completed at or after `since`.
pub fn completed_sets_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<SetRecord>, Error> {
    query_records(conn, "AND s.completed_at >= ?1", &[&format_timestamp(since)])
}
