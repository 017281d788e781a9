//src/db/workouts.rs
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::HashMap;
use tracing::{debug, info};

use super::loaders::load_workout_entries;
use super::plans::require_plan;
use super::positions::append_position;
use super::{format_timestamp, parse_opt_timestamp, parse_timestamp, Error};
use crate::models::{PositionOwner, TargetRef, Workout, WorkoutFilters};

struct WorkoutHead {
    id: i64,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    note: Option<String>,
    plan_id: Option<i64>,
}

const HEAD_COLUMNS: &str = "id, created_at, completed_at, note, plan_id";

fn map_head(row: &rusqlite::Row) -> Result<WorkoutHead, rusqlite::Error> {
    let created: String = row.get(1)?;
    Ok(WorkoutHead {
        id: row.get(0)?,
        created_at: parse_timestamp(1, &created)?,
        completed_at: parse_opt_timestamp(2, row.get(2)?)?,
        note: row.get(3)?,
        plan_id: row.get(4)?,
    })
}

fn load_workout(conn: &Connection, head: WorkoutHead) -> Result<Workout, Error> {
    Ok(Workout {
        entries: load_workout_entries(conn, head.id)?,
        id: head.id,
        created_at: head.created_at,
        completed_at: head.completed_at,
        note: head.note,
        plan_id: head.plan_id,
    })
}

// A blank note is stored as no note.
fn normalize_note(note: Option<&str>) -> Option<&str> {
    note.map(str::trim).filter(|n| !n.is_empty())
}

/// Starts an empty workout. Returns its ID.
pub fn create_workout(conn: &Connection, note: Option<&str>, now: DateTime<Utc>) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO workouts (created_at, note) VALUES (?1, ?2)",
        params![format_timestamp(now), normalize_note(note)],
    )
    .map_err(Error::InsertFailed)?;
    let id = conn.last_insert_rowid();
    debug!(id, "Created workout");
    Ok(id)
}

/// Starts a workout pre-filled with the plan's entries and their targets.
pub fn create_workout_from_plan(
    conn: &mut Connection,
    plan_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    let plan = require_plan(&tx, plan_id)?;
    tx.execute(
        "INSERT INTO workouts (created_at, plan_id) VALUES (?1, ?2)",
        params![format_timestamp(now), plan_id],
    )
    .map_err(Error::InsertFailed)?;
    let workout_id = tx.last_insert_rowid();

    for expected in &plan.expected_sets {
        let target = expected.target.target_ref();
        let (entry_id, _) = append_position(&tx, PositionOwner::Workout(workout_id), target)?;
        let (exercise_id, group_id) = target.columns();
        tx.execute(
            "INSERT INTO expected_sets (position_id, exercise_id, group_id, reps, sets, rep_range_top, rpe, rir, note, set_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry_id,
                exercise_id,
                group_id,
                expected.reps,
                expected.sets,
                expected.rep_range_top,
                expected.rpe,
                expected.rir,
                expected.note,
                expected.set_type.to_string(),
            ],
        )
        .map_err(Error::InsertFailed)?;
    }
    tx.commit()?;
    info!(workout_id, plan_id, entries = plan.expected_sets.len(), "Started workout from plan");
    Ok(workout_id)
}

/// Loads a workout with all entries, targets and sets.
pub fn get_workout(conn: &Connection, id: i64) -> Result<Workout, Error> {
    let head = conn
        .query_row(
            &format!("SELECT {HEAD_COLUMNS} FROM workouts WHERE id = ?1"),
            params![id],
            map_head,
        )
        .optional()
        .map_err(Error::QueryFailed)?
        .ok_or(Error::WorkoutNotFound(id))?;
    load_workout(conn, head)
}

pub(crate) fn require_workout(conn: &Connection, id: i64) -> Result<(), Error> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM workouts WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )
        .map_err(Error::QueryFailed)?;
    if exists {
        Ok(())
    } else {
        Err(Error::WorkoutNotFound(id))
    }
}

/// Lists workouts, newest first.
pub fn list_workouts(conn: &Connection, filters: &WorkoutFilters) -> Result<Vec<Workout>, Error> {
    let mut sql = format!("SELECT {HEAD_COLUMNS} FROM workouts WHERE 1=1");
    let mut params_map: HashMap<&str, Box<dyn ToSql>> = HashMap::new();

    match filters.completed {
        Some(true) => sql.push_str(" AND completed_at IS NOT NULL"),
        Some(false) => sql.push_str(" AND completed_at IS NULL"),
        None => {}
    }
    if let Some(plan_id) = filters.plan_id {
        sql.push_str(" AND plan_id = :plan_id");
        params_map.insert(":plan_id", Box::new(plan_id));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = filters.limit {
        sql.push_str(" LIMIT :limit");
        params_map.insert(":limit", Box::new(limit));
    }

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (*k, v.as_ref()))
        .collect();

    let mut stmt = conn.prepare(&sql).map_err(Error::QueryFailed)?;
    let heads = stmt
        .query_map(params_for_query.as_slice(), map_head)
        .map_err(Error::QueryFailed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)?;

    heads.into_iter().map(|h| load_workout(conn, h)).collect()
}

pub fn update_workout_note(conn: &Connection, id: i64, note: Option<&str>) -> Result<(), Error> {
    let rows = conn
        .execute("UPDATE workouts SET note = ?1 WHERE id = ?2", params![normalize_note(note), id])
        .map_err(Error::UpdateFailed)?;
    if rows == 0 {
        return Err(Error::WorkoutNotFound(id));
    }
    Ok(())
}

/// Finishes a workout at `completed_at`, or reopens it when `None`.
pub fn set_workout_completed(
    conn: &Connection,
    id: i64,
    completed_at: Option<DateTime<Utc>>,
) -> Result<(), Error> {
    let rows = conn
        .execute(
            "UPDATE workouts SET completed_at = ?1 WHERE id = ?2",
            params![completed_at.map(format_timestamp), id],
        )
        .map_err(Error::UpdateFailed)?;
    if rows == 0 {
        return Err(Error::WorkoutNotFound(id));
    }
    Ok(())
}

/// Deletes a workout with its entries, expected sets and sets.
pub fn delete_workout(conn: &Connection, id: i64) -> Result<(), Error> {
    let rows = conn
        .execute("DELETE FROM workouts WHERE id = ?1", params![id])
        .map_err(Error::DeleteFailed)?;
    if rows == 0 {
        return Err(Error::WorkoutNotFound(id));
    }
    debug!(id, "Deleted workout");
    Ok(())
}

/// Appends an entry for `target` to the end of the workout. Returns the entry id.
pub fn add_entry(conn: &mut Connection, workout_id: i64, target: TargetRef) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    require_workout(&tx, workout_id)?;
    let (entry_id, position) = append_position(&tx, PositionOwner::Workout(workout_id), target)?;
    tx.commit()?;
    debug!(workout_id, entry_id, position, "Added entry");
    Ok(entry_id)
}
