//src/db/loaders.rs
// Assembles nested domain values (entries, expected sets) from position rows.
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use super::exercises::require_exercise;
use super::groups::require_group;
use super::sets::sets_for_entry;
use super::{conversion_error, Error};
use crate::models::{EntryTarget, ExpectedSet, SetType, WorkoutEntry};

struct PositionRow {
    id: i64,
    position: u32,
    exercise_id: Option<i64>,
    group_id: Option<i64>,
}

pub(crate) fn load_target(
    conn: &Connection,
    exercise_id: Option<i64>,
    group_id: Option<i64>,
) -> Result<EntryTarget, Error> {
    match (exercise_id, group_id) {
        (Some(id), None) => Ok(EntryTarget::Exercise(require_exercise(conn, id)?)),
        (None, Some(id)) => Ok(EntryTarget::Group(require_group(conn, id)?)),
        // The CHECK constraint rules this out; treat it as a corrupt row.
        _ => Err(Error::QueryFailed(rusqlite::Error::InvalidColumnType(
            0,
            "exercise_id/group_id".to_string(),
            rusqlite::types::Type::Null,
        ))),
    }
}

struct ExpectedRow {
    id: i64,
    exercise_id: Option<i64>,
    group_id: Option<i64>,
    reps: Option<i64>,
    sets: Option<i64>,
    rep_range_top: Option<i64>,
    rpe: Option<f64>,
    rir: Option<i64>,
    note: Option<String>,
    set_type: SetType,
}

fn map_expected_row(row: &Row) -> Result<ExpectedRow, rusqlite::Error> {
    let set_type_str: String = row.get(9)?;
    Ok(ExpectedRow {
        id: row.get(0)?,
        exercise_id: row.get(1)?,
        group_id: row.get(2)?,
        reps: row.get(3)?,
        sets: row.get(4)?,
        rep_range_top: row.get(5)?,
        rpe: row.get(6)?,
        rir: row.get(7)?,
        note: row.get(8)?,
        set_type: SetType::from_str(&set_type_str).map_err(|e| conversion_error(9, e))?,
    })
}

pub(crate) fn load_expected(
    conn: &Connection,
    position_id: i64,
    position: u32,
) -> Result<Option<ExpectedSet>, Error> {
    let row = conn
        .query_row(
            "SELECT id, exercise_id, group_id, reps, sets, rep_range_top, rpe, rir, note, set_type
             FROM expected_sets WHERE position_id = ?1",
            params![position_id],
            map_expected_row,
        )
        .optional()
        .map_err(Error::QueryFailed)?;

    row.map(|r| {
        Ok(ExpectedSet {
            id: r.id,
            position,
            target: load_target(conn, r.exercise_id, r.group_id)?,
            reps: r.reps,
            sets: r.sets,
            rep_range_top: r.rep_range_top,
            rpe: r.rpe,
            rir: r.rir,
            note: r.note,
            set_type: r.set_type,
        })
    })
    .transpose()
}

fn position_rows(conn: &Connection, column: &str, owner_id: i64) -> Result<Vec<PositionRow>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, position, exercise_id, group_id FROM positions
             WHERE {column} = ?1 ORDER BY position ASC"
        ))
        .map_err(Error::QueryFailed)?;
    let rows = stmt
        .query_map(params![owner_id], |row| {
            Ok(PositionRow {
                id: row.get(0)?,
                position: row.get(1)?,
                exercise_id: row.get(2)?,
                group_id: row.get(3)?,
            })
        })
        .map_err(Error::QueryFailed)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

pub(crate) fn load_workout_entries(
    conn: &Connection,
    workout_id: i64,
) -> Result<Vec<WorkoutEntry>, Error> {
    position_rows(conn, "workout_id", workout_id)?
        .into_iter()
        .map(|p| {
            Ok(WorkoutEntry {
                id: p.id,
                position: p.position,
                target: load_target(conn, p.exercise_id, p.group_id)?,
                expected: load_expected(conn, p.id, p.position)?,
                sets: sets_for_entry(conn, p.id)?,
            })
        })
        .collect()
}

pub(crate) fn load_plan_expected_sets(
    conn: &Connection,
    plan_id: i64,
) -> Result<Vec<ExpectedSet>, Error> {
    let mut expected = Vec::new();
    for p in position_rows(conn, "plan_id", plan_id)? {
        if let Some(set) = load_expected(conn, p.id, p.position)? {
            expected.push(set);
        }
    }
    Ok(expected)
}
