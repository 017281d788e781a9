//src/db/plans.rs
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::HashMap;
use tracing::debug;

use super::exercises::require_exercise;
use super::groups::require_group;
use super::loaders::load_plan_expected_sets;
use super::positions::{append_position, compact, entry_owner, swap_entry_position};
use super::{format_timestamp, parse_timestamp, Error};
use crate::models::{ExpectedSetUpdate, NewExpectedSet, PositionOwner, TargetRef, WorkoutPlan};

fn plan_head(conn: &Connection, id: i64) -> Result<Option<(DateTime<Utc>, String, String)>, Error> {
    conn.query_row(
        "SELECT created_at, name, note FROM workout_plans WHERE id = ?1",
        params![id],
        |row| {
            let created: String = row.get(0)?;
            Ok((parse_timestamp(0, &created)?, row.get(1)?, row.get(2)?))
        },
    )
    .optional()
    .map_err(Error::QueryFailed)
}

pub fn create_plan(conn: &Connection, name: &str, note: &str, now: DateTime<Utc>) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO workout_plans (created_at, name, note) VALUES (?1, ?2, ?3)",
        params![format_timestamp(now), name.trim(), note],
    )
    .map_err(Error::InsertFailed)?;
    let id = conn.last_insert_rowid();
    debug!(id, name, "Created workout plan");
    Ok(id)
}

pub fn get_plan(conn: &Connection, id: i64) -> Result<Option<WorkoutPlan>, Error> {
    let Some((created_at, name, note)) = plan_head(conn, id)? else {
        return Ok(None);
    };
    Ok(Some(WorkoutPlan {
        id,
        created_at,
        name,
        note,
        expected_sets: load_plan_expected_sets(conn, id)?,
    }))
}

pub fn require_plan(conn: &Connection, id: i64) -> Result<WorkoutPlan, Error> {
    get_plan(conn, id)?.ok_or(Error::PlanNotFound(id))
}

/// All plans, by name.
pub fn list_plans(conn: &Connection) -> Result<Vec<WorkoutPlan>, Error> {
    let mut stmt = conn
        .prepare("SELECT id FROM workout_plans ORDER BY name COLLATE NOCASE, id")
        .map_err(Error::QueryFailed)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(Error::QueryFailed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)?;
    ids.into_iter().map(|id| require_plan(conn, id)).collect()
}

/// Updates the name and/or note of a plan.
pub fn update_plan(conn: &Connection, id: i64, name: Option<&str>, note: Option<&str>) -> Result<(), Error> {
    if plan_head(conn, id)?.is_none() {
        return Err(Error::PlanNotFound(id));
    }
    if let Some(name) = name {
        conn.execute(
            "UPDATE workout_plans SET name = ?1 WHERE id = ?2",
            params![name.trim(), id],
        )
        .map_err(Error::UpdateFailed)?;
    }
    if let Some(note) = note {
        conn.execute(
            "UPDATE workout_plans SET note = ?1 WHERE id = ?2",
            params![note, id],
        )
        .map_err(Error::UpdateFailed)?;
    }
    Ok(())
}

/// Deletes a plan and its expected sets. Workouts started from it are kept.
pub fn delete_plan(conn: &Connection, id: i64) -> Result<(), Error> {
    let rows = conn
        .execute("DELETE FROM workout_plans WHERE id = ?1", params![id])
        .map_err(Error::DeleteFailed)?;
    if rows == 0 {
        return Err(Error::PlanNotFound(id));
    }
    debug!(id, "Deleted workout plan");
    Ok(())
}

fn require_target(conn: &Connection, target: TargetRef) -> Result<(), Error> {
    match target {
        TargetRef::Exercise(id) => require_exercise(conn, id).map(|_| ()),
        TargetRef::Group(id) => require_group(conn, id).map(|_| ()),
    }
}

/// Appends an expected set to the plan. Returns the expected set id.
pub fn add_expected_set(conn: &mut Connection, plan_id: i64, new: &NewExpectedSet) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    if plan_head(&tx, plan_id)?.is_none() {
        return Err(Error::PlanNotFound(plan_id));
    }
    let (position_id, position) = append_position(&tx, PositionOwner::Plan(plan_id), new.target)?;
    let (exercise_id, group_id) = new.target.columns();
    tx.execute(
        "INSERT INTO expected_sets (position_id, exercise_id, group_id, reps, sets, rep_range_top, rpe, rir, note, set_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            position_id,
            exercise_id,
            group_id,
            new.reps,
            new.sets,
            new.rep_range_top,
            new.rpe,
            new.rir,
            new.note,
            new.set_type.to_string(),
        ],
    )
    .map_err(Error::InsertFailed)?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    debug!(plan_id, id, position, "Added expected set");
    Ok(id)
}

/// Position row an expected set hangs off.
fn expected_position_id(conn: &Connection, expected_id: i64) -> Result<i64, Error> {
    conn.query_row(
        "SELECT position_id FROM expected_sets WHERE id = ?1",
        params![expected_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::QueryFailed)?
    .ok_or(Error::ExpectedSetNotFound(expected_id))
}

/// Updates an expected set. In a plan, retargeting also moves the entry to
/// the new target; in a workout only the goal changes.
pub fn update_expected_set(conn: &mut Connection, id: i64, update: &ExpectedSetUpdate) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let position_id = expected_position_id(&tx, id)?;

    let mut params_map: HashMap<&str, Box<dyn ToSql>> = HashMap::new();
    let mut updates = Vec::new();

    if let Some(target) = update.target {
        require_target(&tx, target)?;
        let (exercise_id, group_id) = target.columns();
        updates.push("exercise_id = :exercise_id");
        updates.push("group_id = :group_id");
        params_map.insert(":exercise_id", Box::new(exercise_id));
        params_map.insert(":group_id", Box::new(group_id));

        if let PositionOwner::Plan(_) = entry_owner(&tx, position_id)? {
            tx.execute(
                "UPDATE positions SET exercise_id = ?1, group_id = ?2 WHERE id = ?3",
                params![exercise_id, group_id, position_id],
            )
            .map_err(Error::UpdateFailed)?;
        }
    }
    if let Some(reps) = update.reps {
        updates.push("reps = :reps");
        params_map.insert(":reps", Box::new(reps));
    }
    if let Some(sets) = update.sets {
        updates.push("sets = :sets");
        params_map.insert(":sets", Box::new(sets));
    }
    if let Some(top) = update.rep_range_top {
        updates.push("rep_range_top = :rep_range_top");
        params_map.insert(":rep_range_top", Box::new(top));
    }
    if let Some(rpe) = update.rpe {
        updates.push("rpe = :rpe");
        params_map.insert(":rpe", Box::new(rpe));
    }
    if let Some(rir) = update.rir {
        updates.push("rir = :rir");
        params_map.insert(":rir", Box::new(rir));
    }
    if let Some(note) = &update.note {
        updates.push("note = :note");
        params_map.insert(":note", Box::new(note.clone()));
    }
    if let Some(set_type) = update.set_type {
        updates.push("set_type = :set_type");
        params_map.insert(":set_type", Box::new(set_type.to_string()));
    }

    if !updates.is_empty() {
        let sql = format!("UPDATE expected_sets SET {} WHERE id = :id", updates.join(", "));
        params_map.insert(":id", Box::new(id));
        let params_for_exec: Vec<(&str, &dyn ToSql)> = params_map
            .iter()
            .map(|(k, v)| (*k, v.as_ref()))
            .collect();
        tx.execute(&sql, params_for_exec.as_slice())
            .map_err(Error::UpdateFailed)?;
    }
    tx.commit()?;
    Ok(())
}

/// Removes an expected set. In a plan its entry goes too and later entries
/// move up; in a workout the entry and its sets stay.
pub fn remove_expected_set(conn: &mut Connection, id: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let position_id = expected_position_id(&tx, id)?;
    match entry_owner(&tx, position_id)? {
        owner @ PositionOwner::Plan(_) => {
            tx.execute("DELETE FROM positions WHERE id = ?1", params![position_id])
                .map_err(Error::DeleteFailed)?;
            compact(&tx, owner)?;
        }
        PositionOwner::Workout(_) => {
            tx.execute("DELETE FROM expected_sets WHERE id = ?1", params![id])
                .map_err(Error::DeleteFailed)?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Moves an expected set to `new_position` within its plan.
pub fn swap_expected_set_position(
    conn: &mut Connection,
    plan_id: i64,
    expected_id: i64,
    new_position: u32,
) -> Result<(), Error> {
    let position_id = expected_position_id(conn, expected_id)?;
    swap_entry_position(conn, PositionOwner::Plan(plan_id), position_id, new_position).map_err(|e| match e {
        Error::EntryNotFound(_) => Error::ExpectedSetNotFound(expected_id),
        other => other,
    })
}
