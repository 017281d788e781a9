//src/db/positions.rs
//! Ordering of entries within a workout or plan, and exchanging an entry's
//! group placeholder for a concrete exercise (and back).
//!
//! Positions for one owner are always `0..n` with no gaps. Every function
//! that inserts, removes or moves a row leaves that invariant intact.
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::exercises::require_exercise;
use super::groups::{get_group_by_name, groups_containing, insert_group, require_group};
use super::Error;
use crate::models::{PositionOwner, TargetRef};

const fn owner_column(owner: PositionOwner) -> (&'static str, i64) {
    match owner {
        PositionOwner::Workout(id) => ("workout_id", id),
        PositionOwner::Plan(id) => ("plan_id", id),
    }
}

/// Entry ids of `owner` in position order.
pub fn ordered_entry_ids(conn: &Connection, owner: PositionOwner) -> Result<Vec<i64>, Error> {
    let (column, owner_id) = owner_column(owner);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id FROM positions WHERE {column} = ?1 ORDER BY position ASC"
        ))
        .map_err(Error::QueryFailed)?;
    let ids = stmt
        .query_map(params![owner_id], |row| row.get(0))
        .map_err(Error::QueryFailed)?;
    ids.collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

/// Looks up which workout or plan an entry belongs to.
pub fn entry_owner(conn: &Connection, entry_id: i64) -> Result<PositionOwner, Error> {
    let row: Option<(Option<i64>, Option<i64>)> = conn
        .query_row(
            "SELECT workout_id, plan_id FROM positions WHERE id = ?1",
            params![entry_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(Error::QueryFailed)?;
    match row {
        Some((Some(workout_id), None)) => Ok(PositionOwner::Workout(workout_id)),
        Some((None, Some(plan_id))) => Ok(PositionOwner::Plan(plan_id)),
        _ => Err(Error::EntryNotFound(entry_id)),
    }
}

/// Current target of an entry as stored.
pub(crate) fn entry_target(conn: &Connection, entry_id: i64) -> Result<TargetRef, Error> {
    let row: Option<(Option<i64>, Option<i64>)> = conn
        .query_row(
            "SELECT exercise_id, group_id FROM positions WHERE id = ?1",
            params![entry_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(Error::QueryFailed)?;
    match row {
        Some((Some(exercise_id), None)) => Ok(TargetRef::Exercise(exercise_id)),
        Some((None, Some(group_id))) => Ok(TargetRef::Group(group_id)),
        _ => Err(Error::EntryNotFound(entry_id)),
    }
}

/// Appends a position at the end of `owner`'s list. Returns `(id, position)`.
pub(crate) fn append_position(
    conn: &Connection,
    owner: PositionOwner,
    target: TargetRef,
) -> Result<(i64, u32), Error> {
    match target {
        TargetRef::Exercise(id) => {
            require_exercise(conn, id)?;
        }
        TargetRef::Group(id) => {
            require_group(conn, id)?;
        }
    }
    let (column, owner_id) = owner_column(owner);
    let next: u32 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM positions WHERE {column} = ?1"),
            params![owner_id],
            |row| row.get(0),
        )
        .map_err(Error::QueryFailed)?;
    let (exercise_id, group_id) = target.columns();
    conn.execute(
        &format!(
            "INSERT INTO positions ({column}, position, exercise_id, group_id) VALUES (?1, ?2, ?3, ?4)"
        ),
        params![owner_id, next, exercise_id, group_id],
    )
    .map_err(Error::InsertFailed)?;
    Ok((conn.last_insert_rowid(), next))
}

/// Slots at and above this value are never visible outside [`renumber`].
const PARKING_BASE: i64 = 1 << 32;

/// Writes positions `0..ids.len()` in the given order.
///
/// Rows are first parked above [`PARKING_BASE`] so the UNIQUE(owner, position)
/// constraint never sees two rows on the same slot mid-update.
pub(crate) fn renumber(conn: &Connection, ordered_ids: &[i64]) -> Result<(), Error> {
    let mut set_position = conn
        .prepare("UPDATE positions SET position = ?1 WHERE id = ?2")
        .map_err(Error::UpdateFailed)?;
    for (slot, id) in ordered_ids.iter().enumerate() {
        set_position
            .execute(params![PARKING_BASE + slot as i64, id])
            .map_err(Error::UpdateFailed)?;
    }
    for (slot, id) in ordered_ids.iter().enumerate() {
        set_position
            .execute(params![slot as i64, id])
            .map_err(Error::UpdateFailed)?;
    }
    Ok(())
}

/// Closes any gaps left after rows were removed from `owner`.
pub(crate) fn compact(conn: &Connection, owner: PositionOwner) -> Result<(), Error> {
    let ids = ordered_entry_ids(conn, owner)?;
    renumber(conn, &ids)
}

/// Owners that have at least one position pointing at `target`.
pub(crate) fn owners_referencing(
    conn: &Connection,
    target: TargetRef,
) -> Result<Vec<PositionOwner>, Error> {
    let (column, id) = match target {
        TargetRef::Exercise(id) => ("exercise_id", id),
        TargetRef::Group(id) => ("group_id", id),
    };
    let mut stmt = conn
        .prepare(&format!(
            "SELECT DISTINCT workout_id, plan_id FROM positions WHERE {column} = ?1"
        ))
        .map_err(Error::QueryFailed)?;
    let rows = stmt
        .query_map(params![id], |row| {
            Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<i64>>(1)?))
        })
        .map_err(Error::QueryFailed)?;

    let mut owners = Vec::new();
    for row in rows {
        match row.map_err(Error::QueryFailed)? {
            (Some(workout_id), _) => owners.push(PositionOwner::Workout(workout_id)),
            (None, Some(plan_id)) => owners.push(PositionOwner::Plan(plan_id)),
            (None, None) => {}
        }
    }
    Ok(owners)
}

/// Moves `entry_id` to `new_position`, shifting everything in between by one.
///
/// # Errors
/// - `EntryNotFound` if the entry does not belong to `owner`.
/// - `PositionOutOfRange` if `new_position` is not in `0..entry_count`.
pub fn swap_entry_position(
    conn: &mut Connection,
    owner: PositionOwner,
    entry_id: i64,
    new_position: u32,
) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let mut ids = ordered_entry_ids(&tx, owner)?;
    let len = ids.len() as u32;
    let old_index = ids
        .iter()
        .position(|&id| id == entry_id)
        .ok_or(Error::EntryNotFound(entry_id))?;
    if new_position >= len {
        return Err(Error::PositionOutOfRange {
            position: new_position,
            len,
        });
    }
    let moved = ids.remove(old_index);
    ids.insert(new_position as usize, moved);
    renumber(&tx, &ids)?;
    tx.commit()?;
    debug!(?owner, entry_id, from = old_index, to = new_position, "Moved entry");
    Ok(())
}

/// Removes an entry (with its sets and expected set) and closes the gap.
pub fn remove_entry(conn: &mut Connection, owner: PositionOwner, entry_id: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;
    if entry_owner(&tx, entry_id)? != owner {
        return Err(Error::EntryNotFound(entry_id));
    }
    tx.execute("DELETE FROM positions WHERE id = ?1", params![entry_id])
        .map_err(Error::DeleteFailed)?;
    compact(&tx, owner)?;
    tx.commit()?;
    Ok(())
}

fn entry_id_at(conn: &Connection, workout_id: i64, position: u32) -> Result<i64, Error> {
    conn.query_row(
        "SELECT id FROM positions WHERE workout_id = ?1 AND position = ?2",
        params![workout_id, position],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::QueryFailed)?
    .ok_or(Error::NoEntryAtPosition {
        workout_id,
        position,
    })
}

/// Resolves the group placeholder at `position` to `exercise_id`.
///
/// The entry's sets stay attached and now count towards the exercise. With
/// `narrow_target`, an expected set aimed at the group is re-aimed at the
/// exercise as well.
pub fn replace_group_with_exercise(
    conn: &mut Connection,
    workout_id: i64,
    group_id: i64,
    exercise_id: i64,
    position: u32,
    narrow_target: bool,
) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    let entry_id = entry_id_at(&tx, workout_id, position)?;
    let group = require_group(&tx, group_id)?;
    let exercise = require_exercise(&tx, exercise_id)?;

    if entry_target(&tx, entry_id)? != TargetRef::Group(group_id) {
        return Err(Error::EntryTargetMismatch {
            entry_id,
            expected: format!("group '{}'", group.name),
        });
    }
    if !group.contains(exercise_id) {
        return Err(Error::ExerciseNotInGroup {
            exercise: exercise.name,
            group: group.name,
        });
    }

    tx.execute(
        "UPDATE positions SET group_id = NULL, exercise_id = ?1 WHERE id = ?2",
        params![exercise_id, entry_id],
    )
    .map_err(Error::UpdateFailed)?;

    if narrow_target {
        tx.execute(
            "UPDATE expected_sets SET group_id = NULL, exercise_id = ?1
             WHERE position_id = ?2 AND group_id = ?3",
            params![exercise_id, entry_id, group_id],
        )
        .map_err(Error::UpdateFailed)?;
    }
    tx.commit()?;
    info!(workout_id, entry_id, group = %group.name, exercise = %exercise.name, "Chose exercise from group");
    Ok(entry_id)
}

/// Turns an exercise entry back into a group placeholder. Returns the group id.
///
/// The group is, in order of preference: the group the entry's expected set
/// targets (if it contains the exercise), the oldest group containing the
/// exercise, or a new group named after the exercise.
pub fn replace_exercise_with_group(
    conn: &mut Connection,
    workout_id: i64,
    entry_id: i64,
) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    if entry_owner(&tx, entry_id)? != PositionOwner::Workout(workout_id) {
        return Err(Error::EntryNotFound(entry_id));
    }
    let TargetRef::Exercise(exercise_id) = entry_target(&tx, entry_id)? else {
        return Err(Error::EntryTargetMismatch {
            entry_id,
            expected: "an exercise".to_string(),
        });
    };

    let expected_group: Option<i64> = tx
        .query_row(
            "SELECT group_id FROM expected_sets WHERE position_id = ?1",
            params![entry_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::QueryFailed)?
        .flatten();
    let containing = groups_containing(&tx, exercise_id)?;

    let group_id = match expected_group.filter(|g| containing.contains(g)) {
        Some(id) => id,
        None => match containing.first() {
            Some(&id) => id,
            None => new_group_for(&tx, exercise_id)?,
        },
    };

    tx.execute(
        "UPDATE positions SET exercise_id = NULL, group_id = ?1 WHERE id = ?2",
        params![group_id, entry_id],
    )
    .map_err(Error::UpdateFailed)?;
    tx.commit()?;
    info!(workout_id, entry_id, group_id, "Replaced exercise with group");
    Ok(group_id)
}

/// Creates a single-member group named after the exercise, suffixing the
/// name until it is free.
fn new_group_for(conn: &Connection, exercise_id: i64) -> Result<i64, Error> {
    let exercise = require_exercise(conn, exercise_id)?;
    let mut name = exercise.name.clone();
    let mut suffix = 2;
    while get_group_by_name(conn, &name)?.is_some() {
        name = format!("{} ({suffix})", exercise.name);
        suffix += 1;
    }
    insert_group(conn, &name, &[exercise_id])
}
