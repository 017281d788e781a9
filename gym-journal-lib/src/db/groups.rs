//src/db/groups.rs
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::exercises::{map_exercise_at, require_exercise, EXERCISE_COLUMNS};
use super::{is_unique_violation, positions, Error};
use crate::models::{Exercise, ExerciseGroup, TargetRef};

fn group_members(conn: &Connection, group_id: i64) -> Result<Vec<Exercise>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercise_group_members m
             JOIN exercises e ON e.id = m.exercise_id
             WHERE m.group_id = ?1
             ORDER BY e.name COLLATE NOCASE"
        ))
        .map_err(Error::QueryFailed)?;
    let members = stmt
        .query_map(params![group_id], |row| map_exercise_at(row, 0))
        .map_err(Error::QueryFailed)?;
    members
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

fn load_group(conn: &Connection, id: i64, name: String) -> Result<ExerciseGroup, Error> {
    Ok(ExerciseGroup {
        id,
        name,
        exercises: group_members(conn, id)?,
    })
}

/// Creates a group holding `members`. Unknown exercise ids abort the insert.
pub fn create_group(conn: &mut Connection, name: &str, members: &[i64]) -> Result<i64, Error> {
    let tx = conn.transaction()?;
    let group_id = insert_group(&tx, name, members)?;
    tx.commit()?;
    Ok(group_id)
}

/// Insert half of [`create_group`], for callers already inside a transaction.
pub(crate) fn insert_group(conn: &Connection, name: &str, members: &[i64]) -> Result<i64, Error> {
    let name = name.trim();
    match conn.execute("INSERT INTO exercise_groups (name) VALUES (?1)", params![name]) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(Error::GroupNameNotUnique(name.to_string())),
        Err(e) => return Err(Error::InsertFailed(e)),
    }
    let group_id = conn.last_insert_rowid();
    for &exercise_id in members {
        require_exercise(conn, exercise_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO exercise_group_members (group_id, exercise_id) VALUES (?1, ?2)",
            params![group_id, exercise_id],
        )
        .map_err(Error::InsertFailed)?;
    }
    debug!(group_id, name, members = members.len(), "Created exercise group");
    Ok(group_id)
}

pub fn get_group_by_id(conn: &Connection, id: i64) -> Result<Option<ExerciseGroup>, Error> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM exercise_groups WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::QueryFailed)?;
    name.map(|name| load_group(conn, id, name)).transpose()
}

pub fn require_group(conn: &Connection, id: i64) -> Result<ExerciseGroup, Error> {
    get_group_by_id(conn, id)?.ok_or_else(|| Error::GroupNotFound(format!("ID {id}")))
}

pub fn get_group_by_name(conn: &Connection, name: &str) -> Result<Option<ExerciseGroup>, Error> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, name FROM exercise_groups WHERE name = ?1 COLLATE NOCASE",
            params![name.trim()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(Error::QueryFailed)?;
    row.map(|(id, name)| load_group(conn, id, name)).transpose()
}

pub fn list_groups(conn: &Connection) -> Result<Vec<ExerciseGroup>, Error> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM exercise_groups ORDER BY name COLLATE NOCASE")
        .map_err(Error::QueryFailed)?;
    let heads = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(Error::QueryFailed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)?;
    heads
        .into_iter()
        .map(|(id, name)| load_group(conn, id, name))
        .collect()
}

/// Ids of groups that contain `exercise_id`, lowest first.
pub fn groups_containing(conn: &Connection, exercise_id: i64) -> Result<Vec<i64>, Error> {
    let mut stmt = conn
        .prepare(
            "SELECT group_id FROM exercise_group_members WHERE exercise_id = ?1 ORDER BY group_id",
        )
        .map_err(Error::QueryFailed)?;
    let ids = stmt
        .query_map(params![exercise_id], |row| row.get(0))
        .map_err(Error::QueryFailed)?;
    ids.collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

pub fn rename_group(conn: &Connection, id: i64, new_name: &str) -> Result<(), Error> {
    let new_name = new_name.trim();
    match conn.execute(
        "UPDATE exercise_groups SET name = ?1 WHERE id = ?2",
        params![new_name, id],
    ) {
        Ok(0) => Err(Error::GroupNotFound(format!("ID {id}"))),
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(Error::GroupNameNotUnique(new_name.to_string())),
        Err(e) => Err(Error::UpdateFailed(e)),
    }
}

/// Adds an exercise to a group; adding an existing member is a no-op.
pub fn add_member(conn: &Connection, group_id: i64, exercise_id: i64) -> Result<(), Error> {
    require_group(conn, group_id)?;
    require_exercise(conn, exercise_id)?;
    conn.execute(
        "INSERT OR IGNORE INTO exercise_group_members (group_id, exercise_id) VALUES (?1, ?2)",
        params![group_id, exercise_id],
    )
    .map_err(Error::InsertFailed)?;
    Ok(())
}

pub fn remove_member(conn: &Connection, group_id: i64, exercise_id: i64) -> Result<(), Error> {
    let rows = conn
        .execute(
            "DELETE FROM exercise_group_members WHERE group_id = ?1 AND exercise_id = ?2",
            params![group_id, exercise_id],
        )
        .map_err(Error::DeleteFailed)?;
    if rows == 0 {
        return Err(Error::ExerciseNotInGroup {
            exercise: format!("ID {exercise_id}"),
            group: format!("ID {group_id}"),
        });
    }
    Ok(())
}

/// Deletes a group. Entries and expected sets pointing at it are removed and
/// the affected workouts and plans renumbered.
pub fn delete_group(conn: &mut Connection, id: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let owners = positions::owners_referencing(&tx, TargetRef::Group(id))?;
    let rows = tx
        .execute("DELETE FROM exercise_groups WHERE id = ?1", params![id])
        .map_err(Error::DeleteFailed)?;
    if rows == 0 {
        return Err(Error::GroupNotFound(format!("ID {id}")));
    }
    for owner in owners {
        positions::compact(&tx, owner)?;
    }
    tx.commit()?;
    debug!(id, "Deleted exercise group");
    Ok(())
}
