//src/db/exercises.rs
use rusqlite::{named_params, params, Connection, OptionalExtension, Row, ToSql};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::debug;

use super::{conversion_error, is_unique_violation, join_muscles, positions, split_muscles, Error};
use crate::models::{Category, Exercise, ExerciseFilters, ExerciseUpdate, NewExercise, TargetRef};

pub(crate) const EXERCISE_COLUMNS: &str = "e.id, e.name, e.muscles, e.category, e.equipment, e.thumbnail";

/// Maps the six [`EXERCISE_COLUMNS`] starting at `offset`.
pub(crate) fn map_exercise_at(row: &Row, offset: usize) -> Result<Exercise, rusqlite::Error> {
    let category_str: String = row.get(offset + 3)?;
    let category =
        Category::from_str(&category_str).map_err(|e| conversion_error(offset + 3, e))?;
    Ok(Exercise {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        muscles: split_muscles(&row.get::<_, String>(offset + 2)?),
        category,
        equipment: row.get(offset + 4)?,
        thumbnail: row.get(offset + 5)?,
    })
}

fn map_row_to_exercise(row: &Row) -> Result<Exercise, rusqlite::Error> {
    map_exercise_at(row, 0)
}

/// Creates a new exercise. Returns its ID.
pub fn create_exercise(conn: &Connection, new: &NewExercise) -> Result<i64, Error> {
    let name = new.name.trim();
    match conn.execute(
        "INSERT INTO exercises (name, muscles, category, equipment, thumbnail)
         VALUES (:name, :muscles, :category, :equipment, :thumbnail)",
        named_params! {
            ":name": name,
            ":muscles": join_muscles(&new.muscles),
            ":category": new.category.to_string(),
            ":equipment": new.equipment,
            ":thumbnail": new.thumbnail,
        },
    ) {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            debug!(id, name, "Created exercise");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => Err(Error::ExerciseNameNotUnique(name.to_string())),
        Err(e) => Err(Error::InsertFailed(e)),
    }
}

/// Returns the id of the exercise named `new.name`, creating it if needed.
/// The second value is true when a row was inserted.
pub fn get_or_create_exercise(conn: &Connection, new: &NewExercise) -> Result<(i64, bool), Error> {
    if let Some(existing) = get_exercise_by_name(conn, new.name.trim())? {
        return Ok((existing.id, false));
    }
    create_exercise(conn, new).map(|id| (id, true))
}

pub fn get_exercise_by_id(conn: &Connection, id: i64) -> Result<Option<Exercise>, Error> {
    conn.query_row(
        &format!("SELECT {EXERCISE_COLUMNS} FROM exercises e WHERE e.id = ?1"),
        params![id],
        map_row_to_exercise,
    )
    .optional()
    .map_err(Error::QueryFailed)
}

/// Like [`get_exercise_by_id`] but a missing row is an error.
pub fn require_exercise(conn: &Connection, id: i64) -> Result<Exercise, Error> {
    get_exercise_by_id(conn, id)?.ok_or_else(|| Error::ExerciseNotFound(format!("ID {id}")))
}

/// Retrieves an exercise by name (case-insensitive).
pub fn get_exercise_by_name(conn: &Connection, name: &str) -> Result<Option<Exercise>, Error> {
    conn.query_row(
        &format!("SELECT {EXERCISE_COLUMNS} FROM exercises e WHERE e.name = ?1 COLLATE NOCASE"),
        params![name.trim()],
        map_row_to_exercise,
    )
    .optional()
    .map_err(Error::QueryFailed)
}

/// Lists exercises ordered by name.
pub fn list_exercises(conn: &Connection, filters: &ExerciseFilters) -> Result<Vec<Exercise>, Error> {
    let mut sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises e WHERE 1=1");
    let mut params_map: HashMap<&str, Box<dyn ToSql>> = HashMap::new();

    if let Some(name) = filters.name.as_deref() {
        sql.push_str(" AND e.name LIKE :name");
        params_map.insert(":name", Box::new(format!("%{}%", name.trim())));
    }
    if let Some(m) = filters.muscle.as_deref() {
        sql.push_str(" AND (',' || e.muscles || ',') LIKE :muscle");
        params_map.insert(":muscle", Box::new(format!("%,{},%", m.trim())));
    }
    if let Some(category) = filters.category {
        sql.push_str(" AND e.category = :category");
        params_map.insert(":category", Box::new(category.to_string()));
    }
    sql.push_str(" ORDER BY e.name COLLATE NOCASE ASC");

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (*k, v.as_ref()))
        .collect();

    let mut stmt = conn.prepare(&sql).map_err(Error::QueryFailed)?;
    let exercise_iter = stmt
        .query_map(params_for_query.as_slice(), map_row_to_exercise)
        .map_err(Error::QueryFailed)?;

    exercise_iter
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::QueryFailed)
}

/// Updates the given fields of an exercise.
pub fn update_exercise(conn: &Connection, id: i64, update: &ExerciseUpdate) -> Result<(), Error> {
    let current = require_exercise(conn, id)?;
    if update.is_empty() {
        return Ok(());
    }

    let mut params_map: HashMap<&str, Box<dyn ToSql>> = HashMap::new();
    let mut updates = Vec::new();

    if let Some(name) = update.name.as_deref() {
        updates.push("name = :name");
        params_map.insert(":name", Box::new(name.trim().to_string()));
    }
    if let Some(muscles) = update.muscles.as_deref() {
        updates.push("muscles = :muscles");
        params_map.insert(":muscles", Box::new(join_muscles(muscles)));
    }
    if let Some(category) = update.category {
        updates.push("category = :category");
        params_map.insert(":category", Box::new(category.to_string()));
    }
    if let Some(equipment) = &update.equipment {
        updates.push("equipment = :equipment");
        params_map.insert(":equipment", Box::new(equipment.clone()));
    }
    if let Some(thumbnail) = &update.thumbnail {
        updates.push("thumbnail = :thumbnail");
        params_map.insert(":thumbnail", Box::new(thumbnail.clone()));
    }

    let sql = format!("UPDATE exercises SET {} WHERE id = :id", updates.join(", "));
    params_map.insert(":id", Box::new(id));
    let params_for_exec: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (*k, v.as_ref()))
        .collect();

    match conn.execute(&sql, params_for_exec.as_slice()) {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(Error::ExerciseNameNotUnique(
            update.name.clone().unwrap_or(current.name),
        )),
        Err(e) => Err(Error::UpdateFailed(e)),
    }
}

/// Deletes an exercise. Entries, expected sets and group memberships that
/// reference it go with it; affected workouts and plans are renumbered.
pub fn delete_exercise(conn: &mut Connection, id: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let owners = positions::owners_referencing(&tx, TargetRef::Exercise(id))?;
    let rows_affected = tx
        .execute("DELETE FROM exercises WHERE id = ?1", params![id])
        .map_err(Error::DeleteFailed)?;
    if rows_affected == 0 {
        return Err(Error::ExerciseNotFound(format!("ID {id}")));
    }
    for owner in owners {
        positions::compact(&tx, owner)?;
    }
    tx.commit()?;
    debug!(id, "Deleted exercise");
    Ok(())
}

/// Every distinct muscle mentioned by any exercise, sorted.
pub fn list_all_muscles(conn: &Connection) -> Result<Vec<String>, Error> {
    let mut stmt = conn
        .prepare("SELECT muscles FROM exercises WHERE muscles != ''")
        .map_err(Error::QueryFailed)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(Error::QueryFailed)?;

    let mut muscles = BTreeSet::new();
    for raw in rows {
        muscles.extend(split_muscles(&raw.map_err(Error::QueryFailed)?));
    }
    Ok(muscles.into_iter().collect())
}
