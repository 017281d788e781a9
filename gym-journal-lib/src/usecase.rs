//src/usecase.rs
//! One method per operation. Each returns a stream that yields `Loading`,
//! runs the operation once, then yields `Success` or `Error`.
use async_stream::stream;
use chrono::{Duration, Utc};
use futures_util::{Stream, StreamExt};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, CatalogExercise, CatalogImage, ExerciseQuery, Page, Suggestion};
use crate::db::{self, Store};
use crate::error::Error;
use crate::models::{
    Category, Exercise, ExerciseFilters, ExerciseGroup, ExerciseUpdate, ExpectedSetUpdate, NewExercise, NewExpectedSet,
    NewSet, PositionOwner, SetUpdate, TargetRef, Workout, WorkoutFilters, WorkoutPlan,
};
use crate::stats::{self, Improvement, ProgressPoint};
use crate::transfer::{self, ImportReport};

/// Tri-state result of an operation.
#[derive(Debug)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(Arc<Error>),
}

impl<T> Resource<T> {
    pub fn from_result(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Error(Arc::new(e)),
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub const fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resource<U> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(value) => Resource::Success(f(value)),
            Self::Error(e) => Resource::Error(e),
        }
    }
}

impl<T: Clone> Clone for Resource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Loading => Self::Loading,
            Self::Success(value) => Self::Success(value.clone()),
            Self::Error(e) => Self::Error(Arc::clone(e)),
        }
    }
}

pub type ResultStream<T> = Pin<Box<dyn Stream<Item = Resource<T>> + Send>>;

/// Drives a stream to its final state.
pub async fn settle<T>(mut results: ResultStream<T>) -> Result<T, Arc<Error>> {
    while let Some(item) = results.next().await {
        match item {
            Resource::Loading => {}
            Resource::Success(value) => return Ok(value),
            Resource::Error(e) => return Err(e),
        }
    }
    Err(Arc::new(Error::Task("stream ended without a result".to_string())))
}

/// Runs `op` against the store on the blocking pool.
fn blocking<T, F>(store: &Store, op: F) -> ResultStream<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, Error> + Send + 'static,
{
    let store = store.clone();
    Box::pin(stream! {
        yield Resource::Loading;
        let joined = tokio::task::spawn_blocking(move || store.with_conn(op)).await;
        yield Resource::from_result(joined.map_err(Error::from).and_then(|r| r));
    })
}

fn remote<T, Fut>(fut: Fut) -> ResultStream<T>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
{
    Box::pin(stream! {
        yield Resource::Loading;
        yield Resource::from_result(fut.await);
    })
}

/// Outcome of seeding the local exercise list from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct UseCases {
    store: Store,
    catalog: Arc<CatalogClient>,
    improvement_window_days: u32,
}

impl UseCases {
    pub fn new(store: Store, catalog: CatalogClient, improvement_window_days: u32) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            improvement_window_days,
        }
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    // --- Exercises ---

    pub fn create_exercise(&self, new: NewExercise) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::exercises::create_exercise(conn, &new)?)
        })
    }

    pub fn get_exercise(&self, id: i64) -> ResultStream<Exercise> {
        blocking(&self.store, move |conn| Ok(db::exercises::require_exercise(conn, id)?))
    }

    pub fn find_exercise(&self, name: String) -> ResultStream<Exercise> {
        blocking(&self.store, move |conn| {
            db::exercises::get_exercise_by_name(conn, &name)?
                .ok_or_else(|| Error::Store(db::Error::ExerciseNotFound(name)))
        })
    }

    pub fn list_exercises(&self, filters: ExerciseFilters) -> ResultStream<Vec<Exercise>> {
        blocking(&self.store, move |conn| {
            Ok(db::exercises::list_exercises(conn, &filters)?)
        })
    }

    pub fn update_exercise(&self, id: i64, update: ExerciseUpdate) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::exercises::update_exercise(conn, id, &update)?)
        })
    }

    pub fn delete_exercise(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::exercises::delete_exercise(conn, id)?))
    }

    pub fn list_muscles(&self) -> ResultStream<Vec<String>> {
        blocking(&self.store, |conn| Ok(db::exercises::list_all_muscles(conn)?))
    }

    // --- Groups ---

    pub fn create_group(&self, name: String, members: Vec<i64>) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::groups::create_group(conn, &name, &members)?)
        })
    }

    pub fn get_group(&self, id: i64) -> ResultStream<ExerciseGroup> {
        blocking(&self.store, move |conn| Ok(db::groups::require_group(conn, id)?))
    }

    pub fn find_group(&self, name: String) -> ResultStream<ExerciseGroup> {
        blocking(&self.store, move |conn| {
            db::groups::get_group_by_name(conn, &name)?
                .ok_or_else(|| Error::Store(db::Error::GroupNotFound(name)))
        })
    }

    pub fn list_groups(&self) -> ResultStream<Vec<ExerciseGroup>> {
        blocking(&self.store, |conn| Ok(db::groups::list_groups(conn)?))
    }

    pub fn rename_group(&self, id: i64, name: String) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::groups::rename_group(conn, id, &name)?))
    }

    pub fn add_group_member(&self, group_id: i64, exercise_id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::groups::add_member(conn, group_id, exercise_id)?)
        })
    }

    pub fn remove_group_member(&self, group_id: i64, exercise_id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::groups::remove_member(conn, group_id, exercise_id)?)
        })
    }

    pub fn delete_group(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::groups::delete_group(conn, id)?))
    }

    // --- Workouts ---

    pub fn create_workout(&self, note: Option<String>) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::create_workout(conn, note.as_deref(), Utc::now())?)
        })
    }

    pub fn create_workout_from_plan(&self, plan_id: i64) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::create_workout_from_plan(conn, plan_id, Utc::now())?)
        })
    }

    pub fn get_workout(&self, id: i64) -> ResultStream<Workout> {
        blocking(&self.store, move |conn| Ok(db::workouts::get_workout(conn, id)?))
    }

    pub fn list_workouts(&self, filters: WorkoutFilters) -> ResultStream<Vec<Workout>> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::list_workouts(conn, &filters)?)
        })
    }

    pub fn update_workout_note(&self, id: i64, note: Option<String>) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::update_workout_note(conn, id, note.as_deref())?)
        })
    }

    pub fn complete_workout(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::set_workout_completed(conn, id, Some(Utc::now()))?)
        })
    }

    pub fn reopen_workout(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::set_workout_completed(conn, id, None)?)
        })
    }

    pub fn delete_workout(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::workouts::delete_workout(conn, id)?))
    }

    // --- Entries ---

    pub fn add_entry(&self, workout_id: i64, target: TargetRef) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::workouts::add_entry(conn, workout_id, target)?)
        })
    }

    pub fn remove_entry(&self, owner: PositionOwner, entry_id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::positions::remove_entry(conn, owner, entry_id)?)
        })
    }

    pub fn swap_entry_position(&self, owner: PositionOwner, entry_id: i64, new_position: u32) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::positions::swap_entry_position(conn, owner, entry_id, new_position)?)
        })
    }

    /// Resolves the group at `position` to one of its exercises.
    pub fn choose_exercise_from_group(
        &self,
        workout_id: i64,
        group_id: i64,
        exercise_id: i64,
        position: u32,
        narrow_target: bool,
    ) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::positions::replace_group_with_exercise(
                conn,
                workout_id,
                group_id,
                exercise_id,
                position,
                narrow_target,
            )?)
        })
    }

    pub fn revert_to_group(&self, workout_id: i64, entry_id: i64) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::positions::replace_exercise_with_group(conn, workout_id, entry_id)?)
        })
    }

    // --- Sets ---

    pub fn add_set(&self, entry_id: i64, new: NewSet) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::sets::add_set(conn, entry_id, &new, Utc::now())?)
        })
    }

    pub fn update_set(&self, id: i64, update: SetUpdate) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::sets::update_set(conn, id, &update)?))
    }

    pub fn complete_set(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::sets::set_completion(conn, id, Some(Utc::now()))?)
        })
    }

    pub fn uncomplete_set(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::sets::set_completion(conn, id, None)?))
    }

    pub fn delete_set(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::sets::delete_set(conn, id)?))
    }

    pub fn exercise_history(&self, exercise_id: i64) -> ResultStream<Vec<db::sets::SetRecord>> {
        blocking(&self.store, move |conn| {
            db::exercises::require_exercise(conn, exercise_id)?;
            Ok(db::sets::completed_sets_for_exercise(conn, exercise_id)?)
        })
    }

    // --- Plans ---

    pub fn create_plan(&self, name: String, note: String) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::plans::create_plan(conn, &name, &note, Utc::now())?)
        })
    }

    pub fn get_plan(&self, id: i64) -> ResultStream<WorkoutPlan> {
        blocking(&self.store, move |conn| Ok(db::plans::require_plan(conn, id)?))
    }

    pub fn list_plans(&self) -> ResultStream<Vec<WorkoutPlan>> {
        blocking(&self.store, |conn| Ok(db::plans::list_plans(conn)?))
    }

    pub fn update_plan(&self, id: i64, name: Option<String>, note: Option<String>) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::plans::update_plan(conn, id, name.as_deref(), note.as_deref())?)
        })
    }

    pub fn delete_plan(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::plans::delete_plan(conn, id)?))
    }

    pub fn add_expected_set(&self, plan_id: i64, new: NewExpectedSet) -> ResultStream<i64> {
        blocking(&self.store, move |conn| {
            Ok(db::plans::add_expected_set(conn, plan_id, &new)?)
        })
    }

    pub fn update_expected_set(&self, id: i64, update: ExpectedSetUpdate) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::plans::update_expected_set(conn, id, &update)?)
        })
    }

    pub fn remove_expected_set(&self, id: i64) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(db::plans::remove_expected_set(conn, id)?))
    }

    pub fn swap_expected_set_position(&self, plan_id: i64, expected_id: i64, new_position: u32) -> ResultStream<()> {
        blocking(&self.store, move |conn| {
            Ok(db::plans::swap_expected_set_position(conn, plan_id, expected_id, new_position)?)
        })
    }

    // --- Stats ---

    pub fn exercise_progress(&self, exercise_id: i64) -> ResultStream<Vec<ProgressPoint>> {
        blocking(&self.store, move |conn| {
            db::exercises::require_exercise(conn, exercise_id)?;
            let records = db::sets::completed_sets_for_exercise(conn, exercise_id)?;
            Ok(stats::progress(&records))
        })
    }

    /// Most improved exercise over the configured window ending now.
    pub fn most_improved_exercise(&self) -> ResultStream<Option<Improvement>> {
        let since = Utc::now() - Duration::days(i64::from(self.improvement_window_days));
        blocking(&self.store, move |conn| {
            let records = db::sets::completed_sets_since(conn, since)?;
            Ok(stats::most_improved(&records))
        })
    }

    // --- Catalog ---

    pub fn search_catalog(&self, term: String) -> ResultStream<Vec<Suggestion>> {
        let catalog = Arc::clone(&self.catalog);
        remote(async move { Ok(catalog.search(&term).await?) })
    }

    pub fn list_catalog_exercises(&self, query: ExerciseQuery) -> ResultStream<Page<CatalogExercise>> {
        let catalog = Arc::clone(&self.catalog);
        remote(async move { Ok(catalog.list_exercises(&query).await?) })
    }

    /// Pulls the catalog and inserts every exercise not already known by
    /// name. Existing exercises are left untouched.
    pub fn seed_catalog(&self) -> ResultStream<SeedReport> {
        let catalog = Arc::clone(&self.catalog);
        let store = self.store.clone();
        remote(async move {
            let muscles: HashMap<u32, String> = catalog
                .list_muscles()
                .await?
                .results
                .into_iter()
                .map(|m| (m.id, m.display_name().to_string()))
                .collect();
            let exercises = catalog.fetch_all_exercises(&ExerciseQuery::default()).await?;
            let images = match catalog.fetch_main_images().await {
                Ok(images) => images,
                Err(e) => {
                    warn!(error = %e, "Could not fetch catalog images, seeding without thumbnails");
                    Vec::new()
                }
            };
            let new_exercises = to_new_exercises(exercises, &muscles, &images);

            let report = tokio::task::spawn_blocking(move || {
                store.with_conn(|conn| insert_seed(conn, &new_exercises))
            })
            .await??;
            info!(inserted = report.inserted, skipped = report.skipped, "Seeded exercise catalog");
            Ok(report)
        })
    }

    // --- Transfer ---

    pub fn export_csv(&self, path: PathBuf) -> ResultStream<usize> {
        blocking(&self.store, move |conn| Ok(transfer::export_csv_file(conn, &path)?))
    }

    pub fn import_csv(&self, path: PathBuf) -> ResultStream<ImportReport> {
        blocking(&self.store, move |conn| Ok(transfer::import_csv_file(conn, &path)?))
    }

    pub fn backup(&self, path: PathBuf) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(transfer::backup(conn, &path)?))
    }

    pub fn restore(&self, path: PathBuf) -> ResultStream<()> {
        blocking(&self.store, move |conn| Ok(transfer::restore(conn, &path)?))
    }
}

fn to_new_exercises(
    exercises: Vec<CatalogExercise>,
    muscles: &HashMap<u32, String>,
    images: &[CatalogImage],
) -> Vec<NewExercise> {
    let thumbnails: HashMap<i64, &str> = images
        .iter()
        .map(|i| (i.exercise, i.image.as_str()))
        .collect();
    exercises
        .into_iter()
        .filter(|e| !e.name.trim().is_empty())
        .map(|e| {
            let base = e.exercise_base.unwrap_or(e.id);
            NewExercise {
                name: e.name.trim().to_string(),
                muscles: e
                    .muscles
                    .iter()
                    .chain(&e.muscles_secondary)
                    .filter_map(|id| muscles.get(id).cloned())
                    .collect(),
                category: Category::from_catalog_id(e.category),
                equipment: None,
                thumbnail: thumbnails.get(&base).map(|s| (*s).to_string()),
            }
        })
        .collect()
}

fn insert_seed(conn: &mut Connection, exercises: &[NewExercise]) -> Result<SeedReport, Error> {
    let tx = conn.transaction()?;
    let mut report = SeedReport {
        inserted: 0,
        skipped: 0,
    };
    for new in exercises {
        let (_, inserted) = db::exercises::get_or_create_exercise(&tx, new)?;
        if inserted {
            report.inserted += 1;
        } else {
            report.skipped += 1;
        }
    }
    tx.commit()?;
    Ok(report)
}
