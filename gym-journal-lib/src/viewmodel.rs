//src/viewmodel.rs
//! Observable screen state. A view-model owns the tasks it starts; dropping
//! it aborts whatever is still running.
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::catalog::Suggestion;
use crate::models::{
    Exercise, ExerciseFilters, NewExercise, NewExpectedSet, NewSet, PositionOwner, TargetRef, Workout,
    WorkoutFilters, WorkoutPlan,
};
use crate::stats::{Improvement, ProgressPoint};
use crate::transfer::ImportReport;
use crate::usecase::{settle, Resource, ResultStream, SeedReport, UseCases};

/// Latest [`Resource`] for one piece of screen state plus the tasks feeding it.
pub struct StateHolder<T> {
    state: Arc<watch::Sender<Resource<T>>>,
    tasks: Mutex<JoinSet<()>>,
}

impl<T: Clone + Send + Sync + 'static> Default for StateHolder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> StateHolder<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Resource::Loading);
        Self {
            state: Arc::new(state),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Resource<T>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Resource<T> {
        self.state.borrow().clone()
    }

    /// Waits until the state leaves `Loading`. Only meaningful after a launch.
    pub async fn settled(&self) -> Resource<T> {
        let mut rx = self.subscribe();
        let result = match rx.wait_for(|r| !r.is_loading()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => Resource::Loading,
        };
        result
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.state.send_replace(Resource::Loading);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Tasks spawned and not yet reaped. Finished tasks are reaped on the next launch.
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Publishes every item of `results`.
    pub fn launch(&self, mut results: ResultStream<T>) {
        let state = Arc::clone(&self.state);
        self.spawn(async move {
            while let Some(item) = results.next().await {
                state.send_replace(item);
            }
        });
    }

    /// Runs `action`; on success publishes the stream `then` builds, on
    /// failure publishes the action's error.
    pub fn launch_then<U, F>(&self, action: ResultStream<U>, then: F)
    where
        U: Send + 'static,
        F: FnOnce(U) -> ResultStream<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.spawn(async move {
            match settle(action).await {
                Ok(value) => {
                    let mut results = then(value);
                    while let Some(item) = results.next().await {
                        state.send_replace(item);
                    }
                }
                Err(e) => {
                    state.send_replace(Resource::Error(e));
                }
            }
        });
    }
}

pub struct WorkoutListViewModel {
    use_cases: UseCases,
    filters: WorkoutFilters,
    pub workouts: StateHolder<Vec<Workout>>,
}

impl WorkoutListViewModel {
    pub fn new(use_cases: UseCases, filters: WorkoutFilters) -> Self {
        Self {
            use_cases,
            filters,
            workouts: StateHolder::new(),
        }
    }

    pub fn refresh(&self) {
        self.workouts
            .launch(self.use_cases.list_workouts(self.filters.clone()));
    }

    fn reload_after<U: Send + 'static>(&self, action: ResultStream<U>) {
        let use_cases = self.use_cases.clone();
        let filters = self.filters.clone();
        self.workouts
            .launch_then(action, move |_| use_cases.list_workouts(filters));
    }

    pub fn create(&self, note: Option<String>) {
        self.reload_after(self.use_cases.create_workout(note));
    }

    pub fn delete(&self, id: i64) {
        self.reload_after(self.use_cases.delete_workout(id));
    }
}

/// A single workout. Every mutation reloads the whole workout afterwards.
pub struct WorkoutViewModel {
    use_cases: UseCases,
    workout_id: i64,
    pub workout: StateHolder<Workout>,
}

impl WorkoutViewModel {
    pub fn new(use_cases: UseCases, workout_id: i64) -> Self {
        Self {
            use_cases,
            workout_id,
            workout: StateHolder::new(),
        }
    }

    pub const fn workout_id(&self) -> i64 {
        self.workout_id
    }

    pub fn load(&self) {
        self.workout
            .launch(self.use_cases.get_workout(self.workout_id));
    }

    fn reload_after<U: Send + 'static>(&self, action: ResultStream<U>) {
        let use_cases = self.use_cases.clone();
        let id = self.workout_id;
        self.workout
            .launch_then(action, move |_| use_cases.get_workout(id));
    }

    pub fn add_entry(&self, target: TargetRef) {
        self.reload_after(self.use_cases.add_entry(self.workout_id, target));
    }

    pub fn remove_entry(&self, entry_id: i64) {
        self.reload_after(
            self.use_cases
                .remove_entry(PositionOwner::Workout(self.workout_id), entry_id),
        );
    }

    pub fn swap_entry(&self, entry_id: i64, new_position: u32) {
        self.reload_after(self.use_cases.swap_entry_position(
            PositionOwner::Workout(self.workout_id),
            entry_id,
            new_position,
        ));
    }

    pub fn choose_exercise(&self, group_id: i64, exercise_id: i64, position: u32, narrow_target: bool) {
        self.reload_after(self.use_cases.choose_exercise_from_group(
            self.workout_id,
            group_id,
            exercise_id,
            position,
            narrow_target,
        ));
    }

    pub fn revert_to_group(&self, entry_id: i64) {
        self.reload_after(self.use_cases.revert_to_group(self.workout_id, entry_id));
    }

    pub fn add_set(&self, entry_id: i64, set: NewSet) {
        self.reload_after(self.use_cases.add_set(entry_id, set));
    }

    pub fn complete_set(&self, set_id: i64) {
        self.reload_after(self.use_cases.complete_set(set_id));
    }

    pub fn delete_set(&self, set_id: i64) {
        self.reload_after(self.use_cases.delete_set(set_id));
    }

    pub fn finish(&self) {
        self.reload_after(self.use_cases.complete_workout(self.workout_id));
    }
}

pub struct PlanViewModel {
    use_cases: UseCases,
    plan_id: i64,
    pub plan: StateHolder<WorkoutPlan>,
    /// Id of the workout most recently started from this plan.
    pub started_workout: StateHolder<i64>,
}

impl PlanViewModel {
    pub fn new(use_cases: UseCases, plan_id: i64) -> Self {
        Self {
            use_cases,
            plan_id,
            plan: StateHolder::new(),
            started_workout: StateHolder::new(),
        }
    }

    pub fn load(&self) {
        self.plan.launch(self.use_cases.get_plan(self.plan_id));
    }

    fn reload_after<U: Send + 'static>(&self, action: ResultStream<U>) {
        let use_cases = self.use_cases.clone();
        let id = self.plan_id;
        self.plan.launch_then(action, move |_| use_cases.get_plan(id));
    }

    pub fn add_expected_set(&self, new: NewExpectedSet) {
        self.reload_after(self.use_cases.add_expected_set(self.plan_id, new));
    }

    pub fn remove_expected_set(&self, expected_id: i64) {
        self.reload_after(self.use_cases.remove_expected_set(expected_id));
    }

    pub fn swap_expected_set(&self, expected_id: i64, new_position: u32) {
        self.reload_after(
            self.use_cases
                .swap_expected_set_position(self.plan_id, expected_id, new_position),
        );
    }

    pub fn start_workout(&self) {
        self.started_workout
            .launch(self.use_cases.create_workout_from_plan(self.plan_id));
    }
}

pub struct ExerciseListViewModel {
    use_cases: UseCases,
    filters: Mutex<ExerciseFilters>,
    pub exercises: StateHolder<Vec<Exercise>>,
}

impl ExerciseListViewModel {
    pub fn new(use_cases: UseCases) -> Self {
        Self {
            use_cases,
            filters: Mutex::new(ExerciseFilters::default()),
            exercises: StateHolder::new(),
        }
    }

    fn filters(&self) -> ExerciseFilters {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reloads with `filters`, which stay in effect for later refreshes.
    pub fn refresh(&self, filters: ExerciseFilters) {
        *self.filters.lock().unwrap_or_else(PoisonError::into_inner) = filters.clone();
        self.exercises.launch(self.use_cases.list_exercises(filters));
    }

    fn reload_after<U: Send + 'static>(&self, action: ResultStream<U>) {
        let use_cases = self.use_cases.clone();
        let filters = self.filters();
        self.exercises
            .launch_then(action, move |_| use_cases.list_exercises(filters));
    }

    pub fn create(&self, new: NewExercise) {
        self.reload_after(self.use_cases.create_exercise(new));
    }

    pub fn delete(&self, id: i64) {
        self.reload_after(self.use_cases.delete_exercise(id));
    }
}

pub struct StatsViewModel {
    use_cases: UseCases,
    pub most_improved: StateHolder<Option<Improvement>>,
    pub progress: StateHolder<Vec<ProgressPoint>>,
}

impl StatsViewModel {
    pub fn new(use_cases: UseCases) -> Self {
        Self {
            use_cases,
            most_improved: StateHolder::new(),
            progress: StateHolder::new(),
        }
    }

    pub fn refresh_most_improved(&self) {
        self.most_improved
            .launch(self.use_cases.most_improved_exercise());
    }

    pub fn load_progress(&self, exercise_id: i64) {
        self.progress
            .launch(self.use_cases.exercise_progress(exercise_id));
    }
}

pub struct CatalogViewModel {
    use_cases: UseCases,
    pub suggestions: StateHolder<Vec<Suggestion>>,
    pub seed: StateHolder<SeedReport>,
}

impl CatalogViewModel {
    pub fn new(use_cases: UseCases) -> Self {
        Self {
            use_cases,
            suggestions: StateHolder::new(),
            seed: StateHolder::new(),
        }
    }

    pub fn search(&self, term: String) {
        self.suggestions.launch(self.use_cases.search_catalog(term));
    }

    pub fn seed(&self) {
        self.seed.launch(self.use_cases.seed_catalog());
    }
}

pub struct TransferViewModel {
    use_cases: UseCases,
    pub exported: StateHolder<usize>,
    pub imported: StateHolder<ImportReport>,
    pub backed_up: StateHolder<()>,
    pub restored: StateHolder<()>,
}

impl TransferViewModel {
    pub fn new(use_cases: UseCases) -> Self {
        Self {
            use_cases,
            exported: StateHolder::new(),
            imported: StateHolder::new(),
            backed_up: StateHolder::new(),
            restored: StateHolder::new(),
        }
    }

    pub fn export_csv(&self, path: PathBuf) {
        self.exported.launch(self.use_cases.export_csv(path));
    }

    pub fn import_csv(&self, path: PathBuf) {
        self.imported.launch(self.use_cases.import_csv(path));
    }

    pub fn backup(&self, path: PathBuf) {
        self.backed_up.launch(self.use_cases.backup(path));
    }

    pub fn restore(&self, path: PathBuf) {
        self.restored.launch(self.use_cases.restore(path));
    }
}
