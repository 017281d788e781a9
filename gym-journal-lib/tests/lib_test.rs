use anyhow::Result;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rusqlite::Connection;

use gym_journal_lib::db::{self, exercises, groups, plans, positions, sets, workouts};
use gym_journal_lib::{
    transfer, Category, DbError, EntryTarget, ExpectedSetUpdate, NewExercise, NewExpectedSet, NewSet,
    PositionOwner, SetUpdate, TargetRef, Weight, WorkoutFilters,
};

// Fresh in-memory database at the latest schema.
fn create_test_conn() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    db::init_db(&mut conn)?;
    Ok(conn)
}

fn exercise(conn: &Connection, name: &str) -> Result<i64> {
    Ok(exercises::create_exercise(
        conn,
        &NewExercise {
            name: name.to_string(),
            ..Default::default()
        },
    )?)
}

fn positions_of(conn: &Connection, workout_id: i64) -> Result<Vec<u32>> {
    Ok(workouts::get_workout(conn, workout_id)?
        .entries
        .iter()
        .map(|e| e.position)
        .collect())
}

fn names_of(conn: &Connection, workout_id: i64) -> Result<Vec<String>> {
    Ok(workouts::get_workout(conn, workout_id)?
        .entries
        .iter()
        .map(|e| e.target.name().to_string())
        .collect())
}

#[test]
fn test_create_exercise_unique_name() -> Result<()> {
    let conn = create_test_conn()?;
    exercise(&conn, "Squat")?;

    let result = exercises::create_exercise(
        &conn,
        &NewExercise {
            name: "squat ".to_string(),
            category: Category::Legs,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(DbError::ExerciseNameNotUnique(ref n)) if n == "squat"));
    assert_eq!(exercises::list_exercises(&conn, &Default::default())?.len(), 1);
    Ok(())
}

#[test]
fn test_exercise_filters_and_update() -> Result<()> {
    let conn = create_test_conn()?;
    let bench = exercises::create_exercise(
        &conn,
        &NewExercise {
            name: "Bench Press".to_string(),
            muscles: vec!["chest".to_string(), "triceps".to_string()],
            category: Category::Chest,
            equipment: Some("barbell".to_string()),
            thumbnail: None,
        },
    )?;
    exercises::create_exercise(
        &conn,
        &NewExercise {
            name: "Pushdown".to_string(),
            muscles: vec!["triceps".to_string()],
            category: Category::Arms,
            ..Default::default()
        },
    )?;

    let triceps = exercises::list_exercises(
        &conn,
        &gym_journal_lib::ExerciseFilters {
            muscle: Some("triceps".to_string()),
            ..Default::default()
        },
    )?;
    assert_eq!(triceps.len(), 2);

    let chest = exercises::list_exercises(
        &conn,
        &gym_journal_lib::ExerciseFilters {
            category: Some(Category::Chest),
            ..Default::default()
        },
    )?;
    assert_eq!(chest.len(), 1);
    assert_eq!(chest[0].id, bench);

    exercises::update_exercise(
        &conn,
        bench,
        &gym_journal_lib::ExerciseUpdate {
            equipment: Some(None),
            ..Default::default()
        },
    )?;
    let updated = exercises::require_exercise(&conn, bench)?;
    assert_eq!(updated.equipment, None);
    assert_eq!(updated.muscles, vec!["chest", "triceps"]);
    assert_eq!(exercises::list_all_muscles(&conn)?, vec!["chest", "triceps"]);
    Ok(())
}

#[test]
fn test_move_bench_press_to_end_keeps_sets() -> Result<()> {
    let mut conn = create_test_conn()?;
    let bench = exercise(&conn, "Bench Press")?;
    let squat = exercise(&conn, "Squat")?;
    let row = exercise(&conn, "Barbell Row")?;

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let bench_entry = workouts::add_entry(&mut conn, w, TargetRef::Exercise(bench))?;
    workouts::add_entry(&mut conn, w, TargetRef::Exercise(squat))?;
    workouts::add_entry(&mut conn, w, TargetRef::Exercise(row))?;

    for (reps, lb) in [(10, 135.0), (8, 145.0)] {
        sets::add_set(
            &conn,
            bench_entry,
            &NewSet {
                reps: Some(reps),
                weight: Some(Weight::from_lb(lb)),
                ..Default::default()
            },
            Utc::now(),
        )?;
    }

    positions::swap_entry_position(&mut conn, PositionOwner::Workout(w), bench_entry, 2)?;

    assert_eq!(names_of(&conn, w)?, vec!["Squat", "Barbell Row", "Bench Press"]);
    assert_eq!(positions_of(&conn, w)?, vec![0, 1, 2]);

    let workout = workouts::get_workout(&conn, w)?;
    let moved = workout.entry_at(2).expect("entry at position 2");
    assert_eq!(moved.id, bench_entry);
    let logged: Vec<(Option<i64>, f64)> = moved
        .sets
        .iter()
        .map(|s| (s.reps, s.weight.map_or(0.0, |w| w.lb)))
        .collect();
    assert_eq!(logged, vec![(Some(10), 135.0), (Some(8), 145.0)]);
    Ok(())
}

#[test]
fn test_swap_matches_remove_insert_for_every_pair() -> Result<()> {
    let mut conn = create_test_conn()?;
    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let mut model = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let id = exercise(&conn, name)?;
        model.push(workouts::add_entry(&mut conn, w, TargetRef::Exercise(id))?);
    }
    let owner = PositionOwner::Workout(w);

    for from in 0..4 {
        for to in 0..4u32 {
            let entry = model[from];
            positions::swap_entry_position(&mut conn, owner, entry, to)?;
            model.remove(from);
            model.insert(to as usize, entry);

            assert_eq!(positions::ordered_entry_ids(&conn, owner)?, model);
            assert_eq!(positions_of(&conn, w)?, vec![0, 1, 2, 3]);
        }
    }
    Ok(())
}

#[test]
fn test_swap_rejects_bad_position_and_foreign_entry() -> Result<()> {
    let mut conn = create_test_conn()?;
    let squat = exercise(&conn, "Squat")?;
    let w1 = workouts::create_workout(&conn, None, Utc::now())?;
    let w2 = workouts::create_workout(&conn, None, Utc::now())?;
    let e1 = workouts::add_entry(&mut conn, w1, TargetRef::Exercise(squat))?;
    workouts::add_entry(&mut conn, w1, TargetRef::Exercise(squat))?;
    let e2 = workouts::add_entry(&mut conn, w2, TargetRef::Exercise(squat))?;

    let out_of_range = positions::swap_entry_position(&mut conn, PositionOwner::Workout(w1), e1, 2);
    assert!(matches!(
        out_of_range,
        Err(DbError::PositionOutOfRange { position: 2, len: 2 })
    ));

    let foreign = positions::swap_entry_position(&mut conn, PositionOwner::Workout(w1), e2, 0);
    assert!(matches!(foreign, Err(DbError::EntryNotFound(id)) if id == e2));

    let foreign_remove = positions::remove_entry(&mut conn, PositionOwner::Workout(w1), e2);
    assert!(matches!(foreign_remove, Err(DbError::EntryNotFound(_))));
    assert_eq!(positions_of(&conn, w2)?, vec![0]);
    Ok(())
}

#[test]
fn test_remove_entry_closes_gap() -> Result<()> {
    let mut conn = create_test_conn()?;
    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let id = exercise(&conn, name)?;
        ids.push(workouts::add_entry(&mut conn, w, TargetRef::Exercise(id))?);
    }
    sets::add_set(&conn, ids[1], &NewSet::default(), Utc::now())?;

    positions::remove_entry(&mut conn, PositionOwner::Workout(w), ids[1])?;
    assert_eq!(names_of(&conn, w)?, vec!["A", "C"]);
    assert_eq!(positions_of(&conn, w)?, vec![0, 1]);

    // Appending after a removal lands right after the last entry.
    let d = exercise(&conn, "D")?;
    workouts::add_entry(&mut conn, w, TargetRef::Exercise(d))?;
    assert_eq!(positions_of(&conn, w)?, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn test_group_exercise_group_round_trip_keeps_sets() -> Result<()> {
    let mut conn = create_test_conn()?;
    let bench = exercise(&conn, "Bench Press")?;
    let dumbbell = exercise(&conn, "Dumbbell Press")?;
    let group = groups::create_group(&mut conn, "Chest Press", &[bench, dumbbell])?;

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let entry = workouts::add_entry(&mut conn, w, TargetRef::Group(group))?;
    sets::add_set(
        &conn,
        entry,
        &NewSet {
            reps: Some(12),
            ..Default::default()
        },
        Utc::now(),
    )?;

    let chosen = positions::replace_group_with_exercise(&mut conn, w, group, dumbbell, 0, false)?;
    assert_eq!(chosen, entry);
    let workout = workouts::get_workout(&conn, w)?;
    assert_eq!(workout.entries[0].target.target_ref(), TargetRef::Exercise(dumbbell));
    assert_eq!(workout.entries[0].sets.len(), 1);

    let reverted = positions::replace_exercise_with_group(&mut conn, w, entry)?;
    assert_eq!(reverted, group);
    let workout = workouts::get_workout(&conn, w)?;
    let entry_after = &workout.entries[0];
    assert_eq!(entry_after.id, entry);
    assert_eq!(entry_after.target.target_ref(), TargetRef::Group(group));
    assert_eq!(entry_after.sets[0].reps, Some(12));
    Ok(())
}

#[test]
fn test_choose_exercise_validates_group_and_membership() -> Result<()> {
    let mut conn = create_test_conn()?;
    let bench = exercise(&conn, "Bench Press")?;
    let squat = exercise(&conn, "Squat")?;
    let chest = groups::create_group(&mut conn, "Chest", &[bench])?;
    let legs = groups::create_group(&mut conn, "Legs", &[squat])?;

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    workouts::add_entry(&mut conn, w, TargetRef::Group(chest))?;

    let not_member = positions::replace_group_with_exercise(&mut conn, w, chest, squat, 0, false);
    assert!(matches!(not_member, Err(DbError::ExerciseNotInGroup { .. })));

    let wrong_group = positions::replace_group_with_exercise(&mut conn, w, legs, squat, 0, false);
    assert!(matches!(wrong_group, Err(DbError::EntryTargetMismatch { .. })));

    let no_entry = positions::replace_group_with_exercise(&mut conn, w, chest, bench, 5, false);
    assert!(matches!(
        no_entry,
        Err(DbError::NoEntryAtPosition { position: 5, .. })
    ));

    // Nothing changed.
    assert_eq!(names_of(&conn, w)?, vec!["Chest"]);
    Ok(())
}

#[test]
fn test_narrow_target_retargets_expected_set() -> Result<()> {
    let mut conn = create_test_conn()?;
    let bench = exercise(&conn, "Bench Press")?;
    let incline = exercise(&conn, "Incline Press")?;
    let group = groups::create_group(&mut conn, "Press", &[bench, incline])?;

    let plan = plans::create_plan(&conn, "Push", "", Utc::now())?;
    plans::add_expected_set(
        &mut conn,
        plan,
        &NewExpectedSet {
            reps: Some(8),
            sets: Some(3),
            ..NewExpectedSet::for_target(TargetRef::Group(group))
        },
    )?;
    plans::add_expected_set(
        &mut conn,
        plan,
        &NewExpectedSet::for_target(TargetRef::Group(group)),
    )?;

    let w = workouts::create_workout_from_plan(&mut conn, plan, Utc::now())?;
    positions::replace_group_with_exercise(&mut conn, w, group, incline, 0, true)?;
    positions::replace_group_with_exercise(&mut conn, w, group, bench, 1, false)?;

    let workout = workouts::get_workout(&conn, w)?;
    let narrowed = workout.entries[0].expected.as_ref().expect("expected set");
    assert_eq!(narrowed.target.target_ref(), TargetRef::Exercise(incline));
    assert_eq!(narrowed.reps, Some(8));
    let kept = workout.entries[1].expected.as_ref().expect("expected set");
    assert_eq!(kept.target.target_ref(), TargetRef::Group(group));

    // Reverting the non-narrowed entry prefers the group its goal names.
    assert_eq!(positions::replace_exercise_with_group(&mut conn, w, workout.entries[1].id)?, group);

    // The plan itself is untouched.
    let plan = plans::require_plan(&conn, plan)?;
    assert!(plan
        .expected_sets
        .iter()
        .all(|e| e.target.target_ref() == TargetRef::Group(group)));
    Ok(())
}

#[test]
fn test_revert_without_group_creates_one() -> Result<()> {
    let mut conn = create_test_conn()?;
    let deadlift = exercise(&conn, "Deadlift")?;
    // Takes the obvious name without containing the exercise.
    groups::create_group(&mut conn, "Deadlift", &[])?;

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let entry = workouts::add_entry(&mut conn, w, TargetRef::Exercise(deadlift))?;

    let group_id = positions::replace_exercise_with_group(&mut conn, w, entry)?;
    let group = groups::require_group(&conn, group_id)?;
    assert_eq!(group.name, "Deadlift (2)");
    assert!(group.contains(deadlift));

    let again = positions::replace_exercise_with_group(&mut conn, w, entry);
    assert!(matches!(again, Err(DbError::EntryTargetMismatch { .. })));
    Ok(())
}

#[test]
fn test_delete_exercise_cascades_and_compacts() -> Result<()> {
    let mut conn = create_test_conn()?;
    let a = exercise(&conn, "A")?;
    let b = exercise(&conn, "B")?;
    let c = exercise(&conn, "C")?;
    let group = groups::create_group(&mut conn, "AB", &[a, b])?;

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    workouts::add_entry(&mut conn, w, TargetRef::Exercise(a))?;
    let b_entry = workouts::add_entry(&mut conn, w, TargetRef::Exercise(b))?;
    workouts::add_entry(&mut conn, w, TargetRef::Exercise(c))?;
    let set_id = sets::add_set(&conn, b_entry, &NewSet::default(), Utc::now())?;

    let plan = plans::create_plan(&conn, "Plan", "", Utc::now())?;
    plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Exercise(b)))?;
    plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Exercise(c)))?;

    exercises::delete_exercise(&mut conn, b)?;

    assert_eq!(names_of(&conn, w)?, vec!["A", "C"]);
    assert_eq!(positions_of(&conn, w)?, vec![0, 1]);
    assert!(matches!(sets::get_set(&conn, set_id), Err(DbError::SetNotFound(_))));
    assert_eq!(groups::require_group(&conn, group)?.exercises.len(), 1);

    let plan = plans::require_plan(&conn, plan)?;
    assert_eq!(plan.expected_sets.len(), 1);
    assert_eq!(plan.expected_sets[0].position, 0);

    assert!(matches!(
        exercises::delete_exercise(&mut conn, b),
        Err(DbError::ExerciseNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_delete_group_removes_placeholders() -> Result<()> {
    let mut conn = create_test_conn()?;
    let a = exercise(&conn, "A")?;
    let group = groups::create_group(&mut conn, "Any", &[a])?;

    let plan = plans::create_plan(&conn, "Plan", "", Utc::now())?;
    plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Group(group)))?;
    plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Exercise(a)))?;

    groups::delete_group(&mut conn, group)?;

    let plan = plans::require_plan(&conn, plan)?;
    assert_eq!(plan.expected_sets.len(), 1);
    assert_eq!(plan.expected_sets[0].position, 0);
    assert!(matches!(plan.expected_sets[0].target, EntryTarget::Exercise(_)));
    assert!(matches!(
        groups::delete_group(&mut conn, group),
        Err(DbError::GroupNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_group_membership_and_names() -> Result<()> {
    let mut conn = create_test_conn()?;
    let a = exercise(&conn, "A")?;
    let b = exercise(&conn, "B")?;
    let group = groups::create_group(&mut conn, "Pick", &[a])?;

    groups::add_member(&conn, group, b)?;
    groups::add_member(&conn, group, b)?;
    assert_eq!(groups::require_group(&conn, group)?.exercises.len(), 2);

    groups::remove_member(&conn, group, a)?;
    assert!(matches!(
        groups::remove_member(&conn, group, a),
        Err(DbError::ExerciseNotInGroup { .. })
    ));

    groups::create_group(&mut conn, "Other", &[])?;
    assert!(matches!(
        groups::rename_group(&conn, group, "other"),
        Err(DbError::GroupNameNotUnique(_))
    ));
    groups::rename_group(&conn, group, "Picked")?;
    assert!(groups::get_group_by_name(&conn, "PICKED")?.is_some());

    // A missing member aborts the whole group.
    assert!(groups::create_group(&mut conn, "Broken", &[a, 999]).is_err());
    assert!(groups::get_group_by_name(&conn, "Broken")?.is_none());
    Ok(())
}

#[test]
fn test_plan_to_workout_copies_goals() -> Result<()> {
    let mut conn = create_test_conn()?;
    let bench = exercise(&conn, "Bench Press")?;
    let squat = exercise(&conn, "Squat")?;

    let plan = plans::create_plan(&conn, "Full Body", "twice a week", Utc::now())?;
    let first = plans::add_expected_set(
        &mut conn,
        plan,
        &NewExpectedSet {
            reps: Some(5),
            sets: Some(5),
            ..NewExpectedSet::for_target(TargetRef::Exercise(squat))
        },
    )?;
    plans::add_expected_set(
        &mut conn,
        plan,
        &NewExpectedSet {
            reps: Some(8),
            rep_range_top: Some(12),
            ..NewExpectedSet::for_target(TargetRef::Exercise(bench))
        },
    )?;
    plans::swap_expected_set_position(&mut conn, plan, first, 1)?;

    let w = workouts::create_workout_from_plan(&mut conn, plan, Utc::now())?;
    let workout = workouts::get_workout(&conn, w)?;
    assert_eq!(workout.plan_id, Some(plan));
    assert_eq!(names_of(&conn, w)?, vec!["Bench Press", "Squat"]);
    let goals: Vec<(Option<i64>, Option<i64>)> = workout
        .entries
        .iter()
        .map(|e| {
            let expected = e.expected.as_ref().expect("copied goal");
            (expected.reps, expected.sets)
        })
        .collect();
    assert_eq!(goals, vec![(Some(8), None), (Some(5), Some(5))]);

    // Removing the goal in the workout keeps the entry.
    let workout_goal = workout.entries[0].expected.as_ref().map(|e| e.id).unwrap_or_default();
    plans::remove_expected_set(&mut conn, workout_goal)?;
    let workout = workouts::get_workout(&conn, w)?;
    assert_eq!(workout.entries.len(), 2);
    assert!(workout.entries[0].expected.is_none());

    // Removing it in the plan drops the entry and compacts.
    plans::remove_expected_set(&mut conn, first)?;
    let plan_after = plans::require_plan(&conn, plan)?;
    assert_eq!(plan_after.expected_sets.len(), 1);
    assert_eq!(plan_after.expected_sets[0].position, 0);

    let filtered = workouts::list_workouts(
        &conn,
        &WorkoutFilters {
            plan_id: Some(plan),
            ..Default::default()
        },
    )?;
    assert_eq!(filtered.len(), 1);

    plans::delete_plan(&conn, plan)?;
    assert_eq!(workouts::get_workout(&conn, w)?.plan_id, None);
    Ok(())
}

#[test]
fn test_swap_expected_set_under_wrong_plan_reports_expected_id() -> Result<()> {
    let mut conn = create_test_conn()?;
    let squat = exercise(&conn, "Squat")?;
    let legs = plans::create_plan(&conn, "Legs", "", Utc::now())?;
    let push = plans::create_plan(&conn, "Push", "", Utc::now())?;
    let expected = plans::add_expected_set(&mut conn, legs, &NewExpectedSet::for_target(TargetRef::Exercise(squat)))?;
    plans::add_expected_set(&mut conn, push, &NewExpectedSet::for_target(TargetRef::Exercise(squat)))?;

    let moved = plans::swap_expected_set_position(&mut conn, push, expected, 0);
    assert!(matches!(moved, Err(DbError::ExpectedSetNotFound(id)) if id == expected));

    let missing = plans::swap_expected_set_position(&mut conn, legs, 999, 0);
    assert!(matches!(missing, Err(DbError::ExpectedSetNotFound(999))));

    let out_of_range = plans::swap_expected_set_position(&mut conn, legs, expected, 1);
    assert!(matches!(
        out_of_range,
        Err(DbError::PositionOutOfRange { position: 1, len: 1 })
    ));
    Ok(())
}

#[test]
fn test_retarget_expected_set_in_plan_moves_entry() -> Result<()> {
    let mut conn = create_test_conn()?;
    let a = exercise(&conn, "A")?;
    let b = exercise(&conn, "B")?;
    let plan = plans::create_plan(&conn, "P", "", Utc::now())?;
    let expected = plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Exercise(a)))?;

    plans::update_expected_set(
        &mut conn,
        expected,
        &ExpectedSetUpdate {
            target: Some(TargetRef::Exercise(b)),
            note: Some(Some("pause at the bottom".to_string())),
            ..Default::default()
        },
    )?;
    let plan = plans::require_plan(&conn, plan)?;
    assert_eq!(plan.expected_sets[0].target.name(), "B");
    assert_eq!(plan.expected_sets[0].note.as_deref(), Some("pause at the bottom"));
    assert_eq!(positions::ordered_entry_ids(&conn, PositionOwner::Plan(plan.id))?.len(), 1);
    Ok(())
}

#[test]
fn test_sets_completion_and_history() -> Result<()> {
    let mut conn = create_test_conn()?;
    let squat = exercise(&conn, "Squat")?;
    let plan = plans::create_plan(&conn, "P", "", Utc::now())?;
    plans::add_expected_set(&mut conn, plan, &NewExpectedSet::for_target(TargetRef::Exercise(squat)))?;
    let plan_entry = positions::ordered_entry_ids(&conn, PositionOwner::Plan(plan))?[0];
    assert!(matches!(
        sets::add_set(&conn, plan_entry, &NewSet::default(), Utc::now()),
        Err(DbError::EntryNotFound(_))
    ));

    let w = workouts::create_workout(&conn, None, Utc::now())?;
    let entry = workouts::add_entry(&mut conn, w, TargetRef::Exercise(squat))?;
    let done = sets::add_set(&conn, entry, &NewSet::default(), Utc::now())?;
    let pending = sets::add_set(&conn, entry, &NewSet::default(), Utc::now())?;

    sets::update_set(
        &conn,
        done,
        &SetUpdate {
            reps: Some(Some(5)),
            weight: Some(Some(Weight::from_kg(100.0))),
            ..Default::default()
        },
    )?;
    sets::set_completion(&conn, done, Some(Utc::now()))?;

    let history = sets::completed_sets_for_exercise(&conn, squat)?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].set.id, done);
    assert_eq!(history[0].workout_id, w);
    assert!((history[0].set.weight.map_or(0.0, |w| w.lb) - 220.462).abs() < 0.01);

    sets::set_completion(&conn, done, None)?;
    assert!(sets::completed_sets_for_exercise(&conn, squat)?.is_empty());
    assert!(sets::get_set(&conn, done)?.completed_at.is_none());

    sets::delete_set(&conn, pending)?;
    assert!(matches!(sets::delete_set(&conn, pending), Err(DbError::SetNotFound(_))));
    Ok(())
}

#[test]
fn test_workout_lifecycle_and_filters() -> Result<()> {
    let conn = create_test_conn()?;
    let now = Utc::now();
    let old = workouts::create_workout(&conn, Some("legs"), now - Duration::days(2))?;
    let new = workouts::create_workout(&conn, None, now)?;
    workouts::set_workout_completed(&conn, old, Some(now - Duration::days(2)))?;

    let all = workouts::list_workouts(&conn, &WorkoutFilters::default())?;
    assert_eq!(all.iter().map(|w| w.id).collect::<Vec<_>>(), vec![new, old]);

    let open = workouts::list_workouts(
        &conn,
        &WorkoutFilters {
            completed: Some(false),
            ..Default::default()
        },
    )?;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, new);

    workouts::update_workout_note(&conn, new, Some("push"))?;
    assert_eq!(workouts::get_workout(&conn, new)?.note.as_deref(), Some("push"));

    workouts::update_workout_note(&conn, new, Some("  "))?;
    assert_eq!(workouts::get_workout(&conn, new)?.note, None);
    let blank = workouts::create_workout(&conn, Some(""), now)?;
    assert_eq!(workouts::get_workout(&conn, blank)?.note, None);

    workouts::delete_workout(&conn, old)?;
    assert!(matches!(
        workouts::get_workout(&conn, old),
        Err(DbError::WorkoutNotFound(_))
    ));
    Ok(())
}

fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}

#[test]
fn test_delete_workout_removes_entries_and_sets() -> Result<()> {
    let mut conn = create_test_conn()?;
    let squat = exercise(&conn, "Squat")?;
    let plan = plans::create_plan(&conn, "Legs", "", Utc::now())?;
    plans::add_expected_set(
        &mut conn,
        plan,
        &NewExpectedSet {
            reps: Some(5),
            ..NewExpectedSet::for_target(TargetRef::Exercise(squat))
        },
    )?;

    let doomed = workouts::create_workout_from_plan(&mut conn, plan, Utc::now())?;
    let kept = workouts::create_workout(&conn, None, Utc::now())?;
    let entry = workouts::get_workout(&conn, doomed)?.entries[0].id;
    workouts::add_entry(&mut conn, doomed, TargetRef::Exercise(squat))?;
    let kept_entry = workouts::add_entry(&mut conn, kept, TargetRef::Exercise(squat))?;
    for reps in [5, 5, 3] {
        sets::add_set(
            &conn,
            entry,
            &NewSet {
                reps: Some(reps),
                ..Default::default()
            },
            Utc::now(),
        )?;
    }
    sets::add_set(&conn, kept_entry, &NewSet::default(), Utc::now())?;

    // Plan entry + its goal, both workout entries of `doomed`, and `kept`.
    assert_eq!(count_rows(&conn, "positions")?, 4);
    assert_eq!(count_rows(&conn, "expected_sets")?, 2);
    assert_eq!(count_rows(&conn, "exercise_sets")?, 4);

    workouts::delete_workout(&conn, doomed)?;

    let orphans: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM positions WHERE workout_id = ?1)
              + (SELECT COUNT(*) FROM expected_sets e JOIN positions p ON p.id = e.position_id WHERE p.workout_id = ?1)
              + (SELECT COUNT(*) FROM exercise_sets s LEFT JOIN positions p ON p.id = s.position_id WHERE p.id IS NULL)",
        [doomed],
        |row| row.get(0),
    )?;
    assert_eq!(orphans, 0);
    assert_eq!(count_rows(&conn, "positions")?, 2);
    assert_eq!(count_rows(&conn, "expected_sets")?, 1);
    assert_eq!(count_rows(&conn, "exercise_sets")?, 1);
    assert_eq!(positions_of(&conn, kept)?, vec![0]);
    assert_eq!(plans::require_plan(&conn, plan)?.expected_sets.len(), 1);
    Ok(())
}

#[test]
fn test_migration_from_v1_keeps_history() -> Result<()> {
    let mut conn = Connection::open_in_memory()?;
    db::migrate_to(&mut conn, 1)?;
    assert_eq!(db::schema_version(&conn)?, 1);

    let ts = "2024-01-01T10:00:00.000000Z";
    conn.execute_batch(&format!(
        "INSERT INTO exercises (id, name, muscles, category) VALUES
            (1, 'Bench Press', 'chest', 'chest'),
            (2, 'Squat', 'legs', 'legs');
         INSERT INTO workout_plans (id, created_at, name) VALUES (1, '{ts}', 'Push');
         INSERT INTO exercise_goals (plan_id, exercise_id, position, reps, sets) VALUES (1, 1, 3, 8, 3);
         INSERT INTO workouts (id, created_at, plan_id) VALUES (1, '{ts}', 1);
         INSERT INTO exercise_sets (workout_id, exercise_id, position, reps, weight_kg, completed, set_type, created_at) VALUES
            (1, 1, 0, 10, 60.0, 1, 'working', '{ts}'),
            (1, 1, 0, 8, 65.0, 1, 'working', '{ts}'),
            (1, 2, 2, 5, 100.0, 0, 'working', '{ts}');"
    ))?;

    db::init_db(&mut conn)?;
    assert_eq!(db::schema_version(&conn)?, db::LATEST_SCHEMA_VERSION);

    let workout = workouts::get_workout(&conn, 1)?;
    assert_eq!(workout.plan_id, Some(1));
    let shape: Vec<(u32, String, usize)> = workout
        .entries
        .iter()
        .map(|e| (e.position, e.target.name().to_string(), e.sets.len()))
        .collect();
    assert_eq!(
        shape,
        vec![(0, "Bench Press".to_string(), 2), (1, "Squat".to_string(), 1)]
    );
    let first = &workout.entries[0].sets[0];
    assert!((first.weight.map_or(0.0, |w| w.lb) - 132.277).abs() < 0.01);

    let plan = plans::require_plan(&conn, 1)?;
    assert_eq!(plan.expected_sets.len(), 1);
    assert_eq!(plan.expected_sets[0].position, 0);
    assert_eq!(plan.expected_sets[0].reps, Some(8));

    // The migrated schema accepts new work.
    let e = workouts::add_entry(&mut conn, 1, TargetRef::Exercise(2))?;
    positions::swap_entry_position(&mut conn, PositionOwner::Workout(1), e, 0)?;
    assert_eq!(positions_of(&conn, 1)?, vec![0, 1, 2]);
    Ok(())
}

fn populate(conn: &mut Connection) -> Result<i64> {
    let bench = exercises::create_exercise(
        conn,
        &NewExercise {
            name: "Bench Press".to_string(),
            muscles: vec!["chest".to_string()],
            category: Category::Chest,
            equipment: Some("barbell".to_string()),
            thumbnail: None,
        },
    )?;
    let incline = exercise(conn, "Incline Press")?;
    exercise(conn, "Unused")?;
    let group = groups::create_group(conn, "Press", &[bench, incline])?;
    groups::create_group(conn, "Empty", &[])?;

    let started = Utc::now() - Duration::days(1);
    let w = workouts::create_workout(conn, Some("heavy day"), started)?;
    let entry = workouts::add_entry(conn, w, TargetRef::Exercise(bench))?;
    workouts::add_entry(conn, w, TargetRef::Group(group))?;
    let set = sets::add_set(
        conn,
        entry,
        &NewSet {
            reps: Some(5),
            weight: Some(Weight::from_lb(225.0)),
            rpe: Some(8.5),
            ..Default::default()
        },
        started,
    )?;
    sets::set_completion(conn, set, Some(started + Duration::minutes(5)))?;
    sets::add_set(conn, entry, &NewSet::default(), started)?;
    workouts::set_workout_completed(conn, w, Some(started + Duration::hours(1)))?;
    workouts::create_workout(conn, Some(""), Utc::now())?;
    Ok(w)
}

#[test]
fn test_csv_round_trip() -> Result<()> {
    let mut source = create_test_conn()?;
    let w = populate(&mut source)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("journal.csv");
    let written = transfer::export_csv_file(&source, &path)?;
    assert!(written > 0);

    let mut target = create_test_conn()?;
    let report = transfer::import_csv_file(&mut target, &path)?;
    assert_eq!(report.imported, report.total);
    assert_eq!(report.total, written);
    assert_eq!(report.fraction(), 1.0);

    let names = |conn: &Connection| -> Result<Vec<String>> {
        Ok(exercises::list_exercises(conn, &Default::default())?
            .into_iter()
            .map(|e| e.name)
            .collect())
    };
    assert_eq!(names(&target)?, names(&source)?);
    let bench = exercises::get_exercise_by_name(&target, "Bench Press")?.expect("bench");
    assert_eq!(bench.category, Category::Chest);
    assert_eq!(bench.equipment.as_deref(), Some("barbell"));

    let press = groups::get_group_by_name(&target, "Press")?.expect("group");
    assert_eq!(press.exercises.len(), 2);
    assert!(groups::get_group_by_name(&target, "Empty")?.is_some());

    let before = workouts::get_workout(&source, w)?;
    let imported = workouts::list_workouts(&target, &WorkoutFilters::default())?;
    assert_eq!(imported.len(), 2);
    let after = imported
        .iter()
        .find(|x| x.note.as_deref() == Some("heavy day"))
        .expect("imported workout");

    let unnoted = |conn: &Connection| -> Result<Vec<Option<String>>> {
        Ok(workouts::list_workouts(conn, &WorkoutFilters::default())?
            .into_iter()
            .filter(|x| x.entries.is_empty())
            .map(|x| x.note)
            .collect())
    };
    assert_eq!(unnoted(&source)?, vec![None]);
    assert_eq!(unnoted(&target)?, unnoted(&source)?);

    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.completed_at, before.completed_at);
    assert_eq!(after.entries.len(), before.entries.len());
    for (a, b) in after.entries.iter().zip(&before.entries) {
        assert_eq!(a.position, b.position);
        assert_eq!(a.target.name(), b.target.name());
        assert_eq!(a.sets.len(), b.sets.len());
        for (sa, sb) in a.sets.iter().zip(&b.sets) {
            assert_eq!(sa.reps, sb.reps);
            assert_eq!(sa.rpe, sb.rpe);
            assert_eq!(sa.completed, sb.completed);
            assert_eq!(sa.completed_at, sb.completed_at);
            assert_eq!(sa.created_at, sb.created_at);
            assert_eq!(sa.weight.map(|w| w.lb), sb.weight.map(|w| w.lb));
        }
    }
    Ok(())
}

const CSV_HEADER: [&str; 20] = [
    "workout_id",
    "workout_created_at",
    "workout_completed_at",
    "workout_note",
    "position",
    "exercise",
    "group",
    "muscles",
    "category",
    "equipment",
    "thumbnail",
    "reps",
    "weight_kg",
    "weight_lb",
    "rir",
    "rpe",
    "completed",
    "completed_at",
    "set_type",
    "set_created_at",
];

fn csv_line(fields: &[(&str, &str)]) -> String {
    CSV_HEADER
        .iter()
        .map(|column| {
            fields
                .iter()
                .find(|(name, _)| name == column)
                .map_or("", |(_, value)| *value)
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[test]
fn test_import_skips_bad_records_atomically() -> Result<()> {
    let mut conn = create_test_conn()?;
    let created = "2024-05-01T08:00:00.000000Z";
    let lines = [
        CSV_HEADER.join(","),
        csv_line(&[("exercise", "Squat"), ("muscles", "legs"), ("category", "legs")]),
        // Entry without a position: the workout it would create is rolled back too.
        csv_line(&[("workout_id", "7"), ("workout_created_at", created), ("exercise", "Squat")]),
        // Neither exercise nor group.
        csv_line(&[("muscles", "chest")]),
        // Not a number.
        csv_line(&[("workout_id", "7"), ("position", "0"), ("exercise", "Squat"), ("reps", "five")]),
        csv_line(&[
            ("workout_id", "7"),
            ("workout_created_at", created),
            ("position", "0"),
            ("exercise", "Squat"),
            ("reps", "5"),
            ("weight_kg", "100"),
            ("completed", "true"),
        ]),
    ];
    let data = lines.join("\n");

    let report = transfer::import_csv(&mut conn, data.as_bytes())?;
    assert_eq!(report.total, 5);
    assert_eq!(report.imported, 2);
    assert!((report.fraction() - 0.4).abs() < 1e-9);

    let all = workouts::list_workouts(&conn, &WorkoutFilters::default())?;
    assert_eq!(all.len(), 1);
    let entry = &all[0].entries[0];
    assert_eq!(entry.target.name(), "Squat");
    assert_eq!(entry.sets.len(), 1);
    assert!(entry.sets[0].completed);
    // Completion falls back to the set's creation time.
    assert_eq!(entry.sets[0].completed_at, Some(entry.sets[0].created_at));
    assert_eq!(
        exercises::get_exercise_by_name(&conn, "squat")?.map(|e| e.category),
        Some(Category::Legs)
    );
    Ok(())
}

#[test]
fn test_backup_and_restore() -> Result<()> {
    let mut conn = create_test_conn()?;
    exercise(&conn, "Squat")?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("backup.sqlite");
    transfer::backup(&conn, &path)?;

    exercise(&conn, "Deadlift")?;
    assert_eq!(exercises::list_exercises(&conn, &Default::default())?.len(), 2);

    transfer::restore(&mut conn, &path)?;
    let names: Vec<String> = exercises::list_exercises(&conn, &Default::default())?
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["Squat"]);
    assert_eq!(db::schema_version(&conn)?, db::LATEST_SCHEMA_VERSION);

    let missing = transfer::restore(&mut conn, &dir.path().join("nope.sqlite"));
    assert!(matches!(missing, Err(transfer::Error::Io(_))));
    Ok(())
}
