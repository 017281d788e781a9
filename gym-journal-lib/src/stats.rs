//src/stats.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::sets::SetRecord;

// Improvements closer than this count as equal.
const TIE_EPSILON: f64 = 1e-9;

/// Epley estimate: weight × (1 + reps / 30). A single rep is the weight itself.
pub fn estimate_one_rep_max(weight: f64, reps: i64) -> Option<f64> {
    if weight <= 0.0 || reps <= 0 {
        return None;
    }
    if reps == 1 {
        return Some(weight);
    }
    Some(weight * (1.0 + reps as f64 / 30.0))
}

fn record_e1rm(record: &SetRecord) -> Option<f64> {
    let weight = record.set.weight?;
    estimate_one_rep_max(weight.kg, record.set.reps?)
}

/// Best estimated 1RM (kg) reached in one workout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPoint {
    pub workout_id: i64,
    pub date: DateTime<Utc>,
    pub best_e1rm_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Improvement {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub first: ProgressPoint,
    pub last: ProgressPoint,
    /// Relative change, 0.1 == +10 %.
    pub improvement: f64,
}

/// Collapses completed sets into one point per workout, oldest first.
/// Sets without both weight and reps are ignored.
pub fn progress(records: &[SetRecord]) -> Vec<ProgressPoint> {
    let mut by_workout: BTreeMap<(DateTime<Utc>, i64), f64> = BTreeMap::new();
    for record in records {
        let Some(e1rm) = record_e1rm(record) else {
            continue;
        };
        let best = by_workout
            .entry((record.workout_created_at, record.workout_id))
            .or_insert(e1rm);
        if e1rm > *best {
            *best = e1rm;
        }
    }
    by_workout
        .into_iter()
        .map(|((date, workout_id), best_e1rm_kg)| ProgressPoint {
            workout_id,
            date,
            best_e1rm_kg,
        })
        .collect()
}

/// Exercise whose best estimated 1RM grew the most between its first and
/// last workout in `records`. Needs at least two workouts per exercise and a
/// positive change; ties go to the alphabetically first name.
pub fn most_improved(records: &[SetRecord]) -> Option<Improvement> {
    let mut per_exercise: BTreeMap<i64, (String, Vec<SetRecord>)> = BTreeMap::new();
    for record in records {
        per_exercise
            .entry(record.exercise_id)
            .or_insert_with(|| (record.exercise_name.clone(), Vec::new()))
            .1
            .push(record.clone());
    }

    let mut best: Option<Improvement> = None;
    for (exercise_id, (exercise_name, sets)) in per_exercise {
        let points = progress(&sets);
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            continue;
        };
        if points.len() < 2 {
            continue;
        }
        let improvement = (last.best_e1rm_kg - first.best_e1rm_kg) / first.best_e1rm_kg;
        if improvement <= 0.0 {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                let delta = improvement - current.improvement;
                delta > TIE_EPSILON || (delta.abs() <= TIE_EPSILON && exercise_name < current.exercise_name)
            }
        };
        if better {
            best = Some(Improvement {
                exercise_id,
                exercise_name,
                first: first.clone(),
                last: last.clone(),
                improvement,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExerciseSet, SetType, Weight};
    use chrono::TimeZone;

    fn record(exercise_id: i64, name: &str, workout_id: i64, day: u32, kg: f64, reps: i64) -> SetRecord {
        let date = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        SetRecord {
            exercise_id,
            exercise_name: name.to_string(),
            workout_id,
            workout_created_at: date,
            set: ExerciseSet {
                id: workout_id * 100 + reps,
                entry_id: workout_id,
                reps: Some(reps),
                weight: Some(Weight::from_kg(kg)),
                rir: None,
                rpe: None,
                completed: true,
                completed_at: Some(date),
                set_type: SetType::Working,
                created_at: date,
            },
        }
    }

    #[test]
    fn epley_estimates() {
        assert_eq!(estimate_one_rep_max(100.0, 1), Some(100.0));
        assert_eq!(estimate_one_rep_max(100.0, 10), Some(100.0 * (1.0 + 10.0 / 30.0)));
        assert_eq!(estimate_one_rep_max(0.0, 5), None);
        assert_eq!(estimate_one_rep_max(60.0, 0), None);
    }

    #[test]
    fn progress_keeps_best_set_per_workout() {
        let records = vec![
            record(1, "Squat", 1, 1, 100.0, 5),
            record(1, "Squat", 1, 1, 110.0, 1),
            record(1, "Squat", 2, 8, 105.0, 5),
        ];
        let points = progress(&records);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].workout_id, 1);
        assert!((points[0].best_e1rm_kg - 116.666).abs() < 0.01);
        assert!(points[1].best_e1rm_kg > points[0].best_e1rm_kg);
    }

    #[test]
    fn most_improved_needs_two_workouts_and_growth() {
        let records = vec![
            record(1, "Squat", 1, 1, 100.0, 5),
            record(1, "Squat", 2, 8, 110.0, 5),
            record(2, "Bench Press", 1, 1, 80.0, 5),
            record(2, "Bench Press", 2, 8, 82.0, 5),
            // Only one workout: not a candidate.
            record(3, "Deadlift", 2, 8, 200.0, 1),
            // Regressed: not a candidate.
            record(4, "Row", 1, 1, 70.0, 8),
            record(4, "Row", 2, 8, 60.0, 8),
        ];
        let best = most_improved(&records).unwrap();
        assert_eq!(best.exercise_name, "Squat");
        assert!((best.improvement - 0.1).abs() < 1e-9);
        assert_eq!(best.first.workout_id, 1);
        assert_eq!(best.last.workout_id, 2);
    }

    #[test]
    fn most_improved_breaks_ties_on_name() {
        let records = vec![
            record(1, "Squat", 1, 1, 100.0, 5),
            record(1, "Squat", 2, 8, 110.0, 5),
            record(2, "Bench Press", 1, 1, 50.0, 5),
            record(2, "Bench Press", 2, 8, 55.0, 5),
        ];
        assert_eq!(most_improved(&records).unwrap().exercise_name, "Bench Press");
        assert!(most_improved(&[]).is_none());
    }
}
