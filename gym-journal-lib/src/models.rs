//src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::config::Units;

pub const LB_PER_KG: f64 = 2.204_622_6;

/// Broad body region an exercise trains. Matches the catalog's category list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Abs,
    Arms,
    Back,
    Calves,
    Cardio,
    Chest,
    Legs,
    Shoulders,
    #[default]
    Other,
}

impl Category {
    /// Maps a remote catalog category id onto a local category.
    pub const fn from_catalog_id(id: u32) -> Self {
        match id {
            8 => Self::Arms,
            9 => Self::Legs,
            10 => Self::Abs,
            11 => Self::Chest,
            12 => Self::Back,
            13 => Self::Shoulders,
            14 => Self::Calves,
            15 => Self::Cardio,
            _ => Self::Other,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum SetType {
    WarmUp,
    #[default]
    Working,
    Drop,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub muscles: Vec<String>,
    pub category: Category,
    pub equipment: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub muscles: Vec<String>,
    pub category: Category,
    pub equipment: Option<String>,
    pub thumbnail: Option<String>,
}

/// Partial update; `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub muscles: Option<Vec<String>>,
    pub category: Option<Category>,
    pub equipment: Option<Option<String>>,
    pub thumbnail: Option<Option<String>>,
}

impl ExerciseUpdate {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.muscles.is_none()
            && self.category.is_none()
            && self.equipment.is_none()
            && self.thumbnail.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseGroup {
    pub id: i64,
    pub name: String,
    pub exercises: Vec<Exercise>,
}

impl ExerciseGroup {
    pub fn contains(&self, exercise_id: i64) -> bool {
        self.exercises.iter().any(|e| e.id == exercise_id)
    }
}

/// What an entry points at: a concrete exercise or a group to pick from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryTarget {
    Exercise(Exercise),
    Group(ExerciseGroup),
}

impl EntryTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Exercise(e) => &e.name,
            Self::Group(g) => &g.name,
        }
    }

    pub const fn target_ref(&self) -> TargetRef {
        match self {
            Self::Exercise(e) => TargetRef::Exercise(e.id),
            Self::Group(g) => TargetRef::Group(g.id),
        }
    }

    pub const fn as_exercise(&self) -> Option<&Exercise> {
        match self {
            Self::Exercise(e) => Some(e),
            Self::Group(_) => None,
        }
    }

    pub const fn as_group(&self) -> Option<&ExerciseGroup> {
        match self {
            Self::Group(g) => Some(g),
            Self::Exercise(_) => None,
        }
    }
}

/// Id-only form of [`EntryTarget`], used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRef {
    Exercise(i64),
    Group(i64),
}

impl TargetRef {
    pub(crate) const fn columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::Exercise(id) => (Some(id), None),
            Self::Group(id) => (None, Some(id)),
        }
    }
}

/// Owner of an ordered list of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionOwner {
    Workout(i64),
    Plan(i64),
}

/// Weight is kept in both units so either can be displayed without drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub lb: f64,
    pub kg: f64,
}

impl Weight {
    pub fn from_kg(kg: f64) -> Self {
        Self {
            lb: kg * LB_PER_KG,
            kg,
        }
    }

    pub fn from_lb(lb: f64) -> Self {
        Self {
            lb,
            kg: lb / LB_PER_KG,
        }
    }

    pub fn from_units(value: f64, units: Units) -> Self {
        match units {
            Units::Metric => Self::from_kg(value),
            Units::Imperial => Self::from_lb(value),
        }
    }

    pub const fn in_units(&self, units: Units) -> f64 {
        match units {
            Units::Metric => self.kg,
            Units::Imperial => self.lb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub id: i64,
    pub entry_id: i64,
    pub reps: Option<i64>,
    pub weight: Option<Weight>,
    pub rir: Option<i64>,
    pub rpe: Option<f64>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub set_type: SetType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSet {
    pub reps: Option<i64>,
    pub weight: Option<Weight>,
    pub rir: Option<i64>,
    pub rpe: Option<f64>,
    pub set_type: SetType,
}

#[derive(Debug, Clone, Default)]
pub struct SetUpdate {
    pub reps: Option<Option<i64>>,
    pub weight: Option<Option<Weight>>,
    pub rir: Option<Option<i64>>,
    pub rpe: Option<Option<f64>>,
    pub set_type: Option<SetType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedSet {
    pub id: i64,
    pub position: u32,
    pub target: EntryTarget,
    pub reps: Option<i64>,
    pub sets: Option<i64>,
    pub rep_range_top: Option<i64>,
    pub rpe: Option<f64>,
    pub rir: Option<i64>,
    pub note: Option<String>,
    pub set_type: SetType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpectedSet {
    pub target: TargetRef,
    pub reps: Option<i64>,
    pub sets: Option<i64>,
    pub rep_range_top: Option<i64>,
    pub rpe: Option<f64>,
    pub rir: Option<i64>,
    pub note: Option<String>,
    pub set_type: SetType,
}

impl NewExpectedSet {
    pub const fn for_target(target: TargetRef) -> Self {
        Self {
            target,
            reps: None,
            sets: None,
            rep_range_top: None,
            rpe: None,
            rir: None,
            note: None,
            set_type: SetType::Working,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpectedSetUpdate {
    pub target: Option<TargetRef>,
    pub reps: Option<Option<i64>>,
    pub sets: Option<Option<i64>>,
    pub rep_range_top: Option<Option<i64>>,
    pub rpe: Option<Option<f64>>,
    pub rir: Option<Option<i64>>,
    pub note: Option<Option<String>>,
    pub set_type: Option<SetType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    pub id: i64,
    pub position: u32,
    pub target: EntryTarget,
    pub expected: Option<ExpectedSet>,
    pub sets: Vec<ExerciseSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub plan_id: Option<i64>,
    pub entries: Vec<WorkoutEntry>,
}

impl Workout {
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn entry(&self, entry_id: i64) -> Option<&WorkoutEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub fn entry_at(&self, position: u32) -> Option<&WorkoutEntry> {
        self.entries.iter().find(|e| e.position == position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub note: String,
    pub expected_sets: Vec<ExpectedSet>,
}

#[derive(Default, Debug, Clone)]
pub struct WorkoutFilters {
    pub completed: Option<bool>,
    pub plan_id: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Default, Debug, Clone)]
pub struct ExerciseFilters {
    pub name: Option<String>, // substring, case-insensitive
    pub muscle: Option<String>,
    pub category: Option<Category>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn weight_keeps_both_units() {
        let w = Weight::from_lb(135.0);
        assert!((w.kg - 61.235).abs() < 0.01);
        assert!((Weight::from_kg(w.kg).lb - 135.0).abs() < 1e-9);
        assert_eq!(w.in_units(Units::Imperial), 135.0);
    }

    #[test]
    fn set_type_string_forms() {
        assert_eq!(SetType::WarmUp.to_string(), "warm-up");
        assert_eq!(SetType::from_str("Warm-Up").unwrap(), SetType::WarmUp);
        assert_eq!(Category::from_str("CHEST").unwrap(), Category::Chest);
        assert_eq!(Category::from_catalog_id(11), Category::Chest);
        assert_eq!(Category::from_catalog_id(99), Category::Other);
    }
}
