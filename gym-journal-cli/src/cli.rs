// src/cli.rs
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "A gym journal: log workouts, plan sessions, track progress", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryCli {
    Abs,
    Arms,
    Back,
    Calves,
    Cardio,
    Chest,
    Legs,
    Shoulders,
    Other,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetTypeCli {
    WarmUp,
    Working,
    Drop,
    Failure,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitsCli {
    Metric,
    Imperial,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage exercises
    #[command(subcommand)]
    Exercise(ExerciseCommand),
    /// Manage exercise groups ("pick one of these")
    #[command(subcommand)]
    Group(GroupCommand),
    /// Start, list and finish workouts
    #[command(subcommand)]
    Workout(WorkoutCommand),
    /// Add, remove, reorder and exchange workout entries
    #[command(subcommand)]
    Entry(EntryCommand),
    /// Log and edit sets
    #[command(subcommand)]
    Set(SetCommand),
    /// Manage workout plans
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Progress statistics
    #[command(subcommand)]
    Stats(StatsCommand),
    /// Query the remote exercise catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Export everything to a CSV file
    Export { path: PathBuf },
    /// Import a CSV file produced by `export`
    Import { path: PathBuf },
    /// Copy the database to a file
    Backup { path: PathBuf },
    /// Replace the database with a backup
    Restore { path: PathBuf },
    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct ExerciseFields {
    /// Comma-separated muscles (e.g., "chest,triceps")
    #[arg(short, long)]
    pub muscles: Option<String>,
    #[arg(short, long, value_enum)]
    pub category: Option<CategoryCli>,
    #[arg(short, long)]
    pub equipment: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ExerciseCommand {
    /// Define a new exercise
    Add {
        name: String,
        #[command(flatten)]
        fields: ExerciseFields,
    },
    /// List exercises
    List {
        /// Name substring
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        muscle: Option<String>,
        #[arg(short, long, value_enum)]
        category: Option<CategoryCli>,
    },
    Show {
        /// Exercise ID or name
        identifier: String,
    },
    Edit {
        /// Exercise ID or name
        identifier: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ExerciseFields,
    },
    /// Delete an exercise and every entry that uses it
    Delete { identifier: String },
    /// List every muscle mentioned by an exercise
    Muscles,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create {
        name: String,
        /// Member exercises (ID or name)
        members: Vec<String>,
    },
    List,
    Show { identifier: String },
    Rename { identifier: String, new_name: String },
    AddMember { group: String, exercise: String },
    RemoveMember { group: String, exercise: String },
    Delete { identifier: String },
}

#[derive(Subcommand, Debug)]
pub enum WorkoutCommand {
    /// Start a workout, optionally from a plan
    Start {
        #[arg(short, long)]
        plan: Option<i64>,
        #[arg(short, long)]
        note: Option<String>,
    },
    List {
        /// Only finished (true) or open (false) workouts
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        plan: Option<i64>,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    Show { id: i64 },
    Note { id: i64, note: Option<String> },
    Finish { id: i64 },
    Reopen { id: i64 },
    Delete { id: i64 },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Exercise ID or name
    #[arg(short, long)]
    pub exercise: Option<String>,
    /// Group ID or name
    #[arg(short, long)]
    pub group: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum EntryCommand {
    /// Append an entry to a workout
    Add {
        workout: i64,
        #[command(flatten)]
        target: TargetArgs,
    },
    Remove { workout: i64, entry: i64 },
    /// Move an entry to a new position
    Move {
        workout: i64,
        entry: i64,
        position: u32,
    },
    /// Pick an exercise for the group placeholder at a position
    Choose {
        workout: i64,
        position: u32,
        /// Exercise ID or name
        exercise: String,
        /// Also retarget the expected set to the exercise
        #[arg(long)]
        narrow_target: bool,
    },
    /// Turn an exercise entry back into a group placeholder
    Revert { workout: i64, entry: i64 },
}

#[derive(Subcommand, Debug)]
pub enum SetCommand {
    Add {
        entry: i64,
        #[arg(short, long)]
        reps: Option<i64>,
        /// Weight in the configured units
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(long)]
        rir: Option<i64>,
        #[arg(long)]
        rpe: Option<f64>,
        #[arg(short = 't', long = "type", value_enum)]
        set_type: Option<SetTypeCli>,
        /// Mark the set complete right away
        #[arg(short, long)]
        done: bool,
    },
    Edit {
        id: i64,
        #[arg(short, long)]
        reps: Option<i64>,
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(long)]
        rir: Option<i64>,
        #[arg(long)]
        rpe: Option<f64>,
        #[arg(short = 't', long = "type", value_enum)]
        set_type: Option<SetTypeCli>,
    },
    Done { id: i64 },
    Undo { id: i64 },
    Delete { id: i64 },
    /// Completed sets for an exercise
    History { exercise: String },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        note: String,
    },
    List,
    Show { id: i64 },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete { id: i64 },
    /// Append an expected set
    Add {
        plan: i64,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(short, long)]
        reps: Option<i64>,
        #[arg(short, long)]
        sets: Option<i64>,
        /// Upper end of a rep range
        #[arg(long)]
        reps_top: Option<i64>,
        #[arg(long)]
        rpe: Option<f64>,
        #[arg(long)]
        rir: Option<i64>,
        #[arg(long)]
        note: Option<String>,
        #[arg(short = 't', long = "type", value_enum)]
        set_type: Option<SetTypeCli>,
    },
    /// Point an expected set at another exercise or group
    Retarget {
        expected: i64,
        #[command(flatten)]
        target: TargetArgs,
    },
    Remove { expected: i64 },
    Move {
        plan: i64,
        expected: i64,
        position: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum StatsCommand {
    /// Exercise with the biggest estimated 1RM gain in the configured window
    Improved,
    /// Best estimated 1RM per workout for an exercise
    Progress { exercise: String },
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    Search { term: String },
    /// Add every catalog exercise not yet in the journal
    Seed,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    Units {
        #[arg(value_enum)]
        units: UnitsCli,
    },
    HeaderColor { color: String },
    CatalogUrl { url: String },
    ImprovementWindow { days: u32 },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
