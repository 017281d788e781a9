//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use chrono::Local;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use futures_util::StreamExt;
use std::io::stdout;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use gym_journal_lib::db::sets::SetRecord;
use gym_journal_lib::stats::{Improvement, ProgressPoint};
use gym_journal_lib::{
    AppService, Category, EntryTarget, Exercise, ExerciseFilters, ExerciseGroup, ExerciseUpdate, ExpectedSet,
    ExpectedSetUpdate, NewExercise, NewExpectedSet, NewSet, PositionOwner, Resource, ResultStream, SetType,
    SetUpdate, TargetRef, Units, UseCases, Weight, Workout, WorkoutFilters, WorkoutPlan,
};

fn main() -> Result<()> {
    let cli_args = cli::parse_args();

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {bin_name}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    // Logging starts before the config and database are opened. Logs go to
    // stderr so tables stay clean.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(STARTUP_LOG_LEVEL)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;

    if let Some(configured) = configured_filter(from_env, &service.config.log_level) {
        filter_handle
            .reload(configured)
            .context("Failed to apply configured log level")?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(execute(&mut service, cli_args.command))
}

const STARTUP_LOG_LEVEL: &str = "info";

/// Filter to switch to once the config is loaded. `RUST_LOG` wins when set.
fn configured_filter(from_env: bool, log_level: &str) -> Option<EnvFilter> {
    (!from_env).then(|| EnvFilter::new(log_level))
}

/// Drains a result stream, returning the final value.
async fn run<T>(mut results: ResultStream<T>) -> Result<T> {
    while let Some(item) = results.next().await {
        match item {
            Resource::Loading => debug!("Loading..."),
            Resource::Success(value) => return Ok(value),
            Resource::Error(e) => return Err(anyhow::Error::from(e)),
        }
    }
    bail!("Operation finished without a result")
}

async fn resolve_exercise(uc: &UseCases, identifier: &str) -> Result<Exercise> {
    match identifier.trim().parse::<i64>() {
        Ok(id) => run(uc.get_exercise(id)).await,
        Err(_) => run(uc.find_exercise(identifier.to_string())).await,
    }
}

async fn resolve_group(uc: &UseCases, identifier: &str) -> Result<ExerciseGroup> {
    match identifier.trim().parse::<i64>() {
        Ok(id) => run(uc.get_group(id)).await,
        Err(_) => run(uc.find_group(identifier.to_string())).await,
    }
}

async fn resolve_target(uc: &UseCases, target: &cli::TargetArgs) -> Result<TargetRef> {
    match (&target.exercise, &target.group) {
        (Some(exercise), _) => Ok(TargetRef::Exercise(resolve_exercise(uc, exercise).await?.id)),
        (None, Some(group)) => Ok(TargetRef::Group(resolve_group(uc, group).await?.id)),
        (None, None) => bail!("Either --exercise or --group is required"),
    }
}

const fn cli_category(c: cli::CategoryCli) -> Category {
    match c {
        cli::CategoryCli::Abs => Category::Abs,
        cli::CategoryCli::Arms => Category::Arms,
        cli::CategoryCli::Back => Category::Back,
        cli::CategoryCli::Calves => Category::Calves,
        cli::CategoryCli::Cardio => Category::Cardio,
        cli::CategoryCli::Chest => Category::Chest,
        cli::CategoryCli::Legs => Category::Legs,
        cli::CategoryCli::Shoulders => Category::Shoulders,
        cli::CategoryCli::Other => Category::Other,
    }
}

const fn cli_set_type(t: cli::SetTypeCli) -> SetType {
    match t {
        cli::SetTypeCli::WarmUp => SetType::WarmUp,
        cli::SetTypeCli::Working => SetType::Working,
        cli::SetTypeCli::Drop => SetType::Drop,
        cli::SetTypeCli::Failure => SetType::Failure,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

async fn execute(service: &mut AppService, command: cli::Commands) -> Result<()> {
    let uc = service.use_cases().clone();
    let header = service.config.theme.header();
    let units = service.config.units;

    match command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Exercise(cmd) => exercise_command(&uc, cmd, header).await?,
        cli::Commands::Group(cmd) => group_command(&uc, cmd, header).await?,
        cli::Commands::Workout(cmd) => workout_command(&uc, cmd, header, units).await?,
        cli::Commands::Entry(cmd) => entry_command(&uc, cmd).await?,
        cli::Commands::Set(cmd) => set_command(&uc, cmd, header, units).await?,
        cli::Commands::Plan(cmd) => plan_command(&uc, cmd, header).await?,
        cli::Commands::Stats(cmd) => stats_command(&uc, cmd, header, units).await?,
        cli::Commands::Catalog(cmd) => catalog_command(&uc, cmd, header).await?,
        cli::Commands::Export { path } => {
            let count = run(uc.export_csv(path.clone())).await?;
            println!("Exported {count} record(s) to {}", path.display());
        }
        cli::Commands::Import { path } => {
            let report = run(uc.import_csv(path)).await?;
            println!(
                "Imported {} of {} record(s) ({:.0}%)",
                report.imported,
                report.total,
                report.fraction() * 100.0
            );
        }
        cli::Commands::Backup { path } => {
            run(uc.backup(path.clone())).await?;
            println!("Database backed up to {}", path.display());
        }
        cli::Commands::Restore { path } => {
            run(uc.restore(path.clone())).await?;
            println!("Database restored from {}", path.display());
        }
        cli::Commands::Config(cmd) => config_command(service, cmd)?,
    }
    Ok(())
}

async fn exercise_command(uc: &UseCases, cmd: cli::ExerciseCommand, header: Color) -> Result<()> {
    match cmd {
        cli::ExerciseCommand::Add { name, fields } => {
            let new = NewExercise {
                name: name.clone(),
                muscles: fields.muscles.as_deref().map(split_list).unwrap_or_default(),
                category: fields.category.map(cli_category).unwrap_or_default(),
                equipment: fields.equipment,
                thumbnail: None,
            };
            let id = run(uc.create_exercise(new)).await?;
            println!("Created exercise '{}' (ID {id})", name.trim());
        }
        cli::ExerciseCommand::List {
            name,
            muscle,
            category,
        } => {
            let filters = ExerciseFilters {
                name,
                muscle,
                category: category.map(cli_category),
            };
            print_exercise_table(&run(uc.list_exercises(filters)).await?, header);
        }
        cli::ExerciseCommand::Show { identifier } => {
            let exercise = resolve_exercise(uc, &identifier).await?;
            print_exercise_table(std::slice::from_ref(&exercise), header);
        }
        cli::ExerciseCommand::Edit {
            identifier,
            name,
            fields,
        } => {
            let exercise = resolve_exercise(uc, &identifier).await?;
            let update = ExerciseUpdate {
                name,
                muscles: fields.muscles.as_deref().map(split_list),
                category: fields.category.map(cli_category),
                // An empty string clears the field.
                equipment: fields
                    .equipment
                    .map(|e| Some(e.trim().to_string()).filter(|e| !e.is_empty())),
                thumbnail: None,
            };
            run(uc.update_exercise(exercise.id, update)).await?;
            println!("Updated exercise '{}'", exercise.name);
        }
        cli::ExerciseCommand::Delete { identifier } => {
            let exercise = resolve_exercise(uc, &identifier).await?;
            run(uc.delete_exercise(exercise.id)).await?;
            println!("Deleted exercise '{}' and every entry using it", exercise.name);
        }
        cli::ExerciseCommand::Muscles => {
            for muscle in run(uc.list_muscles()).await? {
                println!("{muscle}");
            }
        }
    }
    Ok(())
}

async fn group_command(uc: &UseCases, cmd: cli::GroupCommand, header: Color) -> Result<()> {
    match cmd {
        cli::GroupCommand::Create { name, members } => {
            let mut ids = Vec::with_capacity(members.len());
            for member in &members {
                ids.push(resolve_exercise(uc, member).await?.id);
            }
            let id = run(uc.create_group(name.clone(), ids)).await?;
            println!("Created group '{}' (ID {id})", name.trim());
        }
        cli::GroupCommand::List => print_group_table(&run(uc.list_groups()).await?, header),
        cli::GroupCommand::Show { identifier } => {
            let group = resolve_group(uc, &identifier).await?;
            print_group_table(std::slice::from_ref(&group), header);
        }
        cli::GroupCommand::Rename {
            identifier,
            new_name,
        } => {
            let group = resolve_group(uc, &identifier).await?;
            run(uc.rename_group(group.id, new_name.clone())).await?;
            println!("Renamed group '{}' to '{}'", group.name, new_name.trim());
        }
        cli::GroupCommand::AddMember { group, exercise } => {
            let group = resolve_group(uc, &group).await?;
            let exercise = resolve_exercise(uc, &exercise).await?;
            run(uc.add_group_member(group.id, exercise.id)).await?;
            println!("Added '{}' to '{}'", exercise.name, group.name);
        }
        cli::GroupCommand::RemoveMember { group, exercise } => {
            let group = resolve_group(uc, &group).await?;
            let exercise = resolve_exercise(uc, &exercise).await?;
            run(uc.remove_group_member(group.id, exercise.id)).await?;
            println!("Removed '{}' from '{}'", exercise.name, group.name);
        }
        cli::GroupCommand::Delete { identifier } => {
            let group = resolve_group(uc, &identifier).await?;
            run(uc.delete_group(group.id)).await?;
            println!("Deleted group '{}'", group.name);
        }
    }
    Ok(())
}

async fn workout_command(uc: &UseCases, cmd: cli::WorkoutCommand, header: Color, units: Units) -> Result<()> {
    match cmd {
        cli::WorkoutCommand::Start { plan, note } => {
            let id = match plan {
                Some(plan_id) => {
                    let id = run(uc.create_workout_from_plan(plan_id)).await?;
                    if note.is_some() {
                        run(uc.update_workout_note(id, note)).await?;
                    }
                    id
                }
                None => run(uc.create_workout(note)).await?,
            };
            let workout = run(uc.get_workout(id)).await?;
            print_workout(&workout, header, units);
        }
        cli::WorkoutCommand::List {
            completed,
            plan,
            limit,
        } => {
            let filters = WorkoutFilters {
                completed,
                plan_id: plan,
                limit,
            };
            print_workout_list(&run(uc.list_workouts(filters)).await?, header);
        }
        cli::WorkoutCommand::Show { id } => print_workout(&run(uc.get_workout(id)).await?, header, units),
        cli::WorkoutCommand::Note { id, note } => {
            run(uc.update_workout_note(id, note)).await?;
            println!("Updated note of workout {id}");
        }
        cli::WorkoutCommand::Finish { id } => {
            run(uc.complete_workout(id)).await?;
            println!("Finished workout {id}");
        }
        cli::WorkoutCommand::Reopen { id } => {
            run(uc.reopen_workout(id)).await?;
            println!("Reopened workout {id}");
        }
        cli::WorkoutCommand::Delete { id } => {
            run(uc.delete_workout(id)).await?;
            println!("Deleted workout {id}");
        }
    }
    Ok(())
}

async fn entry_command(uc: &UseCases, cmd: cli::EntryCommand) -> Result<()> {
    match cmd {
        cli::EntryCommand::Add { workout, target } => {
            let target = resolve_target(uc, &target).await?;
            let id = run(uc.add_entry(workout, target)).await?;
            println!("Added entry {id} to workout {workout}");
        }
        cli::EntryCommand::Remove { workout, entry } => {
            run(uc.remove_entry(PositionOwner::Workout(workout), entry)).await?;
            println!("Removed entry {entry}");
        }
        cli::EntryCommand::Move {
            workout,
            entry,
            position,
        } => {
            run(uc.swap_entry_position(PositionOwner::Workout(workout), entry, position)).await?;
            println!("Moved entry {entry} to position {position}");
        }
        cli::EntryCommand::Choose {
            workout,
            position,
            exercise,
            narrow_target,
        } => {
            let current = run(uc.get_workout(workout)).await?;
            let Some(entry) = current.entry_at(position) else {
                bail!("Workout {workout} has no entry at position {position}");
            };
            let Some(group) = entry.target.as_group() else {
                bail!("Entry at position {position} is already '{}'", entry.target.name());
            };
            let exercise = resolve_exercise(uc, &exercise).await?;
            run(uc.choose_exercise_from_group(workout, group.id, exercise.id, position, narrow_target)).await?;
            println!("Position {position}: '{}' -> '{}'", group.name, exercise.name);
        }
        cli::EntryCommand::Revert { workout, entry } => {
            let group_id = run(uc.revert_to_group(workout, entry)).await?;
            let group = run(uc.get_group(group_id)).await?;
            println!("Entry {entry} is now group '{}'", group.name);
        }
    }
    Ok(())
}

async fn set_command(uc: &UseCases, cmd: cli::SetCommand, header: Color, units: Units) -> Result<()> {
    match cmd {
        cli::SetCommand::Add {
            entry,
            reps,
            weight,
            rir,
            rpe,
            set_type,
            done,
        } => {
            let new = NewSet {
                reps,
                weight: weight.map(|w| Weight::from_units(w, units)),
                rir,
                rpe,
                set_type: set_type.map(cli_set_type).unwrap_or_default(),
            };
            let id = run(uc.add_set(entry, new)).await?;
            if done {
                run(uc.complete_set(id)).await?;
            }
            println!("Added set {id} to entry {entry}");
        }
        cli::SetCommand::Edit {
            id,
            reps,
            weight,
            rir,
            rpe,
            set_type,
        } => {
            let update = SetUpdate {
                reps: reps.map(Some),
                weight: weight.map(|w| Some(Weight::from_units(w, units))),
                rir: rir.map(Some),
                rpe: rpe.map(Some),
                set_type: set_type.map(cli_set_type),
            };
            run(uc.update_set(id, update)).await?;
            println!("Updated set {id}");
        }
        cli::SetCommand::Done { id } => {
            run(uc.complete_set(id)).await?;
            println!("Set {id} complete");
        }
        cli::SetCommand::Undo { id } => {
            run(uc.uncomplete_set(id)).await?;
            println!("Set {id} marked incomplete");
        }
        cli::SetCommand::Delete { id } => {
            run(uc.delete_set(id)).await?;
            println!("Deleted set {id}");
        }
        cli::SetCommand::History { exercise } => {
            let exercise = resolve_exercise(uc, &exercise).await?;
            print_history(&run(uc.exercise_history(exercise.id)).await?, header, units);
        }
    }
    Ok(())
}

async fn plan_command(uc: &UseCases, cmd: cli::PlanCommand, header: Color) -> Result<()> {
    match cmd {
        cli::PlanCommand::Create { name, note } => {
            let id = run(uc.create_plan(name.clone(), note)).await?;
            println!("Created plan '{}' (ID {id})", name.trim());
        }
        cli::PlanCommand::List => {
            for plan in run(uc.list_plans()).await? {
                println!("{:>4}  {}  ({} entries)", plan.id, plan.name, plan.expected_sets.len());
            }
        }
        cli::PlanCommand::Show { id } => print_plan(&run(uc.get_plan(id)).await?, header),
        cli::PlanCommand::Edit { id, name, note } => {
            run(uc.update_plan(id, name, note)).await?;
            println!("Updated plan {id}");
        }
        cli::PlanCommand::Delete { id } => {
            run(uc.delete_plan(id)).await?;
            println!("Deleted plan {id}");
        }
        cli::PlanCommand::Add {
            plan,
            target,
            reps,
            sets,
            reps_top,
            rpe,
            rir,
            note,
            set_type,
        } => {
            let new = NewExpectedSet {
                reps,
                sets,
                rep_range_top: reps_top,
                rpe,
                rir,
                note,
                set_type: set_type.map(cli_set_type).unwrap_or_default(),
                ..NewExpectedSet::for_target(resolve_target(uc, &target).await?)
            };
            let id = run(uc.add_expected_set(plan, new)).await?;
            println!("Added expected set {id} to plan {plan}");
        }
        cli::PlanCommand::Retarget { expected, target } => {
            let update = ExpectedSetUpdate {
                target: Some(resolve_target(uc, &target).await?),
                ..Default::default()
            };
            run(uc.update_expected_set(expected, update)).await?;
            println!("Retargeted expected set {expected}");
        }
        cli::PlanCommand::Remove { expected } => {
            run(uc.remove_expected_set(expected)).await?;
            println!("Removed expected set {expected}");
        }
        cli::PlanCommand::Move {
            plan,
            expected,
            position,
        } => {
            run(uc.swap_expected_set_position(plan, expected, position)).await?;
            println!("Moved expected set {expected} to position {position}");
        }
    }
    Ok(())
}

async fn stats_command(uc: &UseCases, cmd: cli::StatsCommand, header: Color, units: Units) -> Result<()> {
    match cmd {
        cli::StatsCommand::Improved => match run(uc.most_improved_exercise()).await? {
            Some(improvement) => print_improvement(&improvement, units),
            None => println!("No exercise improved in the configured window."),
        },
        cli::StatsCommand::Progress { exercise } => {
            let exercise = resolve_exercise(uc, &exercise).await?;
            let points = run(uc.exercise_progress(exercise.id)).await?;
            print_progress(&exercise.name, &points, header, units);
        }
    }
    Ok(())
}

async fn catalog_command(uc: &UseCases, cmd: cli::CatalogCommand, header: Color) -> Result<()> {
    match cmd {
        cli::CatalogCommand::Search { term } => {
            let suggestions = run(uc.search_catalog(term)).await?;
            let mut table = new_table();
            table.set_header(vec![
                Cell::new("Catalog ID").fg(header),
                Cell::new("Name").fg(header),
                Cell::new("Category").fg(header),
            ]);
            for s in suggestions {
                table.add_row(vec![
                    Cell::new(s.data.id.to_string()),
                    Cell::new(s.value),
                    Cell::new(s.data.category),
                ]);
            }
            println!("{table}");
        }
        cli::CatalogCommand::Seed => {
            let report = run(uc.seed_catalog()).await?;
            println!(
                "Seeded catalog: {} new exercise(s), {} already present",
                report.inserted, report.skipped
            );
        }
    }
    Ok(())
}

fn config_command(service: &mut AppService, cmd: cli::ConfigCommand) -> Result<()> {
    match cmd {
        cli::ConfigCommand::Show => {
            println!("Config file: {}", service.get_config_path().display());
            println!("Database:    {}", service.db_path.display());
            println!("{:#?}", service.config);
        }
        cli::ConfigCommand::Units { units } => {
            let units = match units {
                cli::UnitsCli::Metric => Units::Metric,
                cli::UnitsCli::Imperial => Units::Imperial,
            };
            service.set_units(units)?;
            println!("Units set to {units:?}");
        }
        cli::ConfigCommand::HeaderColor { color } => {
            service.set_header_color(&color)?;
            println!("Header color set to {}", service.config.theme.header_color);
        }
        cli::ConfigCommand::CatalogUrl { url } => {
            service.set_catalog_url(&url)?;
            println!("Catalog URL set to {}", service.config.catalog.base_url);
        }
        cli::ConfigCommand::ImprovementWindow { days } => {
            service.set_improvement_window(days)?;
            println!("Improvement window set to {days} day(s)");
        }
    }
    Ok(())
}

// --- Rendering ---

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or("-".to_string(), |v| v.to_string())
}

fn format_weight(weight: Option<Weight>, units: Units) -> String {
    weight.map_or("-".to_string(), |w| {
        format!("{:.1} {}", w.in_units(units), units.weight_label())
    })
}

fn print_exercise_table(exercises: &[Exercise], header: Color) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("ID").fg(header),
        Cell::new("Name").fg(header),
        Cell::new("Category").fg(header),
        Cell::new("Muscles").fg(header),
        Cell::new("Equipment").fg(header),
    ]);
    for exercise in exercises {
        table.add_row(vec![
            Cell::new(exercise.id.to_string()),
            Cell::new(&exercise.name),
            Cell::new(exercise.category.to_string()),
            Cell::new(if exercise.muscles.is_empty() {
                "-".to_string()
            } else {
                exercise.muscles.join(", ")
            }),
            Cell::new(exercise.equipment.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_group_table(groups: &[ExerciseGroup], header: Color) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("ID").fg(header),
        Cell::new("Group").fg(header),
        Cell::new("Exercises").fg(header),
    ]);
    for group in groups {
        let members: Vec<&str> = group.exercises.iter().map(|e| e.name.as_str()).collect();
        table.add_row(vec![
            Cell::new(group.id.to_string()),
            Cell::new(&group.name),
            Cell::new(members.join(", ")),
        ]);
    }
    println!("{table}");
}

fn target_label(target: &EntryTarget) -> String {
    match target {
        EntryTarget::Exercise(e) => e.name.clone(),
        EntryTarget::Group(g) => format!("[{}]", g.name),
    }
}

fn expected_label(expected: &ExpectedSet) -> String {
    let reps = match (expected.reps, expected.rep_range_top) {
        (Some(low), Some(high)) => format!("{low}-{high}"),
        (reps, _) => or_dash(reps),
    };
    let mut label = format!("{}x{reps}", or_dash(expected.sets));
    if let Some(rpe) = expected.rpe {
        label.push_str(&format!(" @RPE {rpe}"));
    }
    if let Some(rir) = expected.rir {
        label.push_str(&format!(" RIR {rir}"));
    }
    label
}

fn print_workout_list(workouts: &[Workout], header: Color) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("ID").fg(header),
        Cell::new("Started (Local)").fg(header),
        Cell::new("Finished").fg(header),
        Cell::new("Entries").fg(header),
        Cell::new("Sets").fg(header),
        Cell::new("Note").fg(header),
    ]);
    for workout in workouts {
        let sets: usize = workout.entries.iter().map(|e| e.sets.len()).sum();
        table.add_row(vec![
            Cell::new(workout.id.to_string()),
            Cell::new(workout.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(or_dash(
                workout
                    .completed_at
                    .map(|t| t.with_timezone(&Local).format("%H:%M")),
            )),
            Cell::new(workout.entries.len().to_string()),
            Cell::new(sets.to_string()),
            Cell::new(workout.note.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_workout(workout: &Workout, header: Color, units: Units) {
    println!(
        "Workout {}: started {}{}",
        workout.id,
        workout.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        if workout.is_completed() { " (finished)" } else { "" }
    );
    if let Some(note) = &workout.note {
        println!("Note: {note}");
    }
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Pos").fg(header),
        Cell::new("Entry").fg(header),
        Cell::new("Target").fg(header),
        Cell::new("Expected").fg(header),
        Cell::new("Set").fg(header),
        Cell::new("Reps").fg(header),
        Cell::new(format!("Weight ({})", units.weight_label())).fg(header),
        Cell::new("RIR/RPE").fg(header),
        Cell::new("Done").fg(header),
    ]);
    for entry in &workout.entries {
        let expected = entry.expected.as_ref().map_or("-".to_string(), expected_label);
        if entry.sets.is_empty() {
            table.add_row(vec![
                Cell::new(entry.position.to_string()),
                Cell::new(entry.id.to_string()),
                Cell::new(target_label(&entry.target)),
                Cell::new(&expected),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ]);
        }
        for (i, set) in entry.sets.iter().enumerate() {
            let first = i == 0;
            table.add_row(vec![
                Cell::new(if first { entry.position.to_string() } else { String::new() }),
                Cell::new(if first { entry.id.to_string() } else { String::new() }),
                Cell::new(if first { target_label(&entry.target) } else { String::new() }),
                Cell::new(if first { expected.clone() } else { String::new() }),
                Cell::new(format!("{} ({})", set.id, set.set_type)),
                Cell::new(or_dash(set.reps)),
                Cell::new(format_weight(set.weight, units)),
                Cell::new(format!("{}/{}", or_dash(set.rir), or_dash(set.rpe))),
                Cell::new(if set.completed { "yes" } else { "no" }),
            ]);
        }
    }
    println!("{table}");
}

fn print_plan(plan: &WorkoutPlan, header: Color) {
    println!("Plan {}: {}", plan.id, plan.name);
    if !plan.note.is_empty() {
        println!("Note: {}", plan.note);
    }
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Pos").fg(header),
        Cell::new("Expected ID").fg(header),
        Cell::new("Target").fg(header),
        Cell::new("Goal").fg(header),
        Cell::new("Type").fg(header),
        Cell::new("Note").fg(header),
    ]);
    for expected in &plan.expected_sets {
        table.add_row(vec![
            Cell::new(expected.position.to_string()),
            Cell::new(expected.id.to_string()),
            Cell::new(target_label(&expected.target)),
            Cell::new(expected_label(expected)),
            Cell::new(expected.set_type.to_string()),
            Cell::new(expected.note.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_history(records: &[SetRecord], header: Color, units: Units) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Date (Local)").fg(header),
        Cell::new("Workout").fg(header),
        Cell::new("Reps").fg(header),
        Cell::new(format!("Weight ({})", units.weight_label())).fg(header),
        Cell::new("Type").fg(header),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.workout_created_at.with_timezone(&Local).format("%Y-%m-%d").to_string()),
            Cell::new(record.workout_id.to_string()),
            Cell::new(or_dash(record.set.reps)),
            Cell::new(format_weight(record.set.weight, units)),
            Cell::new(record.set.set_type.to_string()),
        ]);
    }
    println!("{table}");
}

fn print_progress(name: &str, points: &[ProgressPoint], header: Color, units: Units) {
    println!("Estimated 1RM for {name}");
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Date (Local)").fg(header),
        Cell::new("Workout").fg(header),
        Cell::new(format!("Best e1RM ({})", units.weight_label())).fg(header),
    ]);
    for point in points {
        table.add_row(vec![
            Cell::new(point.date.with_timezone(&Local).format("%Y-%m-%d").to_string()),
            Cell::new(point.workout_id.to_string()),
            Cell::new(format!("{:.1}", Weight::from_kg(point.best_e1rm_kg).in_units(units))),
        ]);
    }
    println!("{table}");
}

fn print_improvement(improvement: &Improvement, units: Units) {
    let first = Weight::from_kg(improvement.first.best_e1rm_kg).in_units(units);
    let last = Weight::from_kg(improvement.last.best_e1rm_kg).in_units(units);
    println!(
        "Most improved: {} ({:+.1}%), e1RM {:.1} -> {:.1} {} ({} -> {})",
        improvement.exercise_name,
        improvement.improvement * 100.0,
        first,
        last,
        units.weight_label(),
        improvement.first.date.with_timezone(&Local).format("%Y-%m-%d"),
        improvement.last.date.with_timezone(&Local).format("%Y-%m-%d"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_applies_only_without_rust_log() {
        assert!(configured_filter(true, "debug").is_none());
        let filter = configured_filter(false, "debug").map(|f| f.to_string());
        assert_eq!(filter.as_deref(), Some("debug"));
        assert_eq!(EnvFilter::new(STARTUP_LOG_LEVEL).to_string(), "info");
    }
}
