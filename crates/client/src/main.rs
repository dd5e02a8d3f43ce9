use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use client::{render, telemetry, AppState, ClientConfig};
use sched_core::grid::{project, project_by, GroupBy};
use tracing::{info, warn};
use types::{
    EntityKind, ExportFormat, GenerationParameters, NewRoom, NewSubject, NewTeacher, RoomType,
    ScheduleId, SlotKey, TeacherId,
};

#[derive(Parser)]
#[command(name = "timetable", version, about = "School timetable client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Entity counts, stored schedules and statistics.
    Status,
    /// Ask the optimizer for a new schedule from the current entities.
    Generate {
        #[arg(long, default_value_t = 100)]
        population_size: u32,
        #[arg(long, default_value_t = 0.01)]
        mutation_rate: f64,
        #[arg(long, default_value_t = 1000)]
        max_generations: u32,
        #[arg(long, default_value_t = 2)]
        elite_size: u32,
    },
    /// Print a schedule as a weekly grid; the newest one by default.
    Show {
        id: Option<String>,
        #[arg(long)]
        by: Option<GroupBy>,
    },
    Export {
        id: String,
        #[arg(long, default_value = "pdf")]
        format: ExportFormat,
        /// File name inside the export directory.
        #[arg(long)]
        output: Option<String>,
    },
    DeleteSchedule {
        id: String,
    },
    AddTeacher {
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Repeatable.
        #[arg(long = "subject")]
        subjects: Vec<String>,
        /// Repeatable, e.g. `Mon-08:00`.
        #[arg(long = "unavailable")]
        unavailable: Vec<SlotKey>,
        #[arg(long, default_value_t = 6)]
        max_hours_per_day: u32,
    },
    AddSubject {
        code: String,
        name: String,
        #[arg(long)]
        teacher: String,
        #[arg(long, default_value_t = 2)]
        hours_per_week: u32,
        #[arg(long)]
        lab: bool,
    },
    AddRoom {
        room_number: String,
        building: String,
        #[arg(long, default_value_t = 40)]
        capacity: u32,
        #[arg(long, default_value = "lecture")]
        room_type: RoomType,
    },
    /// Remove a teacher, subject or room.
    Delete {
        kind: EntityKind,
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = ClientConfig::from_env().context("invalid configuration")?;
    telemetry::init(cfg.json_logs);

    let app = AppState::from_config(&cfg)?;
    match cli.command {
        Command::Status => status(&app).await?,
        Command::Generate {
            population_size,
            mutation_rate,
            max_generations,
            elite_size,
        } => {
            let params = GenerationParameters {
                population_size,
                mutation_rate,
                max_generations,
                elite_size,
            };
            generate(&app, params).await?;
        }
        Command::Show { id, by } => {
            let id = id.map(ScheduleId);
            let schedule = app.schedule(id.as_ref()).await?;
            if !schedule.name.is_empty() {
                println!("{} ({})\n", schedule.name, schedule.id);
            }
            let text = match by {
                Some(by) => render::render_partitions(&project_by(&schedule.entries, by)),
                None => render::render_grid(&project(&schedule.entries)),
            };
            println!("{text}");
        }
        Command::Export { id, format, output } => {
            let id = ScheduleId(id);
            let path = app
                .export
                .export_artifact_named(&id, format, output.as_deref())
                .await?;
            println!("saved {}", path.display());
        }
        Command::DeleteSchedule { id } => {
            app.delete_schedule(&ScheduleId(id)).await?;
        }
        Command::AddTeacher {
            name,
            email,
            phone,
            subjects,
            unavailable,
            max_hours_per_day,
        } => {
            let t = app
                .entities
                .create_teacher(&NewTeacher {
                    name,
                    email,
                    phone,
                    subjects,
                    unavailable_times: unavailable.into_iter().collect(),
                    max_hours_per_day,
                })
                .await?;
            println!("teacher {} created", t.id);
        }
        Command::AddSubject {
            code,
            name,
            teacher,
            hours_per_week,
            lab,
        } => {
            app.entities.refresh().await?;
            let s = app
                .entities
                .create_subject(&NewSubject {
                    code,
                    name,
                    hours_per_week,
                    teacher_id: Some(TeacherId(teacher)),
                    requires_lab: lab,
                })
                .await?;
            println!("subject {} created", s.id);
        }
        Command::AddRoom {
            room_number,
            building,
            capacity,
            room_type,
        } => {
            let r = app
                .entities
                .create_room(&NewRoom {
                    room_number,
                    building,
                    capacity,
                    room_type,
                })
                .await?;
            println!("room {} created", r.id);
        }
        Command::Delete { kind, id } => {
            app.entities.delete(kind, &id).await?;
            println!("{kind} {id} deleted");
        }
    }
    Ok(())
}

async fn status(app: &AppState) -> anyhow::Result<()> {
    let entities = app.entities.refresh().await?;
    println!(
        "teachers: {}\nsubjects: {}\nrooms: {}\nready to generate: {}\n",
        entities.teachers.len(),
        entities.subjects.len(),
        entities.rooms.len(),
        if entities.can_generate() { "yes" } else { "no" }
    );
    println!("{}\n", render::render_statistics(&app.statistics().await?));
    println!(
        "{}",
        render::render_summaries(&app.catalog().list_schedules().await?)
    );
    Ok(())
}

async fn generate(app: &AppState, params: GenerationParameters) -> anyhow::Result<()> {
    let entities = app.entities.refresh().await?;
    let run = app.generation.generate(&entities, params);
    tokio::select! {
        outcome = run => {
            let id = outcome?;
            let snap = app.generation.snapshot();
            info!(schedule = %id, known = snap.schedules.len(), "done");
            println!("schedule {id} generated");
        }
        _ = tokio::signal::ctrl_c() => {
            app.generation.abandon();
            warn!("generation abandoned, the backend may still finish it");
            bail!("interrupted");
        }
    }
    Ok(())
}
