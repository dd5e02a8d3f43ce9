pub mod grid;
pub mod services;

use thiserror::Error;

pub use types::{
    DayOfWeek, EntityKind, EntitySet, ExportFormat, GenerationParameters, GenerationRequest,
    NewRoom, NewSubject, NewTeacher, Room, Schedule, ScheduleEntry, ScheduleId, ScheduleStatistics,
    ScheduleSummary, SlotKey, Subject, Teacher, TeacherId, TimeLabel,
};

/// Every failure the client core reports. `Clone` so it can sit in state
/// snapshots and broadcast events.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("schedule generation failed: {0}")]
    Optimizer(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("a schedule generation is already in progress")]
    Busy,
    #[error("schedule generation was abandoned")]
    Abandoned,
}

impl CoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}

fn finish(errors: Vec<String>) -> Result<(), CoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors.join("; ")))
    }
}

/// Shape checks only; whether the optimizer can do anything useful with
/// these numbers is its own business.
pub fn validate_parameters(p: &GenerationParameters) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();

    if p.population_size == 0 {
        errors.push("population_size must be positive".into());
    }
    if !p.mutation_rate.is_finite() {
        errors.push("mutation_rate is missing".into());
    } else if !(0.0..=1.0).contains(&p.mutation_rate) {
        errors.push(format!("mutation_rate {} is outside [0, 1]", p.mutation_rate));
    }
    if p.max_generations == 0 {
        errors.push("max_generations must be positive".into());
    }
    if p.elite_size == 0 {
        errors.push("elite_size must be positive".into());
    }

    finish(errors)
}

pub fn validate_entities(set: &EntitySet) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();
    if set.teachers.is_empty() {
        errors.push("no teachers".into());
    }
    if set.subjects.is_empty() {
        errors.push("no subjects".into());
    }
    if set.rooms.is_empty() {
        errors.push("no rooms".into());
    }
    finish(errors)
}

pub fn validate_new_teacher(t: &NewTeacher) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();
    if t.name.trim().is_empty() {
        errors.push("teacher name is required".into());
    }
    if t.max_hours_per_day == 0 {
        errors.push("max_hours_per_day must be positive".into());
    }
    finish(errors)
}

/// The owning teacher has to be known to `entities` already.
pub fn validate_new_subject(s: &NewSubject, entities: &EntitySet) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();
    if s.code.trim().is_empty() {
        errors.push("subject code is required".into());
    }
    if s.name.trim().is_empty() {
        errors.push("subject name is required".into());
    }
    if s.hours_per_week == 0 {
        errors.push(format!("subject {} has hours_per_week=0", s.code));
    }
    match &s.teacher_id {
        None => errors.push("subject teacher is required".into()),
        Some(id) if entities.teacher(id).is_none() => {
            errors.push(format!("subject {} references missing teacher {}", s.code, id));
        }
        Some(_) => {}
    }
    finish(errors)
}

pub fn validate_new_room(r: &NewRoom) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();
    if r.room_number.trim().is_empty() {
        errors.push("room number is required".into());
    }
    if r.building.trim().is_empty() {
        errors.push("building is required".into());
    }
    if r.capacity == 0 {
        errors.push(format!("room {} has capacity=0", r.room_number));
    }
    finish(errors)
}
