//! Remote collaborators the client core talks to. The HTTP implementation
//! lives in the `client` crate; tests plug in in-memory doubles.

use async_trait::async_trait;
use std::path::PathBuf;
use types::{
    EntityKind, ExportFormat, GenerationRequest, NewRoom, NewSubject, NewTeacher, Room, Schedule,
    ScheduleId, ScheduleStatistics, ScheduleSummary, Subject, Teacher,
};

use crate::CoreError;

/// Teacher/subject/room persistence.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    async fn list_teachers(&self) -> Result<Vec<Teacher>, CoreError>;
    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError>;
    async fn list_rooms(&self) -> Result<Vec<Room>, CoreError>;

    async fn create_teacher(&self, record: &NewTeacher) -> Result<Teacher, CoreError>;
    async fn create_subject(&self, record: &NewSubject) -> Result<Subject, CoreError>;
    async fn create_room(&self, record: &NewRoom) -> Result<Room, CoreError>;

    /// `NotFound` when no such record exists.
    async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<(), CoreError>;
}

/// Stored schedules.
#[async_trait]
pub trait ScheduleCatalog: Send + Sync + 'static {
    /// Newest first.
    async fn list_schedules(&self) -> Result<Vec<ScheduleSummary>, CoreError>;
    async fn get_schedule(&self, id: &ScheduleId) -> Result<Schedule, CoreError>;
    async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), CoreError>;
    async fn statistics(&self) -> Result<ScheduleStatistics, CoreError>;
}

/// The remote timetable optimizer. Can take tens of seconds.
#[async_trait]
pub trait Optimizer: Send + Sync + 'static {
    async fn submit_generation(&self, request: &GenerationRequest) -> Result<Schedule, CoreError>;
}

#[async_trait]
pub trait ExportService: Send + Sync + 'static {
    async fn export_schedule(
        &self,
        id: &ScheduleId,
        format: ExportFormat,
    ) -> Result<Vec<u8>, CoreError>;
}

/// Host "save file" capability.
#[async_trait]
pub trait FileSink: Send + Sync + 'static {
    async fn save(
        &self,
        filename: &str,
        format: ExportFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError>;
}
