//! In-memory backend shared by the unit tests of this crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use sched_core::services::{EntityStore, ExportService, FileSink, ScheduleCatalog};
use sched_core::CoreError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use types::*;

#[derive(Default)]
pub struct MemoryBackend {
    pub teachers: Mutex<Vec<Teacher>>,
    pub subjects: Mutex<Vec<Subject>>,
    pub rooms: Mutex<Vec<Room>>,
    /// Kinds whose listing fails with a transport error.
    pub broken: Mutex<HashSet<EntityKind>>,
    /// Taken by the first teacher listing, which then waits on it.
    pub teacher_gate: Mutex<Option<Arc<Notify>>>,
    pub schedules: Mutex<Vec<Schedule>>,
    pub artifacts: Mutex<HashMap<(String, ExportFormat), Vec<u8>>>,
    pub export_error: Mutex<Option<CoreError>>,
    pub list_calls: AtomicUsize,
    pub export_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl MemoryBackend {
    pub fn with_counts(teachers: usize, subjects: usize, rooms: usize) -> Arc<Self> {
        let b = Self::default();
        *b.teachers.lock() = (1..=teachers).map(|i| teacher(&i.to_string())).collect();
        *b.subjects.lock() = (1..=subjects)
            .map(|i| subject(&i.to_string(), "1"))
            .collect();
        *b.rooms.lock() = (1..=rooms).map(|i| room(&i.to_string())).collect();
        Arc::new(b)
    }

    fn fresh_id(&self) -> String {
        format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check(&self, kind: EntityKind) -> Result<(), CoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().contains(&kind) {
            return Err(CoreError::Transport(format!("{kind}: connection reset")));
        }
        Ok(())
    }
}

pub fn teacher(id: &str) -> Teacher {
    Teacher {
        id: id.into(),
        name: format!("Teacher {id}"),
        email: None,
        phone: None,
        subjects: Vec::new(),
        unavailable_times: Default::default(),
        max_hours_per_day: 6,
    }
}

pub fn subject(id: &str, teacher: &str) -> Subject {
    Subject {
        id: id.into(),
        code: format!("S{id}"),
        name: format!("Subject {id}"),
        hours_per_week: 2,
        teacher_id: teacher.into(),
        teacher_name: None,
        requires_lab: false,
    }
}

pub fn room(id: &str) -> Room {
    Room {
        id: id.into(),
        room_number: format!("R{id}"),
        building: "A".into(),
        capacity: 40,
        room_type: RoomType::Lecture,
    }
}

pub fn schedule(id: &str, entries: usize) -> Schedule {
    Schedule {
        id: id.into(),
        name: format!("Schedule {id}"),
        created_at: None,
        fitness_score: 0.9,
        execution_time: 1.5,
        entries: (0..entries)
            .map(|i| ScheduleEntry {
                slot: SlotKey::new(DayOfWeek::ALL[i % 5], format!("{:02}:00", 8 + i / 5)),
                subject_id: "1".into(),
                subject_name: "Subject 1".into(),
                teacher_id: "1".into(),
                teacher_name: "Teacher 1".into(),
                room_id: "1".into(),
                room_number: "R1".into(),
            })
            .collect(),
    }
}

#[async_trait]
impl EntityStore for MemoryBackend {
    async fn list_teachers(&self) -> Result<Vec<Teacher>, CoreError> {
        self.check(EntityKind::Teacher)?;
        let listed = self.teachers.lock().clone();
        let gate = self.teacher_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(listed)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        self.check(EntityKind::Subject)?;
        Ok(self.subjects.lock().clone())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, CoreError> {
        self.check(EntityKind::Room)?;
        Ok(self.rooms.lock().clone())
    }

    async fn create_teacher(&self, record: &NewTeacher) -> Result<Teacher, CoreError> {
        let t = Teacher {
            id: self.fresh_id().as_str().into(),
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            subjects: record.subjects.clone(),
            unavailable_times: record.unavailable_times.clone(),
            max_hours_per_day: record.max_hours_per_day,
        };
        self.teachers.lock().push(t.clone());
        Ok(t)
    }

    async fn create_subject(&self, record: &NewSubject) -> Result<Subject, CoreError> {
        let teacher_id = record
            .teacher_id
            .clone()
            .ok_or_else(|| CoreError::Validation("teacher_id is required".into()))?;
        let s = Subject {
            id: self.fresh_id().as_str().into(),
            code: record.code.clone(),
            name: record.name.clone(),
            hours_per_week: record.hours_per_week,
            teacher_id,
            teacher_name: None,
            requires_lab: record.requires_lab,
        };
        self.subjects.lock().push(s.clone());
        Ok(s)
    }

    async fn create_room(&self, record: &NewRoom) -> Result<Room, CoreError> {
        let r = Room {
            id: self.fresh_id().as_str().into(),
            room_number: record.room_number.clone(),
            building: record.building.clone(),
            capacity: record.capacity,
            room_type: record.room_type,
        };
        self.rooms.lock().push(r.clone());
        Ok(r)
    }

    async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<(), CoreError> {
        let removed = match kind {
            EntityKind::Teacher => remove(&mut self.teachers.lock(), |t| t.id.as_str() == id),
            EntityKind::Subject => remove(&mut self.subjects.lock(), |s| s.id.as_str() == id),
            EntityKind::Room => remove(&mut self.rooms.lock(), |r| r.id.as_str() == id),
        };
        if removed {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("{kind} {id}")))
        }
    }
}

fn remove<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> bool {
    let before = items.len();
    items.retain(|x| !matches(x));
    items.len() != before
}

#[async_trait]
impl ScheduleCatalog for MemoryBackend {
    async fn list_schedules(&self) -> Result<Vec<ScheduleSummary>, CoreError> {
        Ok(self.schedules.lock().iter().map(Schedule::summary).collect())
    }

    async fn get_schedule(&self, id: &ScheduleId) -> Result<Schedule, CoreError> {
        self.schedules
            .lock()
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("schedule {id}")))
    }

    async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), CoreError> {
        if remove(&mut self.schedules.lock(), |s| &s.id == id) {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("schedule {id}")))
        }
    }

    async fn statistics(&self) -> Result<ScheduleStatistics, CoreError> {
        let all = self.schedules.lock();
        let n = all.len();
        let avg = |f: fn(&Schedule) -> f64| (n > 0).then(|| all.iter().map(f).sum::<f64>() / n as f64);
        Ok(ScheduleStatistics {
            total_schedules: n as u64,
            avg_fitness_score: avg(|s| s.fitness_score),
            avg_execution_time: avg(|s| s.execution_time),
        })
    }
}

#[async_trait]
impl ExportService for MemoryBackend {
    async fn export_schedule(
        &self,
        id: &ScheduleId,
        format: ExportFormat,
    ) -> Result<Vec<u8>, CoreError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.export_error.lock().clone() {
            return Err(e);
        }
        self.artifacts
            .lock()
            .get(&(id.as_str().to_string(), format))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("schedule {id}")))
    }
}

/// Remembers what was saved instead of touching the disk.
#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<(String, ExportFormat, Vec<u8>)>>,
}

#[async_trait]
impl FileSink for RecordingSink {
    async fn save(
        &self,
        filename: &str,
        format: ExportFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        self.saved
            .lock()
            .push((filename.to_string(), format, bytes.to_vec()));
        Ok(PathBuf::from("/exports").join(filename))
    }
}
