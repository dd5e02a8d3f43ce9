//! Local copy of the teachers, subjects and rooms.
//!
//! A refresh fetches the three collections concurrently and swaps them in
//! together, so readers never see one list from an older refresh next to
//! another from a newer one. When refreshes overlap, the one started last
//! wins; an older refresh finishing late is discarded.

use parking_lot::RwLock;
use sched_core::services::EntityStore;
use sched_core::{validate_new_room, validate_new_subject, validate_new_teacher, CoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use types::{EntityKind, EntitySet, NewRoom, NewSubject, NewTeacher, Room, Subject, Teacher};

/// Every collection that could not be fetched in one refresh.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("could not load {}", describe(.failures))]
pub struct RefreshError {
    pub failures: Vec<(EntityKind, CoreError)>,
}

fn describe(failures: &[(EntityKind, CoreError)]) -> String {
    failures
        .iter()
        .map(|(kind, e)| format!("{kind} ({e})"))
        .collect::<Vec<_>>()
        .join(", ")
}

struct Committed {
    epoch: u64,
    entities: Arc<EntitySet>,
    /// Failure of the newest refresh to finish, tagged with its epoch.
    error: Option<(u64, RefreshError)>,
}

pub struct EntityCache {
    store: Arc<dyn EntityStore>,
    current: RwLock<Committed>,
    started: AtomicU64,
}

impl EntityCache {
    /// Starts empty; call [`refresh`](Self::refresh) to load.
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Committed {
                epoch: 0,
                entities: Arc::new(EntitySet::default()),
                error: None,
            }),
            started: AtomicU64::new(0),
        }
    }

    pub fn entities(&self) -> Arc<EntitySet> {
        self.current.read().entities.clone()
    }

    pub fn can_generate(&self) -> bool {
        self.current.read().entities.can_generate()
    }

    /// Failure of the most recent refresh, cleared by a good one started
    /// after it.
    pub fn last_error(&self) -> Option<RefreshError> {
        self.current.read().error.as_ref().map(|(_, e)| e.clone())
    }

    pub async fn refresh(&self) -> Result<Arc<EntitySet>, RefreshError> {
        let epoch = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let (teachers, subjects, rooms) = tokio::join!(
            self.store.list_teachers(),
            self.store.list_subjects(),
            self.store.list_rooms(),
        );

        let set = match (teachers, subjects, rooms) {
            (Ok(teachers), Ok(subjects), Ok(rooms)) => Arc::new(EntitySet {
                teachers,
                subjects,
                rooms,
            }),
            (t, s, r) => {
                let failures = [
                    (EntityKind::Teacher, t.err()),
                    (EntityKind::Subject, s.err()),
                    (EntityKind::Room, r.err()),
                ]
                .into_iter()
                .filter_map(|(kind, e)| e.map(|e| (kind, e)))
                .collect();
                let err = RefreshError { failures };
                let mut cur = self.current.write();
                let newer_error = cur.error.as_ref().is_some_and(|(at, _)| *at > epoch);
                if epoch >= cur.epoch && !newer_error {
                    warn!(epoch, error = %err, "entity refresh failed, keeping previous data");
                    cur.error = Some((epoch, err.clone()));
                }
                return Err(err);
            }
        };

        {
            let mut cur = self.current.write();
            if epoch < cur.epoch {
                debug!(epoch, newer = cur.epoch, "stale entity refresh discarded");
                return Ok(cur.entities.clone());
            }
            cur.epoch = epoch;
            cur.entities = set.clone();
            if cur.error.as_ref().is_some_and(|(at, _)| *at <= epoch) {
                cur.error = None;
            }
        }
        info!(
            epoch,
            teachers = set.teachers.len(),
            subjects = set.subjects.len(),
            rooms = set.rooms.len(),
            "entities refreshed"
        );
        Ok(set)
    }

    pub async fn create_teacher(&self, record: &NewTeacher) -> Result<Teacher, CoreError> {
        validate_new_teacher(record)?;
        let created = self.store.create_teacher(record).await?;
        info!(teacher = %created.id, "teacher created");
        self.refresh_after_change().await;
        Ok(created)
    }

    pub async fn create_subject(&self, record: &NewSubject) -> Result<Subject, CoreError> {
        validate_new_subject(record, &self.entities())?;
        let created = self.store.create_subject(record).await?;
        info!(subject = %created.id, "subject created");
        self.refresh_after_change().await;
        Ok(created)
    }

    pub async fn create_room(&self, record: &NewRoom) -> Result<Room, CoreError> {
        validate_new_room(record)?;
        let created = self.store.create_room(record).await?;
        info!(room = %created.id, "room created");
        self.refresh_after_change().await;
        Ok(created)
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), CoreError> {
        self.store.delete_entity(kind, id).await?;
        info!(%kind, id, "entity deleted");
        self.refresh_after_change().await;
        Ok(())
    }

    // The write already happened; a failed reload only leaves the cache stale.
    async fn refresh_after_change(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "reload after change failed");
        }
    }
}
