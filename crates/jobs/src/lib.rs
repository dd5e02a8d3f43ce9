//! Single-flight driver for schedule generation.
//!
//! A run moves `Idle -> Submitting -> AwaitingResult -> Succeeded | Failed`.
//! Only one run may be in flight; a second `generate` gets [`CoreError::Busy`].
//! Each run ends in exactly one [`GenerationEvent`] unless it was abandoned,
//! in which case nothing is announced and the late answer is dropped.

use parking_lot::RwLock;
use sched_core::services::{Optimizer, ScheduleCatalog};
use sched_core::{validate_entities, validate_parameters, CoreError};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use types::{EntitySet, GenerationParameters, GenerationRequest, ScheduleId, ScheduleSummary};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    fn new() -> Self {
        RunId(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationState {
    Idle,
    Submitting,
    AwaitingResult,
    Succeeded { schedule: ScheduleId },
    Failed { error: CoreError },
}

impl GenerationState {
    pub fn phase(&self) -> Phase {
        match self {
            GenerationState::Idle => Phase::Idle,
            GenerationState::Submitting => Phase::Submitting,
            GenerationState::AwaitingResult => Phase::AwaitingResult,
            GenerationState::Succeeded { .. } => Phase::Succeeded,
            GenerationState::Failed { .. } => Phase::Failed,
        }
    }

    pub fn in_flight(&self) -> bool {
        matches!(
            self,
            GenerationState::Submitting | GenerationState::AwaitingResult
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Submitting,
    AwaitingResult,
    Succeeded,
    Failed,
}

/// Sent once a run settles. For a success the schedule list has already
/// been re-fetched, so [`GenerationOrchestrator::snapshot`] taken on receipt
/// includes the new schedule.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
    Succeeded { run: RunId, schedule: ScheduleId },
    Failed { run: RunId, error: CoreError },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSnapshot {
    pub run: Option<RunId>,
    pub state: GenerationState,
    /// Phases of the current (or last) run, starting from `Idle`.
    pub trail: Vec<Phase>,
    pub last_success: Option<ScheduleId>,
    pub schedules: Vec<ScheduleSummary>,
}

struct Inner {
    run: Option<RunId>,
    state: GenerationState,
    trail: Vec<Phase>,
    last_success: Option<ScheduleId>,
    schedules: Vec<ScheduleSummary>,
}

impl Inner {
    fn is_current(&self, run: &RunId) -> bool {
        self.run.as_ref() == Some(run)
    }

    fn enter(&mut self, state: GenerationState) {
        self.trail.push(state.phase());
        self.state = state;
    }
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    inner: Arc<RwLock<Inner>>,
    optimizer: Arc<dyn Optimizer>,
    catalog: Arc<dyn ScheduleCatalog>,
    events: broadcast::Sender<GenerationEvent>,
}

impl GenerationOrchestrator {
    pub fn new(optimizer: Arc<dyn Optimizer>, catalog: Arc<dyn ScheduleCatalog>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                run: None,
                state: GenerationState::Idle,
                trail: vec![Phase::Idle],
                last_success: None,
                schedules: Vec::new(),
            })),
            optimizer,
            catalog,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        let r = self.inner.read();
        GenerationSnapshot {
            run: r.run.clone(),
            state: r.state.clone(),
            trail: r.trail.clone(),
            last_success: r.last_success.clone(),
            schedules: r.schedules.clone(),
        }
    }

    pub fn state(&self) -> GenerationState {
        self.inner.read().state.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.read().state.in_flight()
    }

    /// Runs one generation to completion.
    ///
    /// Dropping the returned future while the run is in flight counts as
    /// abandoning it.
    pub async fn generate(
        &self,
        entities: &EntitySet,
        parameters: GenerationParameters,
    ) -> Result<ScheduleId, CoreError> {
        let run = self.begin()?;
        let mut guard = AbandonGuard {
            inner: &self.inner,
            run: &run,
            armed: true,
        };

        let checked = validate_parameters(&parameters).and_then(|()| validate_entities(entities));
        if let Err(e) = checked {
            guard.armed = false;
            self.fail(&run, e.clone())?;
            return Err(e);
        }

        let request = GenerationRequest {
            entities: entities.clone(),
            parameters,
        };
        self.transition(&run, GenerationState::AwaitingResult)?;
        info!(
            run = %run,
            teachers = request.entities.teachers.len(),
            subjects = request.entities.subjects.len(),
            rooms = request.entities.rooms.len(),
            "generation submitted"
        );

        let outcome = self.optimizer.submit_generation(&request).await;

        let schedule = match outcome {
            Ok(s) if !s.id.is_valid() => {
                let e = CoreError::Optimizer(format!(
                    "optimizer returned unusable schedule id {:?}",
                    s.id.0
                ));
                self.fail(&run, e.clone())?;
                return Err(e);
            }
            Ok(s) => s,
            Err(e) => {
                self.fail(&run, e.clone())?;
                return Err(e);
            }
        };

        if schedule.entries.is_empty() {
            warn!(run = %run, schedule = %schedule.id, "optimizer returned an empty schedule");
        }
        let current = self.inner.read().is_current(&run);
        if !current {
            debug!(run = %run, schedule = %schedule.id, "late result of abandoned run discarded");
            return Err(CoreError::Abandoned);
        }
        let listed = self.catalog.list_schedules().await;
        guard.armed = false;
        self.succeed(&run, schedule.id.clone(), listed)?;
        Ok(schedule.id)
    }

    /// Starts a run on the runtime and returns right away; the outcome comes
    /// through [`subscribe`](Self::subscribe).
    pub fn spawn_generate(
        &self,
        entities: EntitySet,
        parameters: GenerationParameters,
    ) -> tokio::task::JoinHandle<Result<ScheduleId, CoreError>> {
        let this = self.clone();
        tokio::spawn(async move { this.generate(&entities, parameters).await })
    }

    /// Stops reacting to the in-flight run. The remote job keeps going; its
    /// answer is ignored.
    pub fn abandon(&self) -> Option<RunId> {
        let mut w = self.inner.write();
        if !w.state.in_flight() {
            return None;
        }
        let run = w.run.take();
        w.enter(GenerationState::Idle);
        if let Some(run) = &run {
            info!(run = %run, "generation abandoned");
        }
        run
    }

    fn begin(&self) -> Result<RunId, CoreError> {
        let mut w = self.inner.write();
        if w.state.in_flight() {
            debug!("generation rejected, another run is in flight");
            return Err(CoreError::Busy);
        }
        let run = RunId::new();
        w.run = Some(run.clone());
        w.trail.clear();
        w.state = GenerationState::Idle;
        w.trail.push(Phase::Idle);
        w.enter(GenerationState::Submitting);
        debug!(run = %run, "generation started");
        Ok(run)
    }

    fn transition(&self, run: &RunId, state: GenerationState) -> Result<(), CoreError> {
        let mut w = self.inner.write();
        if !w.is_current(run) {
            return Err(CoreError::Abandoned);
        }
        w.enter(state);
        Ok(())
    }

    fn fail(&self, run: &RunId, error: CoreError) -> Result<(), CoreError> {
        {
            let mut w = self.inner.write();
            if !w.is_current(run) {
                debug!(run = %run, %error, "late failure of abandoned run discarded");
                return Err(CoreError::Abandoned);
            }
            w.enter(GenerationState::Failed {
                error: error.clone(),
            });
        }
        error!(run = %run, %error, "generation failed");
        let _ = self.events.send(GenerationEvent::Failed {
            run: run.clone(),
            error,
        });
        Ok(())
    }

    fn succeed(
        &self,
        run: &RunId,
        schedule: ScheduleId,
        listed: Result<Vec<ScheduleSummary>, CoreError>,
    ) -> Result<(), CoreError> {
        {
            let mut w = self.inner.write();
            if !w.is_current(run) {
                debug!(run = %run, schedule = %schedule, "late result of abandoned run discarded");
                return Err(CoreError::Abandoned);
            }
            w.enter(GenerationState::Succeeded {
                schedule: schedule.clone(),
            });
            w.last_success = Some(schedule.clone());
            match listed {
                Ok(list) => {
                    debug!(run = %run, count = list.len(), "schedule list refreshed");
                    w.schedules = list;
                }
                Err(e) => warn!(
                    run = %run,
                    error = %e,
                    "schedule list refresh failed, keeping previous list"
                ),
            }
        }
        info!(run = %run, schedule = %schedule, "generation succeeded");
        let _ = self.events.send(GenerationEvent::Succeeded {
            run: run.clone(),
            schedule,
        });
        Ok(())
    }
}

/// Puts the orchestrator back to `Idle` when a `generate` future is dropped
/// mid-flight.
struct AbandonGuard<'a> {
    inner: &'a RwLock<Inner>,
    run: &'a RunId,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut w = self.inner.write();
        if w.is_current(self.run) && w.state.in_flight() {
            w.run = None;
            w.enter(GenerationState::Idle);
            info!(run = %self.run, "generation dropped by caller");
        }
    }
}
