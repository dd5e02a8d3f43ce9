//! reqwest implementation of the backend services.
//!
//! Every JSON endpoint answers with `{ success, data, message, count }`.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use sched_core::services::{EntityStore, ExportService, Optimizer, ScheduleCatalog};
use sched_core::CoreError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use types::{
    EntityKind, ExportFormat, GenerationRequest, NewRoom, NewSubject, NewTeacher, Room, Schedule,
    ScheduleEntry, ScheduleId, ScheduleStatistics, ScheduleSummary, Subject, Teacher,
};

use crate::config::ClientConfig;

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// `GET /schedules/{id}` returns either the whole schedule or only its entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScheduleBody {
    Entries(Vec<ScheduleEntry>),
    Full(Schedule),
}

/// Which error kind a failed call turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Crud,
    Optimizer,
    Export,
}

impl Call {
    fn error(self, msg: String) -> CoreError {
        match self {
            Call::Crud => CoreError::Transport(msg),
            Call::Optimizer => CoreError::Optimizer(msg),
            Call::Export => CoreError::Export(msg),
        }
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    pub fn from_config(cfg: &ClientConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|e| CoreError::Transport(format!("http client: {e}")))?;
        Ok(Self::with_client(client, cfg.backend_url.clone()))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| CoreError::Transport(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, req: RequestBuilder, what: &str, call: Call) -> Result<Response, CoreError> {
        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::Transport(format!("{what}: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|env| env.message)
            .unwrap_or_else(|| status.to_string());
        debug!(%status, what, %message, "backend rejected request");
        Err(match status {
            StatusCode::NOT_FOUND => CoreError::NotFound(format!("{what}: {message}")),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY if call == Call::Crud => {
                CoreError::Validation(message)
            }
            _ => call.error(format!("{what}: {message}")),
        })
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
        call: Call,
    ) -> Result<Envelope<T>, CoreError> {
        let resp = self.send(req, what, call).await?;
        let env: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| call.error(format!("{what}: malformed response: {e}")))?;
        if !env.success {
            let message = env.message.unwrap_or_else(|| "request was rejected".into());
            return Err(call.error(format!("{what}: {message}")));
        }
        Ok(env)
    }

    async fn data<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
        call: Call,
    ) -> Result<T, CoreError> {
        self.envelope(req, what, call)
            .await?
            .data
            .ok_or_else(|| call.error(format!("{what}: response carries no data")))
    }

    /// Collections answer `data: null` (or omit it) when nothing is stored.
    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, CoreError> {
        let url = self.endpoint(&[collection])?;
        let env = self
            .envelope::<Vec<T>>(self.client.get(url), collection, Call::Crud)
            .await?;
        Ok(env.data.unwrap_or_default())
    }
}

#[async_trait]
impl EntityStore for HttpBackend {
    async fn list_teachers(&self) -> Result<Vec<Teacher>, CoreError> {
        self.list(EntityKind::Teacher.collection()).await
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        self.list(EntityKind::Subject.collection()).await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, CoreError> {
        self.list(EntityKind::Room.collection()).await
    }

    async fn create_teacher(&self, record: &NewTeacher) -> Result<Teacher, CoreError> {
        let url = self.endpoint(&["teachers"])?;
        self.data(self.client.post(url).json(record), "create teacher", Call::Crud)
            .await
    }

    async fn create_subject(&self, record: &NewSubject) -> Result<Subject, CoreError> {
        let url = self.endpoint(&["subjects"])?;
        self.data(self.client.post(url).json(record), "create subject", Call::Crud)
            .await
    }

    async fn create_room(&self, record: &NewRoom) -> Result<Room, CoreError> {
        let url = self.endpoint(&["rooms"])?;
        self.data(self.client.post(url).json(record), "create room", Call::Crud)
            .await
    }

    async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<(), CoreError> {
        let url = self.endpoint(&[kind.collection(), id])?;
        let what = format!("delete {kind} {id}");
        self.send(self.client.delete(url), &what, Call::Crud).await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleCatalog for HttpBackend {
    async fn list_schedules(&self) -> Result<Vec<ScheduleSummary>, CoreError> {
        self.list("schedules").await
    }

    async fn get_schedule(&self, id: &ScheduleId) -> Result<Schedule, CoreError> {
        let url = self.endpoint(&["schedules", id.as_str()])?;
        let what = format!("schedule {id}");
        let body: ScheduleBody = self.data(self.client.get(url), &what, Call::Crud).await?;
        Ok(match body {
            ScheduleBody::Full(s) => s,
            ScheduleBody::Entries(entries) => Schedule {
                id: id.clone(),
                name: String::new(),
                created_at: None,
                fitness_score: 0.0,
                execution_time: 0.0,
                entries,
            },
        })
    }

    async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), CoreError> {
        let url = self.endpoint(&["schedules", id.as_str()])?;
        let what = format!("delete schedule {id}");
        self.send(self.client.delete(url), &what, Call::Crud).await?;
        Ok(())
    }

    async fn statistics(&self) -> Result<ScheduleStatistics, CoreError> {
        let url = self.endpoint(&["schedules", "statistics"])?;
        self.data(self.client.get(url), "statistics", Call::Crud)
            .await
    }
}

#[async_trait]
impl Optimizer for HttpBackend {
    async fn submit_generation(&self, request: &GenerationRequest) -> Result<Schedule, CoreError> {
        let url = self.endpoint(&["schedules", "generate"])?;
        self.data(
            self.client.post(url).json(request),
            "generate",
            Call::Optimizer,
        )
        .await
    }
}

#[async_trait]
impl ExportService for HttpBackend {
    async fn export_schedule(
        &self,
        id: &ScheduleId,
        format: ExportFormat,
    ) -> Result<Vec<u8>, CoreError> {
        let url = self.endpoint(&["schedules", id.as_str(), "export", format.route()])?;
        let what = format!("export {id} as {format}");
        let resp = self.send(self.client.get(url), &what, Call::Export).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CoreError::Transport(format!("{what}: {e}")))?;
        Ok(bytes.to_vec())
    }
}
