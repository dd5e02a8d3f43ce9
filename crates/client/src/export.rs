use async_trait::async_trait;
use sched_core::services::{ExportService, FileSink};
use sched_core::CoreError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use types::{ExportFormat, ScheduleId};

/// `schedule_<id>.<ext>`
pub fn default_filename(id: &ScheduleId, format: ExportFormat) -> String {
    format!("schedule_{}.{}", id, format.extension())
}

/// Fetches a rendered schedule and hands it to the sink. Nothing is saved
/// unless a non-empty artifact came back.
pub struct ExportDispatcher {
    service: Arc<dyn ExportService>,
    sink: Arc<dyn FileSink>,
}

impl ExportDispatcher {
    pub fn new(service: Arc<dyn ExportService>, sink: Arc<dyn FileSink>) -> Self {
        Self { service, sink }
    }

    pub async fn export_artifact(
        &self,
        id: &ScheduleId,
        format: ExportFormat,
    ) -> Result<PathBuf, CoreError> {
        self.export_artifact_named(id, format, None).await
    }

    pub async fn export_artifact_named(
        &self,
        id: &ScheduleId,
        format: ExportFormat,
        filename: Option<&str>,
    ) -> Result<PathBuf, CoreError> {
        if !id.is_valid() {
            return Err(CoreError::Export(format!("invalid schedule id {:?}", id.as_str())));
        }

        let bytes = self
            .service
            .export_schedule(id, format)
            .await
            .map_err(|e| match e {
                CoreError::Transport(_) | CoreError::Export(_) => e,
                CoreError::NotFound(_) => CoreError::Export(format!("schedule {id} does not exist")),
                other => CoreError::Export(other.to_string()),
            })?;
        if bytes.is_empty() {
            warn!(schedule = %id, %format, "export returned no data");
            return Err(CoreError::Export(format!("export of schedule {id} came back empty")));
        }

        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| default_filename(id, format));
        let path = self.sink.save(&name, format, &bytes).await?;
        info!(schedule = %id, %format, bytes = bytes.len(), path = %path.display(), "schedule exported");
        Ok(path)
    }
}

/// Writes artifacts into one directory, creating it on first use.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn save(
        &self,
        filename: &str,
        _format: ExportFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        if filename.is_empty()
            || filename == ".."
            || filename.contains(['/', '\\'])
        {
            return Err(CoreError::Export(format!("bad file name {filename:?}")));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CoreError::Export(format!("{}: {e}", self.dir.display())))?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoreError::Export(format!("{}: {e}", path.display())))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryBackend, RecordingSink};
    use std::sync::atomic::Ordering;

    fn dispatcher(backend: &Arc<MemoryBackend>) -> (ExportDispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (ExportDispatcher::new(backend.clone(), sink.clone()), sink)
    }

    #[tokio::test]
    async fn saves_under_default_name() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        backend
            .artifacts
            .lock()
            .insert(("12".into(), ExportFormat::Xlsx), b"PK\x03\x04".to_vec());
        let (export, sink) = dispatcher(&backend);

        let path = export
            .export_artifact(&"12".into(), ExportFormat::Xlsx)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/exports/schedule_12.xlsx"));
        let saved = sink.saved.lock();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "schedule_12.xlsx");
        assert_eq!(saved[0].1, ExportFormat::Xlsx);
        assert_eq!(saved[0].2, b"PK\x03\x04");
    }

    #[tokio::test]
    async fn caller_may_pick_the_name() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        backend
            .artifacts
            .lock()
            .insert(("12".into(), ExportFormat::Pdf), b"%PDF".to_vec());
        let (export, sink) = dispatcher(&backend);

        export
            .export_artifact_named(&"12".into(), ExportFormat::Pdf, Some("term1.pdf"))
            .await
            .unwrap();
        assert_eq!(sink.saved.lock()[0].0, "term1.pdf");
    }

    #[tokio::test]
    async fn unknown_schedule_is_an_export_error_and_saves_nothing() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        let (export, sink) = dispatcher(&backend);

        let err = export
            .export_artifact(&"999".into(), ExportFormat::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Export(ref m) if m.contains("999")), "{err:?}");
        assert!(sink.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn invalid_id_never_reaches_the_service() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        let (export, sink) = dispatcher(&backend);

        for bad in ["", "../etc", "12 13"] {
            let err = export
                .export_artifact(&bad.into(), ExportFormat::Pdf)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Export(_)));
        }
        assert_eq!(backend.export_calls.load(Ordering::SeqCst), 0);
        assert!(sink.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_artifact_is_rejected() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        backend
            .artifacts
            .lock()
            .insert(("12".into(), ExportFormat::Pdf), Vec::new());
        let (export, sink) = dispatcher(&backend);

        let err = export
            .export_artifact(&"12".into(), ExportFormat::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Export(_)));
        assert!(sink.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_keep_their_kind() {
        let backend = MemoryBackend::with_counts(0, 0, 0);
        *backend.export_error.lock() = Some(CoreError::Transport("connection refused".into()));
        let (export, sink) = dispatcher(&backend);

        let err = export
            .export_artifact(&"12".into(), ExportFormat::Pdf)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Transport("connection refused".into()));
        assert!(sink.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn directory_sink_writes_and_refuses_paths() {
        let dir = std::env::temp_dir().join(format!("timetable-export-{}", uuid::Uuid::new_v4()));
        let sink = DirectorySink::new(&dir);

        let path = sink
            .save("schedule_1.pdf", ExportFormat::Pdf, b"%PDF")
            .await
            .unwrap();
        assert_eq!(path, dir.join("schedule_1.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");

        for bad in ["", "..", "../x.pdf", "a\\b.pdf"] {
            assert!(sink.save(bad, ExportFormat::Pdf, b"x").await.is_err());
        }
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
