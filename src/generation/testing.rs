//! In-memory [`GenerationService`] used by the runner and queue tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::generation::service::{GenerationService, JobStage, ProjectId, ServiceResult};
use crate::generation::style::VideoStyle;

/// Records every call; empty source documents are rejected at attach time
#[derive(Default)]
pub struct FakeService {
    calls: Mutex<Vec<String>>,
    fail_at: Option<JobStage>,
    empty_artifact: bool,
    generate_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: JobStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn with_empty_artifact(mut self) -> Self {
        self.empty_artifact = true;
        self
    }

    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String, stage: JobStage) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(stage) {
            return Err(ServiceError::Failed {
                stage: stage.to_string(),
                detail: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationService for FakeService {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_project(&self, title: &str) -> ServiceResult<ProjectId> {
        self.record(format!("create:{}", title), JobStage::CreateProject)?;
        Ok(ProjectId::new(format!("project-{}", title.to_lowercase().replace(' ', "-"))))
    }

    async fn select_project(&self, _project: &ProjectId) -> ServiceResult<()> {
        self.record("select".to_string(), JobStage::SelectProject)
    }

    async fn attach_source(&self, _project: &ProjectId, document: &Path) -> ServiceResult<()> {
        let name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(format!("attach:{}", name), JobStage::AttachSource)?;

        let size = tokio::fs::metadata(document).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(ServiceError::Failed {
                stage: JobStage::AttachSource.to_string(),
                detail: format!("{} is not a valid document", name),
            });
        }
        Ok(())
    }

    async fn generate(
        &self,
        _project: &ProjectId,
        style: VideoStyle,
        steering: Option<&str>,
    ) -> ServiceResult<()> {
        self.record(
            format!("generate:{}:{}", style, steering.unwrap_or("-")),
            JobStage::Generate,
        )?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.generate_delay.is_zero() {
            tokio::time::sleep(self.generate_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_artifact(&self, _project: &ProjectId, dest: &Path) -> ServiceResult<()> {
        self.record("fetch".to_string(), JobStage::Fetch)?;
        let bytes: &[u8] = if self.empty_artifact { b"" } else { b"fake mp4 payload" };
        tokio::fs::write(dest, bytes)
            .await
            .map_err(|e| ServiceError::Failed {
                stage: JobStage::Fetch.to_string(),
                detail: e.to_string(),
            })
    }
}
