use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::generation::style::VideoStyle;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Identifier the generation service assigns to a project
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stages a generation job goes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    CreateProject,
    SelectProject,
    AttachSource,
    Generate,
    Fetch,
    Compose,
}

impl JobStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateProject => "create project",
            Self::SelectProject => "select project",
            Self::AttachSource => "attach source",
            Self::Generate => "generate",
            Self::Fetch => "fetch artifact",
            Self::Compose => "compose",
        }
    }

    /// Progress line shown before the stage runs
    pub fn progress_message(self) -> &'static str {
        match self {
            Self::CreateProject => "Creating project...",
            Self::SelectProject => "Selecting project...",
            Self::AttachSource => "Uploading source document...",
            Self::Generate => "Generating video (this can take several minutes)...",
            Self::Fetch => "Downloading video...",
            Self::Compose => "Adding intro/outro...",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The external document-to-video service
///
/// Every call is bounded by a timeout on the implementation side and reports
/// success, a structured failure, or [`ServiceError::Timeout`].
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Returns a short name for logs
    fn name(&self) -> &str;

    async fn create_project(&self, title: &str) -> ServiceResult<ProjectId>;

    async fn select_project(&self, project: &ProjectId) -> ServiceResult<()>;

    async fn attach_source(&self, project: &ProjectId, document: &Path) -> ServiceResult<()>;

    /// Blocks until the service reports the video is ready
    async fn generate(
        &self,
        project: &ProjectId,
        style: VideoStyle,
        steering: Option<&str>,
    ) -> ServiceResult<()>;

    async fn fetch_artifact(&self, project: &ProjectId, dest: &Path) -> ServiceResult<()>;

    /// Whether the client is reachable at all
    async fn check_installed(&self) -> bool {
        true
    }

    /// Whether the client holds a logged-in session
    async fn check_authenticated(&self) -> bool {
        true
    }
}
