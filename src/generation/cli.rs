//! [`GenerationService`] backed by the `notebooklm` command-line client.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{tail, ServiceError, ToolError, DIAGNOSTIC_TAIL_CHARS};
use crate::generation::service::{GenerationService, JobStage, ProjectId, ServiceResult};
use crate::generation::style::VideoStyle;
use crate::process::{ToolCommand, ToolOutput};

/// Extraction rule for project ids: the first UUID anywhere in the client's
/// combined stdout and stderr.
fn uuid_pattern() -> &'static Regex {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    UUID_RE.get_or_init(|| {
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("static UUID pattern is valid")
    })
}

/// Pull a project id out of loosely structured client output
pub fn extract_project_id(output: &str) -> Option<ProjectId> {
    uuid_pattern().find(output).map(|m| ProjectId::new(m.as_str()))
}

/// Drives the `notebooklm` client as one subprocess per call
///
/// The client keeps its active project in process-global state, so every
/// project-scoped call re-selects its project and holds the session lock
/// while doing so.
pub struct CliGenerationService {
    config: ServiceConfig,
    session: Mutex<()>,
}

impl CliGenerationService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            session: Mutex::new(()),
        }
    }

    fn command(&self, timeout_secs: u64) -> ToolCommand {
        let cmd = ToolCommand::new(self.config.program.clone(), Duration::from_secs(timeout_secs));
        match self.config.resolved_home() {
            Some(home) => cmd.env("NOTEBOOKLM_HOME", home),
            None => cmd,
        }
    }

    async fn run(&self, stage: JobStage, command: ToolCommand) -> ServiceResult<ToolOutput> {
        command.run().await.map_err(|e| match e {
            ToolError::NotFound { program } => ServiceError::NotInstalled { program },
            ToolError::Timeout { secs, .. } => ServiceError::Timeout {
                stage: stage.to_string(),
                secs,
            },
            other => ServiceError::Failed {
                stage: stage.to_string(),
                detail: other.to_string(),
            },
        })
    }

    /// Run and require a zero exit status
    async fn run_checked(&self, stage: JobStage, command: ToolCommand) -> ServiceResult<ToolOutput> {
        let output = self.run(stage, command).await?;
        if output.success {
            Ok(output)
        } else {
            Err(ServiceError::Failed {
                stage: stage.to_string(),
                detail: tail(&output.combined(), DIAGNOSTIC_TAIL_CHARS),
            })
        }
    }

    async fn use_project(&self, project: &ProjectId) -> ServiceResult<()> {
        let cmd = self
            .command(self.config.select_timeout_secs)
            .args(["use", project.as_str()]);
        self.run_checked(JobStage::SelectProject, cmd).await?;
        Ok(())
    }
}

/// Arguments for `generate video`; the steering prompt goes last
pub fn generate_args(style: VideoStyle, steering: Option<&str>) -> Vec<String> {
    let mut args = vec!["generate".to_string(), "video".to_string(), "--wait".to_string()];
    if let Some(style) = style.service_arg() {
        args.push("--style".to_string());
        args.push(style.to_string());
    }
    if let Some(prompt) = steering.map(str::trim).filter(|p| !p.is_empty()) {
        args.push(prompt.to_string());
    }
    args
}

#[async_trait]
impl GenerationService for CliGenerationService {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn create_project(&self, title: &str) -> ServiceResult<ProjectId> {
        let cmd = self
            .command(self.config.create_timeout_secs)
            .args(["create", title]);
        let output = self.run(JobStage::CreateProject, cmd).await?;
        let combined = output.combined();

        // Some client versions print the id and still exit non-zero.
        if let Some(id) = extract_project_id(&combined) {
            info!("Created project {} for '{}'", id, title);
            return Ok(id);
        }

        if output.success {
            Err(ServiceError::MissingProjectId {
                output: tail(&combined, DIAGNOSTIC_TAIL_CHARS),
            })
        } else {
            Err(ServiceError::Failed {
                stage: JobStage::CreateProject.to_string(),
                detail: tail(&combined, DIAGNOSTIC_TAIL_CHARS),
            })
        }
    }

    async fn select_project(&self, project: &ProjectId) -> ServiceResult<()> {
        let _session = self.session.lock().await;
        self.use_project(project).await
    }

    async fn attach_source(&self, project: &ProjectId, document: &Path) -> ServiceResult<()> {
        let _session = self.session.lock().await;
        self.use_project(project).await?;
        let cmd = self
            .command(self.config.attach_timeout_secs)
            .args(["source", "add"])
            .arg(document);
        self.run_checked(JobStage::AttachSource, cmd).await?;
        debug!("Attached {:?} to {}", document, project);
        Ok(())
    }

    async fn generate(
        &self,
        project: &ProjectId,
        style: VideoStyle,
        steering: Option<&str>,
    ) -> ServiceResult<()> {
        let _session = self.session.lock().await;
        self.use_project(project).await?;
        let cmd = self
            .command(self.config.generate_timeout_secs)
            .args(generate_args(style, steering));
        self.run_checked(JobStage::Generate, cmd).await?;
        Ok(())
    }

    async fn fetch_artifact(&self, project: &ProjectId, dest: &Path) -> ServiceResult<()> {
        let _session = self.session.lock().await;
        self.use_project(project).await?;
        let cmd = self
            .command(self.config.fetch_timeout_secs)
            .args(["download", "video"])
            .arg(dest);
        // The client's exit status is unreliable here; the file on disk decides.
        let output = self.run(JobStage::Fetch, cmd).await?;
        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(ServiceError::Failed {
                stage: JobStage::Fetch.to_string(),
                detail: tail(&output.combined(), DIAGNOSTIC_TAIL_CHARS),
            }),
        }
    }

    async fn check_installed(&self) -> bool {
        let cmd = self.command(self.config.version_timeout_secs).arg("--version");
        matches!(cmd.run().await, Ok(output) if output.success)
    }

    async fn check_authenticated(&self) -> bool {
        let cmd = self.command(self.config.auth_timeout_secs).arg("list");
        match cmd.run().await {
            Ok(output) => output.success && !output.combined().contains("Not logged in"),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_uuid() {
        let out = "Created notebook 'Intro'\nID: 3F2504E0-4F89-11D3-9A0C-0305E82C3301 (active)\nother 11111111-2222-3333-4444-555555555555";
        let id = extract_project_id(out).unwrap();
        assert_eq!(id.as_str(), "3F2504E0-4F89-11D3-9A0C-0305E82C3301");
    }

    #[test]
    fn test_extract_fails_closed() {
        assert!(extract_project_id("Created notebook 42").is_none());
        assert!(extract_project_id("3f2504e0-4f89-11d3-9a0c").is_none());
    }

    #[test]
    fn test_generate_args_with_style_and_prompt() {
        let args = generate_args(VideoStyle::Whiteboard, Some("  Focus on timelines "));
        assert_eq!(args, vec!["generate", "video", "--wait", "--style", "whiteboard", "Focus on timelines"]);
    }

    #[test]
    fn test_generate_args_auto_omits_style() {
        let args = generate_args(VideoStyle::Auto, Some(""));
        assert_eq!(args, vec!["generate", "video", "--wait"]);
    }

    #[tokio::test]
    async fn test_missing_client_reports_not_installed() {
        let service = CliGenerationService::new(ServiceConfig {
            program: "reel-studio-no-such-client".to_string(),
            ..ServiceConfig::default()
        });
        assert!(!service.check_installed().await);
        assert!(!service.check_authenticated().await);
        let err = service.create_project("Title").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotInstalled { .. }));
    }
}
