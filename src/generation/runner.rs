use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    composition::CompositionEngine,
    config::BatchConfig,
    error::{JobError, Result, ServiceError},
    generation::service::{GenerationService, JobStage},
    progress::ProgressObserver,
};

/// Everything one generation job needs
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Source document uploaded to the service
    pub document: PathBuf,

    /// Project title shown by the service
    pub title: String,

    /// Directory the artifact (and the composed result) is written to
    pub output_dir: PathBuf,

    /// Style, steering text, target format and bookend clips
    pub batch: BatchConfig,
}

impl JobRequest {
    pub fn new<P: Into<PathBuf>, O: Into<PathBuf>>(
        document: P,
        title: impl Into<String>,
        output_dir: O,
        batch: BatchConfig,
    ) -> Self {
        Self {
            document: document.into(),
            title: title.into(),
            output_dir: output_dir.into(),
            batch,
        }
    }

    /// Where the service's video is downloaded
    ///
    /// With bookends configured the download is an intermediate and gets a
    /// `_raw` suffix, so it can never be the composition output.
    fn artifact_path(&self) -> PathBuf {
        let stem = file_stem_slug(&self.title);
        if self.batch.has_bookends() {
            self.output_dir.join(format!("{}_raw.mp4", stem))
        } else {
            self.output_dir.join(format!("{}.mp4", stem))
        }
    }

    fn final_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", file_stem_slug(&self.title)))
    }
}

/// Drives one document through the generation service
///
/// Stages run strictly in order and the first failure aborts the job:
/// create project → select → attach source → generate → fetch → compose
/// (compose only when an intro or outro is configured).
pub struct JobRunner {
    service: Arc<dyn GenerationService>,
    engine: Arc<CompositionEngine>,
    ingest_delay: Duration,
}

impl JobRunner {
    pub fn new(
        service: Arc<dyn GenerationService>,
        engine: Arc<CompositionEngine>,
        ingest_delay: Duration,
    ) -> Self {
        Self {
            service,
            engine,
            ingest_delay,
        }
    }

    pub fn service(&self) -> &dyn GenerationService {
        self.service.as_ref()
    }

    /// Run the job and return the path of the finished video
    pub async fn run(&self, request: &JobRequest, observer: &dyn ProgressObserver) -> Result<PathBuf> {
        let readable = tokio::fs::metadata(&request.document)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !readable {
            return Err(JobError::SourceUnreadable {
                path: request.document.clone(),
            }
            .into());
        }

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let batch = &request.batch;
        let service = self.service.as_ref();

        info!("📄 Generating '{}' from {:?} via {}", request.title, request.document, service.name());

        report(observer, JobStage::CreateProject);
        let project = service.create_project(&request.title).await?;
        observer.on_project_created(&project);

        report(observer, JobStage::SelectProject);
        service.select_project(&project).await?;

        report(observer, JobStage::AttachSource);
        service.attach_source(&project, &request.document).await?;

        // Ingestion is asynchronous on the server side.
        if !self.ingest_delay.is_zero() {
            tokio::time::sleep(self.ingest_delay).await;
        }

        report(observer, JobStage::Generate);
        service
            .generate(&project, batch.style, batch.steering.as_deref())
            .await?;

        report(observer, JobStage::Fetch);
        let artifact = request.artifact_path();
        service.fetch_artifact(&project, &artifact).await?;
        ensure_non_empty(&artifact).await?;

        if !batch.has_bookends() {
            info!("   ✅ '{}' ready: {:?}", request.title, artifact);
            return Ok(artifact);
        }

        report(observer, JobStage::Compose);
        let slots = batch.slots_for(&artifact);
        let output = self
            .engine
            .compose(&slots, batch.target, &request.final_path(), observer)
            .await?;

        info!("   ✅ '{}' ready: {:?}", request.title, output);
        Ok(output)
    }
}

fn report(observer: &dyn ProgressObserver, stage: JobStage) {
    observer.on_message(stage.progress_message());
}

async fn ensure_non_empty(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => {
            warn!("Service reported success but {:?} is missing or empty", path);
            Err(ServiceError::EmptyArtifact {
                path: path.to_path_buf(),
            }
            .into())
        }
    }
}

/// Default project title for an uploaded file: "deep_learning_notes.pdf" → "Deep Learning Notes"
pub fn display_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let mut title = String::with_capacity(stem.len());
    let mut prev_alpha = false;
    for c in stem.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            title.push(c);
            prev_alpha = false;
        }
    }
    title
}

/// File-system friendly name derived from a title
pub fn file_stem_slug(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "video".to_string()
    } else {
        slug.to_string()
    }
}
