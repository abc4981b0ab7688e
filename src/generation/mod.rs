//! # Generation Module
//!
//! The boundary to the external document-to-video service and the runner that
//! walks one document through its stages.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reel_studio::{
//!     composition::CompositionEngine,
//!     config::Config,
//!     generation::{CliGenerationService, JobRequest, JobRunner},
//!     progress::LogProgress,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let service = Arc::new(CliGenerationService::new(config.service.clone()));
//! let engine = Arc::new(CompositionEngine::new(&config));
//! let runner = JobRunner::new(service, engine, config.service.ingest_delay());
//!
//! let request = JobRequest::new("notes.pdf", "Notes", "out/", config.batch.to_batch_config());
//! let video = runner.run(&request, &LogProgress).await?;
//! println!("Video ready: {}", video.display());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod runner;
pub mod service;
pub mod style;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::CliGenerationService;
pub use runner::{display_title, JobRequest, JobRunner};
pub use service::{GenerationService, JobStage, ProjectId, ServiceResult};
pub use style::VideoStyle;
