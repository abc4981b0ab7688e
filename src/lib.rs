//! # Reel-Studio
//!
//! Turn documents into narrated overview videos and bookend them with your
//! own intro and outro clips.
//!
//! This library provides a batch queue that drives an external
//! document-to-video service, plus an ffmpeg-based pipeline that normalizes
//! heterogeneous clips to one format and joins them losslessly.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use reel_studio::{
//!     composition::CompositionEngine,
//!     config::Config,
//!     progress::LogProgress,
//!     video::{ClipSlots, FrameRate, Resolution, TargetFormat},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let engine = CompositionEngine::new(&config);
//!
//! let slots = ClipSlots::with_main("overview.mp4")
//!     .intro(Some("intro.mp4"))
//!     .outro(Some("outro.mov"));
//! let target = TargetFormat::new(Resolution::FullHd, FrameRate::Fps30);
//!
//! engine
//!     .compose(&slots, target, Path::new("final.mp4"), &LogProgress)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`video`] - Media probing, clip normalization and format types
//! - [`composition`] - Intro/main/outro composition engine
//! - [`generation`] - Generation service boundary and per-document job runner
//! - [`queue`] - Batch queue and sweep processing
//! - [`config`] - Configuration management
//! - [`process`] - Timeout-bounded external tool invocation

pub mod composition;
pub mod config;
pub mod error;
pub mod generation;
pub mod process;
pub mod progress;
pub mod queue;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::CompositionEngine,
    config::{BatchConfig, Config},
    error::{Result, StudioError},
    generation::{CliGenerationService, GenerationService, JobRequest, JobRunner, VideoStyle},
    queue::{BatchQueue, ItemStatus, QueueItem},
    video::{ClipSlots, MediaInfo, MediaProber, TargetFormat},
};
