//! # Composition Engine
//!
//! Orders intro, main and outro clips, normalizes them to a shared format and
//! joins them into a single output file.

pub mod engine;

// Re-exports for convenience
pub use engine::{CompositionEngine, Timeline, TimelineEntry};
