//! # Media Module
//!
//! Inspection and normalization of individual clips through the external
//! ffprobe/ffmpeg tools.

pub mod normalizer;
pub mod probe;
pub mod types;

pub use normalizer::{video_filter, Normalizer};
pub use probe::MediaProber;
pub use types::{
    format_duration, ClipSlot, ClipSlots, FrameRate, MediaInfo, Resolution, TargetFormat,
};
