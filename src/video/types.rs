use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProbeFailure};

/// Structural metadata of a media file
///
/// Recomputed on every probe and never cached: re-probe after the file changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,

    /// Width in pixels (0 if undetermined)
    pub width: u32,

    /// Height in pixels (0 if undetermined)
    pub height: u32,

    /// Frames per second
    pub fps: f64,

    /// Whether the file carries at least one audio stream
    pub has_audio: bool,

    /// Number of audio streams
    pub audio_streams: usize,

    /// Duration of the first audio stream in seconds (0 if none or undetermined)
    pub audio_duration: f64,

    /// File size in bytes
    pub size: u64,

    /// Set when the probe degraded to this zero-valued result
    pub failure: Option<ProbeFailure>,
}

impl MediaInfo {
    /// Zero-valued result for a file that could not be inspected
    pub fn unknown(failure: ProbeFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn is_known(&self) -> bool {
        self.failure.is_none()
    }

    /// Duration as `m:ss`
    pub fn duration_label(&self) -> String {
        format_duration(self.duration)
    }

    pub fn resolution_label(&self) -> String {
        format!("{}×{}", self.width, self.height)
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

/// Format seconds as `m:ss`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Output resolution presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1920x1080")]
    FullHd,
    #[serde(rename = "1280x720")]
    Hd,
    #[serde(rename = "3840x2160")]
    Uhd,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::FullHd, Resolution::Hd, Resolution::Uhd];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::FullHd => (1920, 1080),
            Self::Hd => (1280, 720),
            Self::Uhd => (3840, 2160),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullHd => "1920x1080",
            Self::Hd => "1280x720",
            Self::Uhd => "3840x2160",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FullHd
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the labelled form too, e.g. "1920x1080 (Full HD)"
        let key = s.split_whitespace().next().unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == key)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "resolution".to_string(),
                value: s.to_string(),
            })
    }
}

/// Output frame rate presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps24,
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Fps24 => 24,
            Self::Fps30 => 30,
            Self::Fps60 => 60,
        }
    }

    /// Duration of one frame in seconds
    pub fn frame_interval(self) -> f64 {
        1.0 / self.as_u32() as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::Fps30
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            24 => Ok(Self::Fps24),
            30 => Ok(Self::Fps30),
            60 => Ok(Self::Fps60),
            other => Err(ConfigError::InvalidValue {
                key: "fps".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        rate.as_u32()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl FromStr for FrameRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "fps".to_string(),
            value: s.to_string(),
        })?;
        Self::try_from(value)
    }
}

/// Geometry and timing every normalized clip is brought to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetFormat {
    pub resolution: Resolution,
    pub fps: FrameRate,
}

impl TargetFormat {
    pub fn new(resolution: Resolution, fps: FrameRate) -> Self {
        Self { resolution, fps }
    }

    pub fn width(&self) -> u32 {
        self.resolution.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.resolution.dimensions().1
    }
}

/// Position of a clip in the final video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSlot {
    Intro,
    Main,
    Outro,
}

impl ClipSlot {
    pub const ORDER: [ClipSlot; 3] = [ClipSlot::Intro, ClipSlot::Main, ClipSlot::Outro];

    pub fn label(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Main => "main",
            Self::Outro => "outro",
        }
    }
}

impl fmt::Display for ClipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Intro, main and outro clip references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipSlots {
    pub intro: Option<PathBuf>,
    pub main: Option<PathBuf>,
    pub outro: Option<PathBuf>,
}

impl ClipSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main<P: Into<PathBuf>>(main: P) -> Self {
        Self {
            main: Some(main.into()),
            ..Self::default()
        }
    }

    pub fn intro<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.intro = path.map(Into::into);
        self
    }

    pub fn outro<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.outro = path.map(Into::into);
        self
    }

    pub fn get(&self, slot: ClipSlot) -> Option<&Path> {
        match slot {
            ClipSlot::Intro => self.intro.as_deref(),
            ClipSlot::Main => self.main.as_deref(),
            ClipSlot::Outro => self.outro.as_deref(),
        }
    }

    /// Set slots in playback order, regardless of whether the files exist
    pub fn iter(&self) -> impl Iterator<Item = (ClipSlot, &Path)> {
        ClipSlot::ORDER
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|path| (slot, path)))
    }

    pub fn has_bookends(&self) -> bool {
        self.intro.is_some() || self.outro.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("1280x720".parse::<Resolution>().unwrap(), Resolution::Hd);
        assert_eq!("1920x1080 (Full HD)".parse::<Resolution>().unwrap(), Resolution::FullHd);
        assert!("800x600".parse::<Resolution>().is_err());
        assert_eq!(Resolution::Uhd.dimensions(), (3840, 2160));
    }

    #[test]
    fn test_frame_rate_presets() {
        assert_eq!(FrameRate::try_from(60).unwrap(), FrameRate::Fps60);
        assert!(FrameRate::try_from(25).is_err());
        assert!((FrameRate::Fps30.frame_interval() - 1.0 / 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_slots_iterate_in_playback_order() {
        let slots = ClipSlots::with_main("main.mp4")
            .outro(Some("outro.mp4"))
            .intro(Some("intro.mp4"));
        let order: Vec<ClipSlot> = slots.iter().map(|(slot, _)| slot).collect();
        assert_eq!(order, vec![ClipSlot::Intro, ClipSlot::Main, ClipSlot::Outro]);
        assert!(slots.has_bookends());
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(125.9), "2:05");
        let info = MediaInfo::unknown(ProbeFailure::Unreadable);
        assert_eq!(info.duration_label(), "0:00");
        assert!(!info.is_known());
    }
}
