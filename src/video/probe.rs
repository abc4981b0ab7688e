use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProbeFailure, ToolError};
use crate::process::ToolCommand;
use crate::video::types::MediaInfo;

/// Inspects media files with ffprobe
///
/// Probing never fails: anything that goes wrong yields a zero-valued
/// [`MediaInfo`] with its `failure` flag set.
#[derive(Debug, Clone)]
pub struct MediaProber {
    program: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

impl Default for MediaProber {
    fn default() -> Self {
        Self::new("ffprobe", Duration::from_secs(30))
    }
}

impl MediaProber {
    pub fn new<S: Into<String>>(program: S, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Probe a file. Spawns exactly one ffprobe process.
    pub async fn probe<P: AsRef<Path>>(&self, path: P) -> MediaInfo {
        let path = path.as_ref();

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                debug!("Cannot probe {:?}: not a readable file", path);
                return MediaInfo::unknown(ProbeFailure::Unreadable);
            }
        };

        let command = ToolCommand::new(self.program.clone(), self.timeout)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);

        let output = match command.run().await {
            Ok(output) => output,
            Err(ToolError::NotFound { .. }) => {
                warn!("{} not found, media info unavailable", self.program);
                return MediaInfo::unknown(ProbeFailure::ToolMissing);
            }
            Err(ToolError::Timeout { .. }) => return MediaInfo::unknown(ProbeFailure::Timeout),
            Err(e) => {
                warn!("Probe of {:?} failed: {}", path, e);
                return MediaInfo::unknown(ProbeFailure::NonZeroExit);
            }
        };

        if !output.success {
            debug!("ffprobe rejected {:?}: {}", path, output.diagnostic_tail());
            return MediaInfo::unknown(ProbeFailure::NonZeroExit);
        }

        match parse_ffprobe_json(&output.stdout) {
            Some(mut info) => {
                info.size = size;
                debug!(
                    "Probed {:?}: {} @ {:.2}fps, {:.2}s, audio: {}",
                    path,
                    info.resolution_label(),
                    info.fps,
                    info.duration,
                    info.has_audio
                );
                info
            }
            None => MediaInfo::unknown(ProbeFailure::Unparseable),
        }
    }
}

/// Build [`MediaInfo`] (without size) from ffprobe's JSON output
fn parse_ffprobe_json(json: &str) -> Option<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json).ok()?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio: Vec<&FfprobeStream> = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .collect();

    let duration = parse_seconds(probe.format.duration.as_deref()).unwrap_or(0.0);
    let audio_duration = audio
        .first()
        .and_then(|a| parse_seconds(a.duration.as_deref()))
        .unwrap_or(0.0);

    Some(MediaInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        fps: video
            .and_then(|v| v.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
            .unwrap_or(0.0),
        has_audio: !audio.is_empty(),
        audio_streams: audio.len(),
        audio_duration,
        size: 0,
        failure: None,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parse a frame rate such as "30000/1001" or "25"
fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (fps.is_finite() && fps >= 0.0).then_some(fps)
}
