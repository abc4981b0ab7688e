use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EncodingConfig;
use crate::error::{CompositionError, Result, ToolError};
use crate::process::ToolCommand;
use crate::video::probe::MediaProber;
use crate::video::types::{MediaInfo, TargetFormat};

/// Brings a clip to a fixed geometry, frame rate and stream layout
///
/// Every clip normalized with the same [`TargetFormat`] and [`EncodingConfig`]
/// ends up with identical stream parameters, which is what allows the
/// composition engine to join them with `-c copy`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    ffmpeg: String,
    timeout: Duration,
    prober: MediaProber,
    encoding: EncodingConfig,
}

impl Normalizer {
    pub fn new<S: Into<String>>(
        ffmpeg: S,
        timeout: Duration,
        prober: MediaProber,
        encoding: EncodingConfig,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
            prober,
            encoding,
        }
    }

    /// Normalize `source` into `dest_dir/norm_<label>.mp4`
    pub async fn normalize(
        &self,
        source: &Path,
        label: &str,
        target: TargetFormat,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let info = self.prober.probe(source).await;
        warn_if_degraded(source, label, &info);
        let dest = dest_dir.join(format!("norm_{}.mp4", label));

        info!(
            "Normalizing {} ({}, audio: {}) to {}@{}fps",
            label,
            info.resolution_label(),
            info.has_audio,
            target.resolution,
            target.fps
        );

        let command = self.build_command(source, &info, target, &dest);
        let output = command.run().await.map_err(|e| match e {
            ToolError::Timeout { secs, .. } => CompositionError::Normalize {
                label: label.to_string(),
                detail: format!("timed out after {}s", secs),
            },
            other => CompositionError::Normalize {
                label: label.to_string(),
                detail: other.to_string(),
            },
        })?;

        if !output.success {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(CompositionError::Normalize {
                label: label.to_string(),
                detail: output.diagnostic_tail(),
            }
            .into());
        }

        debug!("Normalized {} -> {:?}", label, dest);
        Ok(dest)
    }

    /// ffmpeg invocation for one clip
    ///
    /// Sources without audio get a synthesized silent stereo track cut to the
    /// clip's own duration.
    pub fn build_command(
        &self,
        source: &Path,
        info: &MediaInfo,
        target: TargetFormat,
        dest: &Path,
    ) -> ToolCommand {
        let enc = &self.encoding;
        let mut cmd = ToolCommand::new(self.ffmpeg.clone(), self.timeout)
            .args(["-y", "-i"])
            .arg(source);

        if !info.has_audio {
            if info.duration > 0.0 {
                cmd = cmd.arg("-t").arg(format!("{:.3}", info.duration));
            }
            cmd = cmd.args(["-f", "lavfi", "-i"]).arg(silence_source(enc));
        }

        cmd = cmd
            .arg("-vf")
            .arg(video_filter(target))
            .args(["-c:v", enc.video_codec.as_str()])
            .args(["-preset", enc.preset.as_str()])
            .arg("-crf")
            .arg(enc.crf.to_string())
            .args(["-pix_fmt", enc.pixel_format.as_str()])
            .args(["-c:a", enc.audio_codec.as_str()])
            .args(["-b:a", enc.audio_bitrate.as_str()])
            .arg("-ar")
            .arg(enc.sample_rate.to_string())
            .arg("-ac")
            .arg(enc.channels.to_string());

        if !info.has_audio {
            cmd = cmd.args(["-map", "0:v:0", "-map", "1:a:0", "-shortest"]);
        }

        cmd.arg(dest)
    }
}

/// Fit inside the target frame, letterbox with black, force square pixels and
/// a constant frame rate
pub fn video_filter(target: TargetFormat) -> String {
    let (w, h) = (target.width(), target.height());
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1,fps={fps}",
        w = w,
        h = h,
        fps = target.fps
    )
}

/// A degraded probe reports no audio, so any real track would be replaced
/// by silence. Returns whether that happened.
fn warn_if_degraded(source: &Path, label: &str, info: &MediaInfo) -> bool {
    match &info.failure {
        Some(failure) => {
            warn!(
                "Could not probe {} clip {:?} ({}), its audio will be replaced with silence",
                label, source, failure
            );
            true
        }
        None => false,
    }
}

fn silence_source(enc: &EncodingConfig) -> String {
    let layout = if enc.channels == 1 { "mono" } else { "stereo" };
    format!("anullsrc=channel_layout={}:sample_rate={}", layout, enc.sample_rate)
}
