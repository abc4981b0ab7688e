use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{CompositionError, Result, ToolError},
    process::ToolCommand,
    progress::ProgressObserver,
    video::{format_duration, ClipSlot, ClipSlots, MediaInfo, MediaProber, Normalizer, TargetFormat},
};

/// Joins intro, main and outro clips into one deliverable
///
/// The engine follows a clear pipeline:
/// 1. Collect - Keep the slots that are set and exist, in intro → main → outro order
/// 2. Shortcut - A single clip is copied as-is, no re-encode
/// 3. Normalize - Bring every clip to the same geometry, frame rate and streams
/// 4. Concatenate - Stream-copy the normalized clips into the output file
pub struct CompositionEngine {
    ffmpeg: String,
    transcode_timeout: Duration,
    prober: MediaProber,
    normalizer: Normalizer,
}

impl CompositionEngine {
    /// Create a new composition engine from the tool and encoding settings
    pub fn new(config: &Config) -> Self {
        let prober = MediaProber::new(config.tools.ffprobe.clone(), config.tools.probe_timeout());
        let normalizer = Normalizer::new(
            config.tools.ffmpeg.clone(),
            config.tools.transcode_timeout(),
            prober.clone(),
            config.encoding.clone(),
        );
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            transcode_timeout: config.tools.transcode_timeout(),
            prober,
            normalizer,
        }
    }

    pub fn prober(&self) -> &MediaProber {
        &self.prober
    }

    /// Main composition method
    ///
    /// # Arguments
    ///
    /// * `slots` - Intro, main and outro clip references
    /// * `target` - Resolution and frame rate every clip is normalized to
    /// * `output_path` - Path for the final output video; never one of the inputs
    /// * `observer` - Receives "Normalizing ..." / "Combining..." progress
    pub async fn compose(
        &self,
        slots: &ClipSlots,
        target: TargetFormat,
        output_path: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf> {
        for (slot, path) in slots.iter() {
            if same_file(path, output_path).await {
                warn!("Refusing to overwrite the {} clip {:?}", slot, path);
                return Err(CompositionError::OutputIsInput {
                    path: output_path.to_path_buf(),
                }
                .into());
            }
        }

        let parts = collect_parts(slots).await;
        if parts.is_empty() {
            return Err(CompositionError::NoInput.into());
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let [(slot, only)] = parts.as_slice() {
            info!("🎬 Single {} clip, copying without re-encode", slot);
            tokio::fs::copy(only, output_path)
                .await
                .map_err(|source| CompositionError::Copy {
                    path: only.clone(),
                    source,
                })?;
            observer.on_message("Done!");
            return Ok(output_path.to_path_buf());
        }

        info!(
            "🎬 Composing {} clips at {}@{}fps into {:?}",
            parts.len(),
            target.resolution,
            target.fps,
            output_path
        );

        // Intermediates are removed when the scratch dir drops.
        let scratch = tempfile::Builder::new().prefix("reel_norm_").tempdir()?;

        let total = parts.len();
        let mut normalized = Vec::with_capacity(total);
        for (i, (slot, path)) in parts.iter().enumerate() {
            observer.on_message(&format!("Normalizing {}... ({}/{})", slot, i + 1, total));
            let norm = self
                .normalizer
                .normalize(path, slot.label(), target, scratch.path())
                .await?;
            normalized.push(norm);
        }

        observer.on_message("Combining...");
        let list_path = scratch.path().join("concat.txt");
        tokio::fs::write(&list_path, concat_list(&normalized)).await?;
        self.concatenate(&list_path, output_path).await?;

        observer.on_message("Done!");
        info!("   ✅ Composition complete: {:?}", output_path);
        Ok(output_path.to_path_buf())
    }

    /// Stream-copy join; any failure removes the partial output
    async fn concatenate(&self, list_path: &Path, output_path: &Path) -> Result<()> {
        let command = ToolCommand::new(self.ffmpeg.clone(), self.transcode_timeout)
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(list_path)
            .args(["-c", "copy"])
            .arg(output_path);

        let detail = match command.run().await {
            Ok(output) if output.success => return Ok(()),
            Ok(output) => output.diagnostic_tail(),
            Err(ToolError::Timeout { secs, .. }) => format!("timed out after {}s", secs),
            Err(e) => e.to_string(),
        };

        warn!("Concatenation failed, discarding {:?}", output_path);
        if let Err(e) = tokio::fs::remove_file(output_path).await {
            debug!("No partial output to remove: {}", e);
        }
        Err(CompositionError::Concat { detail }.into())
    }

    /// Probe every present slot to preview the final running order
    pub async fn timeline(&self, slots: &ClipSlots) -> Timeline {
        let mut entries = Vec::new();
        for (slot, path) in collect_parts(slots).await {
            let info = self.prober.probe(&path).await;
            entries.push(TimelineEntry { slot, path, info });
        }
        Timeline { entries }
    }
}

/// Slots that are set and point at an existing file
async fn collect_parts(slots: &ClipSlots) -> Vec<(ClipSlot, PathBuf)> {
    let mut parts = Vec::new();
    for (slot, path) in slots.iter() {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            parts.push((slot, path.to_path_buf()));
        } else {
            warn!("Skipping {} clip, file not found: {:?}", slot, path);
        }
    }
    parts
}

/// Whether two paths name the same file, resolving links when both exist
async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// ffconcat list for the concat demuxer
fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

/// One clip in a composition preview
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub slot: ClipSlot,
    pub path: PathBuf,
    pub info: MediaInfo,
}

/// Running order and durations of a planned composition
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.info.duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| {
                let name = match e.slot {
                    ClipSlot::Intro => "Intro",
                    ClipSlot::Main => "Overview",
                    ClipSlot::Outro => "Outro",
                };
                format!("{} ({})", name, e.info.duration_label())
            })
            .collect();
        write!(f, "{} | Total: {}", parts.join(" → "), format_duration(self.total_duration()))
    }
}
