use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    generation::VideoStyle,
    video::{ClipSlots, FrameRate, Resolution, TargetFormat},
};

/// Default steering text sent with every generation request
pub const DEFAULT_STEERING_PROMPT: &str = "Create a comprehensive video overview covering all major topics and key concepts. Use clear, engaging explanations. Include timelines and diagrams. End with key takeaways.";

/// Main configuration for reel-studio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External media tool settings
    pub tools: ToolsConfig,

    /// Encoding parameters shared by every normalized clip
    pub encoding: EncodingConfig,

    /// Generation service client settings
    pub service: ServiceConfig,

    /// Batch defaults
    pub batch: BatchSettings,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tools.validate()?;
        self.encoding.validate()?;
        self.service.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// ffmpeg / ffprobe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,

    /// Timeout for one probe (seconds)
    pub probe_timeout_secs: u64,

    /// Timeout for one normalize or concat run (seconds)
    pub transcode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            probe_timeout_secs: 30,
            transcode_timeout_secs: 600,
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.ffmpeg.trim().is_empty() {
            return Err(invalid("tools.ffmpeg", &self.ffmpeg).into());
        }
        if self.ffprobe.trim().is_empty() {
            return Err(invalid("tools.ffprobe", &self.ffprobe).into());
        }
        if self.probe_timeout_secs == 0 {
            return Err(invalid("tools.probe_timeout_secs", self.probe_timeout_secs).into());
        }
        if self.transcode_timeout_secs == 0 {
            return Err(invalid("tools.transcode_timeout_secs", self.transcode_timeout_secs).into());
        }
        Ok(())
    }
}

/// Stream parameters for normalized clips
///
/// Every clip in a composition is encoded with the same values so the
/// concat step can stream-copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub channels: u8,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl EncodingConfig {
    fn validate(&self) -> Result<()> {
        if self.crf > 51 {
            return Err(invalid("encoding.crf", self.crf).into());
        }
        if self.sample_rate == 0 {
            return Err(invalid("encoding.sample_rate", self.sample_rate).into());
        }
        if self.channels == 0 {
            return Err(invalid("encoding.channels", self.channels).into());
        }
        Ok(())
    }
}

/// Generation client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Client executable
    pub program: String,

    /// Exported to the client as `NOTEBOOKLM_HOME`; unset falls back to the
    /// caller's own `NOTEBOOKLM_HOME` at run time
    pub home: Option<PathBuf>,

    pub create_timeout_secs: u64,
    pub select_timeout_secs: u64,
    pub attach_timeout_secs: u64,
    pub generate_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub version_timeout_secs: u64,
    pub auth_timeout_secs: u64,

    /// Pause after attaching a source so the server can ingest it (milliseconds)
    pub ingest_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            program: "notebooklm".to_string(),
            home: None,
            create_timeout_secs: 60,
            select_timeout_secs: 30,
            attach_timeout_secs: 180,
            generate_timeout_secs: 600,
            fetch_timeout_secs: 300,
            version_timeout_secs: 15,
            auth_timeout_secs: 60,
            ingest_delay_ms: 1000,
        }
    }
}

impl ServiceConfig {
    /// Client home directory: the configured one, else `$NOTEBOOKLM_HOME`
    pub fn resolved_home(&self) -> Option<PathBuf> {
        self.home
            .clone()
            .or_else(|| std::env::var_os("NOTEBOOKLM_HOME").map(PathBuf::from))
    }

    pub fn ingest_delay(&self) -> Duration {
        Duration::from_millis(self.ingest_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(invalid("service.program", &self.program).into());
        }

        let timeouts = [
            ("service.create_timeout_secs", self.create_timeout_secs),
            ("service.select_timeout_secs", self.select_timeout_secs),
            ("service.attach_timeout_secs", self.attach_timeout_secs),
            ("service.generate_timeout_secs", self.generate_timeout_secs),
            ("service.fetch_timeout_secs", self.fetch_timeout_secs),
            ("service.version_timeout_secs", self.version_timeout_secs),
            ("service.auth_timeout_secs", self.auth_timeout_secs),
        ];
        if let Some((key, value)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(invalid(key, value).into());
        }
        Ok(())
    }
}

/// Batch defaults, overridable per run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub resolution: Resolution,
    pub fps: FrameRate,
    pub style: VideoStyle,
    pub steering_prompt: Option<String>,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,

    /// Jobs processed at once during a sweep
    pub concurrency: usize,

    /// Where per-item artifacts are written
    pub output_dir: PathBuf,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::FullHd,
            fps: FrameRate::Fps30,
            style: VideoStyle::Classic,
            steering_prompt: Some(DEFAULT_STEERING_PROMPT.to_string()),
            intro: None,
            outro: None,
            concurrency: 1,
            output_dir: PathBuf::from("reel_output"),
        }
    }
}

impl BatchSettings {
    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(invalid("batch.concurrency", self.concurrency).into());
        }
        Ok(())
    }

    /// Freeze these settings into the read-only config of one sweep
    pub fn to_batch_config(&self) -> BatchConfig {
        BatchConfig {
            target: TargetFormat::new(self.resolution, self.fps),
            style: self.style,
            steering: self
                .steering_prompt
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            intro: self.intro.clone(),
            outro: self.outro.clone(),
        }
    }
}

/// Read-only inputs shared by every job of a sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchConfig {
    pub target: TargetFormat,
    pub style: VideoStyle,
    pub steering: Option<String>,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
}

impl BatchConfig {
    /// Slots for one job's composition, with `main` as the centre clip
    pub fn slots_for(&self, main: &Path) -> ClipSlots {
        ClipSlots {
            intro: self.intro.clone(),
            main: Some(main.to_path_buf()),
            outro: self.outro.clone(),
        }
    }

    pub fn has_bookends(&self) -> bool {
        self.intro.is_some() || self.outro.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.batch.resolution = Resolution::Hd;
        original_config.batch.fps = FrameRate::Fps60;
        original_config.batch.style = VideoStyle::RetroPrint;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.batch.resolution, Resolution::Hd);
        assert_eq!(loaded_config.batch.fps, FrameRate::Fps60);
        assert_eq!(loaded_config.batch.style, VideoStyle::RetroPrint);
        assert_eq!(loaded_config.encoding.crf, 23);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [batch]
            resolution = "3840x2160"
            fps = 24
            style = "auto"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.resolution, Resolution::Uhd);
        assert_eq!(config.batch.fps, FrameRate::Fps24);
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.tools.probe_timeout_secs, 30);
    }

    #[test]
    fn test_unsupported_fps_rejected() {
        let parsed: std::result::Result<Config, _> = toml::from_str("[batch]\nfps = 25\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_zero_concurrency_invalid() {
        let mut config = Config::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.service.generate_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_does_not_capture_environment() {
        let config = Config::default();
        assert!(config.service.home.is_none());

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("default.toml");
        config.save_to_file(&file_path).unwrap();
        let written = std::fs::read_to_string(&file_path).unwrap();
        assert!(!written.contains("home"));
    }

    #[test]
    fn test_configured_home_wins() {
        let service = ServiceConfig {
            home: Some(PathBuf::from("/srv/notebooklm")),
            ..ServiceConfig::default()
        };
        assert_eq!(service.resolved_home(), Some(PathBuf::from("/srv/notebooklm")));
    }

    #[test]
    fn test_blank_steering_prompt_is_omitted() {
        let mut settings = BatchSettings::default();
        settings.steering_prompt = Some("   ".to_string());
        assert_eq!(settings.to_batch_config().steering, None);
    }
}
