use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reel_studio::{
    composition::CompositionEngine,
    config::{BatchConfig, Config},
    generation::{
        auth::{find_storage_state, AuthExport},
        display_title, CliGenerationService, GenerationService, JobRequest, JobRunner, VideoStyle,
    },
    process::ToolCommand,
    progress::LogProgress,
    queue::{BatchQueue, ItemStatus, SweepEvent},
    video::{ClipSlots, FrameRate, Resolution, TargetFormat},
};

#[derive(Parser)]
#[command(
    name = "reel-studio",
    version,
    about = "Turn documents into overview videos with your own intro and outro",
    long_about = "Reel-Studio sends documents to a document-to-video service in batches, downloads the generated overviews and bookends them with intro and outro clips normalized to one format."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show duration, resolution, frame rate and audio presence of media files
    Probe {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Preview the running order of an intro/main/outro composition
    Timeline {
        #[command(flatten)]
        clips: ClipArgs,
    },

    /// Normalize and join intro, main and outro clips into one video
    Compose {
        #[command(flatten)]
        clips: ClipArgs,

        #[command(flatten)]
        format: FormatArgs,

        /// Output video file path (default: Final_Video_<timestamp>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate one overview video from a document
    Generate {
        document: PathBuf,

        /// Project title (default: derived from the file name)
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Queue several documents and process them in one sweep
    Batch {
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Documents processed at once
        #[arg(long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Check that ffmpeg and the generation client are installed and logged in
    Check,

    /// Export the client's saved session as a one-line env entry
    ExportAuth {
        /// Session file (default: searched in the client's home)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "auth_export.txt")]
        output: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        #[arg(default_value = "reel-studio.toml")]
        path: PathBuf,
    },

    /// List the available video styles
    Styles,
}

#[derive(Args)]
struct ClipArgs {
    /// Intro clip
    #[arg(long)]
    intro: Option<PathBuf>,

    /// Main clip
    #[arg(short, long)]
    main: Option<PathBuf>,

    /// Outro clip
    #[arg(long)]
    outro: Option<PathBuf>,
}

impl ClipArgs {
    fn slots(&self) -> ClipSlots {
        ClipSlots {
            intro: self.intro.clone(),
            main: self.main.clone(),
            outro: self.outro.clone(),
        }
    }
}

#[derive(Args)]
struct FormatArgs {
    /// Target resolution (1920x1080, 1280x720, 3840x2160)
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// Target frame rate (24, 30, 60)
    #[arg(short, long)]
    fps: Option<FrameRate>,
}

#[derive(Args)]
struct JobArgs {
    /// Video style (classic, whiteboard, watercolor, ..., auto)
    #[arg(short, long)]
    style: Option<VideoStyle>,

    /// Steering prompt sent with the generation request
    #[arg(short, long)]
    prompt: Option<String>,

    /// Send no steering prompt at all
    #[arg(long, conflicts_with = "prompt")]
    no_prompt: bool,

    /// Intro clip prepended to every generated video
    #[arg(long)]
    intro: Option<PathBuf>,

    /// Outro clip appended to every generated video
    #[arg(long)]
    outro: Option<PathBuf>,

    #[command(flatten)]
    format: FormatArgs,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl JobArgs {
    /// Apply command-line overrides on top of the configured batch defaults
    fn apply(&self, config: &mut Config) {
        let batch = &mut config.batch;
        if let Some(style) = self.style {
            batch.style = style;
        }
        if self.no_prompt {
            batch.steering_prompt = None;
        } else if let Some(prompt) = &self.prompt {
            batch.steering_prompt = Some(prompt.clone());
        }
        if self.intro.is_some() {
            batch.intro = self.intro.clone();
        }
        if self.outro.is_some() {
            batch.outro = self.outro.clone();
        }
        if let Some(resolution) = self.format.resolution {
            batch.resolution = resolution;
        }
        if let Some(fps) = self.format.fps {
            batch.fps = fps;
        }
        if let Some(dir) = &self.output_dir {
            batch.output_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting Reel-Studio v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Probe { files } => probe(&config, &files).await,
        Command::Timeline { clips } => timeline(&config, &clips).await,
        Command::Compose {
            clips,
            format,
            output,
        } => compose(&config, &clips, &format, output).await,
        Command::Generate {
            document,
            title,
            job,
        } => {
            job.apply(&mut config);
            config.validate()?;
            generate(&config, &document, title).await
        }
        Command::Batch {
            documents,
            concurrency,
            job,
        } => {
            job.apply(&mut config);
            if let Some(n) = concurrency {
                config.batch.concurrency = n;
            }
            config.validate()?;
            batch(&config, &documents).await
        }
        Command::Check => check(&config).await,
        Command::ExportAuth { input, output } => export_auth(&config, input, &output),
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
            Ok(())
        }
        Command::Styles => {
            for style in VideoStyle::available_styles() {
                println!("{}", style);
            }
            Ok(())
        }
    }
}

async fn probe(config: &Config, files: &[PathBuf]) -> Result<()> {
    let engine = CompositionEngine::new(config);
    for file in files {
        let info = engine.prober().probe(file).await;
        match &info.failure {
            None => println!(
                "{}: {} | {} | {:.2} fps | audio: {} | {:.1} MB",
                file.display(),
                info.duration_label(),
                info.resolution_label(),
                info.fps,
                if info.has_audio { "yes" } else { "no" },
                info.size_mb()
            ),
            Some(failure) => println!("{}: unknown ({})", file.display(), failure),
        }
    }
    Ok(())
}

async fn timeline(config: &Config, clips: &ClipArgs) -> Result<()> {
    let engine = CompositionEngine::new(config);
    let timeline = engine.timeline(&clips.slots()).await;
    if timeline.is_empty() {
        println!("No clips selected");
    } else {
        println!("{}", timeline);
    }
    Ok(())
}

async fn compose(
    config: &Config,
    clips: &ClipArgs,
    format: &FormatArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let target = TargetFormat::new(
        format.resolution.unwrap_or(config.batch.resolution),
        format.fps.unwrap_or(config.batch.fps),
    );
    let output = output.unwrap_or_else(default_output_name);

    let engine = CompositionEngine::new(config);
    let result = engine
        .compose(&clips.slots(), target, &output, &LogProgress)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("Video saved to {}", result.display());
    Ok(())
}

/// `Final_Video_20240131_142500.mp4`
fn default_output_name() -> PathBuf {
    PathBuf::from(format!(
        "Final_Video_{}.mp4",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

fn build_runner(config: &Config) -> JobRunner {
    let service = Arc::new(CliGenerationService::new(config.service.clone()));
    let engine = Arc::new(CompositionEngine::new(config));
    JobRunner::new(service, engine, config.service.ingest_delay())
}

async fn ensure_service_ready(runner: &JobRunner, config: &Config) -> Result<()> {
    if !runner.service().check_installed().await {
        bail!(
            "'{}' not found. Install the generation client and log in first.",
            config.service.program
        );
    }
    if !runner.service().check_authenticated().await {
        warn!("The generation client does not appear to be logged in");
    }
    Ok(())
}

async fn generate(config: &Config, document: &Path, title: Option<String>) -> Result<()> {
    let runner = build_runner(config);
    ensure_service_ready(&runner, config).await?;

    let title = title.unwrap_or_else(|| {
        display_title(&document.file_name().unwrap_or_default().to_string_lossy())
    });
    let request = JobRequest::new(
        document,
        title,
        &config.batch.output_dir,
        config.batch.to_batch_config(),
    );

    let video = runner
        .run(&request, &LogProgress)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Video saved to {}", video.display());
    Ok(())
}

async fn batch(config: &Config, documents: &[PathBuf]) -> Result<()> {
    let runner = build_runner(config);
    ensure_service_ready(&runner, config).await?;

    let queue = BatchQueue::new(&config.batch.output_dir).with_concurrency(config.batch.concurrency);
    for document in documents {
        if let Err(e) = queue.add_document(document).await {
            warn!("{}", e);
        }
    }

    let batch_config: BatchConfig = config.batch.to_batch_config();
    let observer = |event: &SweepEvent| match event {
        SweepEvent::ItemStarted {
            name,
            position,
            total,
            ..
        } => info!("📄 [{}/{}] {}", position, total, name),
        SweepEvent::ItemProgress { name, message, .. } => info!("   {}: {}", name, message),
        SweepEvent::ItemFinished { name, status, .. } => match status {
            ItemStatus::Done { output_path } => info!("   ✅ {} → {:?}", name, output_path),
            ItemStatus::Error { message } => warn!("   ❌ {}: {}", name, message),
            _ => {}
        },
        _ => {}
    };
    let summary = queue.process_all(&runner, &batch_config, &observer).await;

    println!();
    for item in queue.items().await {
        match &item.status {
            ItemStatus::Done { output_path } => {
                println!("✅ {:<32} {}", item.name, output_path.display())
            }
            ItemStatus::Error { message } => println!("❌ {:<32} {}", item.name, message),
            status => println!("•  {:<32} {}", item.name, status),
        }
    }
    println!(
        "\n{} done, {} failed, {} skipped",
        summary.done, summary.failed, summary.skipped
    );

    if summary.failed > 0 && summary.done == 0 {
        bail!("every queued document failed");
    }
    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let timeout = config.tools.probe_timeout();
    let ffmpeg_ok = tool_responds(&config.tools.ffmpeg, timeout).await;
    let ffprobe_ok = tool_responds(&config.tools.ffprobe, timeout).await;

    let service = CliGenerationService::new(config.service.clone());
    let installed = service.check_installed().await;
    let authenticated = installed && service.check_authenticated().await;

    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    println!("{} ffmpeg ({})", mark(ffmpeg_ok), config.tools.ffmpeg);
    println!("{} ffprobe ({})", mark(ffprobe_ok), config.tools.ffprobe);
    println!("{} {} installed", mark(installed), config.service.program);
    println!("{} {} logged in", mark(authenticated), config.service.program);

    if !(ffmpeg_ok && ffprobe_ok && installed && authenticated) {
        bail!("environment is not ready");
    }
    Ok(())
}

async fn tool_responds(program: &str, timeout: std::time::Duration) -> bool {
    ToolCommand::new(program, timeout)
        .arg("-version")
        .run()
        .await
        .map(|output| output.success)
        .unwrap_or(false)
}

fn export_auth(config: &Config, input: Option<PathBuf>, output: &Path) -> Result<()> {
    let home = config.service.resolved_home();
    let source = match input.or_else(|| find_storage_state(home.as_deref())) {
        Some(path) => path,
        None => bail!("No saved session found. Log in with the generation client first."),
    };

    let export = AuthExport::load(&source)?;
    info!(
        "Read {} cookie(s) from {:?}, session cookies: {:?}",
        export.cookie_count, source, export.found_required
    );
    if !export.has_session_cookies() {
        warn!("None of the expected session cookies were found, the export may not work");
    }

    std::fs::write(output, format!("{}\n", export.env_line()))
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Session exported to {}", output.display());
    Ok(())
}
