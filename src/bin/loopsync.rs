use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use serde_json::json;
use loopsync::{
    CommandRunner, DurationProbe, FfmpegLogLevel, FfprobeProber, JobOptions, JobProgress,
    LoopSyncJob, MediaTags, ProgressCallback, SyncPolicy, SystemRunner, ToolPaths, VideoLooper,
    check_tools, optimal_repeat_count,
};

#[cfg(feature = "fetch")]
use indicatif::{ProgressBar, ProgressStyle};

const CLI_AFTER_HELP: &str = "Examples:\n  loopsync sync clip.mp4 audio.mp3 --out synced.mp4\n  loopsync sync clip.mp4 audio.mp3 --out synced.mp4 --policy legacy\n  loopsync plan clip.mp4 --audio audio.mp3 --json\n  loopsync fetch https://coub.com/view/2abc3 --out-dir videos --progress\n  loopsync completions zsh > _loopsync";

#[derive(Debug, Parser)]
#[command(
    name = "loopsync",
    version,
    about = "Loop a video clip to the length of an audio track and mux them together",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Print each pipeline stage as it starts.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show progress bars for downloads.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to the ffmpeg executable.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Duration prober (ffprobe, libav).
    #[arg(long, global = true, default_value = "ffprobe")]
    prober: String,
}

#[derive(Debug, Parser, Clone)]
struct SyncArgs {
    /// Trim policy: precision (1 ms tolerance, fast start) or legacy (10 ms).
    #[arg(long, default_value = "precision")]
    policy: String,

    /// Tolerance in seconds for the precision policy.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Use the plain ceil(audio / loop) repeat count without searching neighbours.
    #[arg(long)]
    no_loop_detection: bool,

    /// Keep the job's work directory.
    #[arg(long)]
    keep_temp: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the duration of media files.
    #[command(
        about = "Print media durations",
        after_help = "Examples:\n  loopsync probe clip.mp4 audio.mp3\n  loopsync probe clip.mp4 --json"
    )]
    Probe {
        /// Media files to measure.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Calibrate a clip and print the loop plan for a target duration.
    #[command(
        about = "Plan how many loops cover a target duration",
        after_help = "Examples:\n  loopsync plan clip.mp4 --audio audio.mp3\n  loopsync plan clip.mp4 --target 20.0 --no-loop-detection"
    )]
    Plan {
        /// Source clip.
        clip: PathBuf,
        /// Audio track whose duration is the target.
        #[arg(long, conflicts_with = "target", required_unless_present = "target")]
        audio: Option<PathBuf>,
        /// Target duration in seconds.
        #[arg(long)]
        target: Option<f64>,
        /// Use the plain ceil(target / loop) repeat count.
        #[arg(long)]
        no_loop_detection: bool,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Concatenate copies of a clip without re-encoding.
    #[command(about = "Build a loop of N copies")]
    Loop {
        /// Source clip.
        clip: PathBuf,
        /// Number of copies.
        #[arg(long)]
        count: u32,
        /// Output file path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Loop a local clip to the length of a local audio file.
    #[command(
        about = "Loop and sync local files",
        after_help = "Examples:\n  loopsync sync clip.mp4 audio.mp3 --out synced.mp4 --title \"Sunset\" --tag beach"
    )]
    Sync {
        /// Source clip.
        clip: PathBuf,
        /// Audio track.
        audio: PathBuf,
        /// Output file path.
        #[arg(long)]
        out: PathBuf,
        /// Title written into the output.
        #[arg(long)]
        title: Option<String>,
        /// Tag written into the output (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[command(flatten)]
        sync: SyncArgs,
    },

    #[cfg(feature = "fetch")]
    /// Download a clip and its audio by URL or ID, then loop and sync them.
    #[command(
        about = "Download, loop, and sync a media item",
        after_help = "Examples:\n  loopsync fetch https://coub.com/view/2abc3\n  loopsync fetch 2abc3 --out-dir videos --policy legacy"
    )]
    Fetch {
        /// Media page URL or bare media ID.
        url: String,
        /// Directory the finished file is written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Catalog API base URL; the media ID is appended.
        #[arg(long)]
        api_base: Option<String>,
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Check that ffmpeg and ffprobe can be run.
    #[command(about = "Check the FFmpeg installation")]
    Check,

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_policy(
    name: &str,
    tolerance: Option<f64>,
) -> Result<SyncPolicy, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "legacy" | "1" => {
            if tolerance.is_some() {
                return Err("--tolerance only applies to the precision policy".into());
            }
            Ok(SyncPolicy::TrimToShorter)
        }
        "precision" | "2" => match tolerance {
            Some(value) if !(value.is_finite() && value >= 0.0) => {
                Err(format!("invalid --tolerance: {value}").into())
            }
            Some(value) => Ok(SyncPolicy::TrimToShorterWithTolerance(value)),
            None => Ok(SyncPolicy::precision()),
        },
        other => Err(format!("unsupported --policy: {other} (precision|legacy)").into()),
    }
}

fn tool_paths(global: &GlobalOptions) -> Result<ToolPaths, Box<dyn std::error::Error>> {
    let mut tools = ToolPaths::default();
    if let Some(ffmpeg) = &global.ffmpeg {
        tools = tools.with_ffmpeg(ffmpeg);
    }
    if let Some(ffprobe) = &global.ffprobe {
        tools = tools.with_ffprobe(ffprobe);
    }
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        tools = tools.with_log_level(parsed);
        #[cfg(feature = "libav")]
        loopsync::set_ffmpeg_log_level(parsed);
    }
    Ok(tools)
}

fn build_prober(
    name: &str,
    runner: Arc<dyn CommandRunner>,
    tools: &ToolPaths,
) -> Result<Arc<dyn DurationProbe>, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "ffprobe" => Ok(Arc::new(FfprobeProber::new(runner, tools.clone()))),
        #[cfg(feature = "libav")]
        "libav" => Ok(Arc::new(loopsync::LibavProber::new()?)),
        #[cfg(not(feature = "libav"))]
        "libav" => Err("--prober libav requires building with the `libav` feature".into()),
        other => Err(format!("unsupported --prober: {other} (ffprobe|libav)").into()),
    }
}

fn build_looper(global: &GlobalOptions) -> Result<VideoLooper, Box<dyn std::error::Error>> {
    let tools = tool_paths(global)?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let prober = build_prober(&global.prober, Arc::clone(&runner), &tools)?;
    Ok(VideoLooper::with_tools(tools)
        .with_runner(runner)
        .with_prober(prober))
}

fn job_options(
    global: &GlobalOptions,
    args: &SyncArgs,
) -> Result<JobOptions, Box<dyn std::error::Error>> {
    let mut options = JobOptions::new()
        .with_policy(parse_policy(&args.policy, args.tolerance)?)
        .with_loop_detection(!args.no_loop_detection)
        .with_keep_temp(args.keep_temp);

    if global.verbose {
        options = options.with_progress(Arc::new(TerminalProgress));
    }
    Ok(options)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

struct TerminalProgress;

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, progress: &JobProgress) {
        if let Some(message) = &progress.message {
            match progress.total {
                Some(total) => eprintln!(
                    "{} [{}/{}] {message}",
                    "stage".cyan().bold(),
                    progress.current,
                    total
                ),
                None => eprintln!("{} {message}", "stage".cyan().bold()),
            }
        }
    }
}

#[cfg(feature = "fetch")]
struct QuietProgress;

#[cfg(feature = "fetch")]
impl ProgressCallback for QuietProgress {
    fn on_progress(&self, _progress: &JobProgress) {}
}

#[cfg(feature = "fetch")]
struct DownloadBar {
    bar: ProgressBar,
}

#[cfg(feature = "fetch")]
impl DownloadBar {
    fn new(label: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg} {bar:40.cyan/blue} {bytes}/{total_bytes}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        bar.set_message(label.to_string());
        Ok(Self { bar })
    }
}

#[cfg(feature = "fetch")]
impl ProgressCallback for DownloadBar {
    fn on_progress(&self, progress: &JobProgress) {
        if let Some(total) = progress.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(progress.current);
        if progress.message.is_some() {
            self.bar.finish();
        }
    }
}

#[cfg(feature = "fetch")]
fn download_progress(
    global: &GlobalOptions,
    label: &str,
) -> Result<Arc<dyn ProgressCallback>, Box<dyn std::error::Error>> {
    if global.progress {
        Ok(Arc::new(DownloadBar::new(label)?))
    } else if global.verbose {
        Ok(Arc::new(TerminalProgress))
    } else {
        Ok(Arc::new(QuietProgress))
    }
}

#[cfg(feature = "fetch")]
fn run_fetch(
    global: &GlobalOptions,
    url: &str,
    out_dir: &Path,
    api_base: Option<String>,
    args: &SyncArgs,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    use loopsync::catalog::{CatalogClient, extract_media_id};
    use loopsync::{Downloader, output_file_name};

    let mut options = job_options(global, args)?;
    let looper = build_looper(global)?;

    let media_id = extract_media_id(url);
    if media_id.is_empty() {
        return Err(format!("no media ID in {url}").into());
    }

    let download_dir = tempfile::Builder::new().prefix("loopsync_fetch_").tempdir()?;
    let video_path = download_dir.path().join("video.mp4");
    let audio_path = download_dir.path().join("audio.mp3");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let record = runtime.block_on(async {
        let client = match api_base {
            Some(base) => CatalogClient::with_base_url(base)?,
            None => CatalogClient::new()?,
        };
        client.fetch(&media_id).await
    })?;

    let tags = record.tags();
    let (video_url, quality) = record.video_url()?;
    let audio_url = record.audio_url()?;
    eprintln!("{} {quality}", "quality".cyan().bold());

    runtime.block_on(async {
        let downloader = Downloader::new()?;
        downloader
            .download(video_url, &video_path, download_progress(global, "video")?)
            .await?;
        downloader
            .download(audio_url, &audio_path, download_progress(global, "audio")?)
            .await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    let destination = out_dir.join(output_file_name(options.policy(), &media_id, &tags));
    ensure_writable_path(&destination, global.overwrite)?;

    options = options.with_tags(tags);
    let report = LoopSyncJob::new(looper, options).run(&video_path, &audio_path, &destination)?;
    Ok(report.output)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { inputs, json } => {
            let looper = build_looper(&cli.global)?;
            let durations: Vec<(PathBuf, f64)> = inputs
                .into_iter()
                .map(|path| {
                    let seconds = looper.probe(&path);
                    (path, seconds)
                })
                .collect();

            if json {
                let payload: Vec<_> = durations
                    .iter()
                    .map(|(path, seconds)| {
                        json!({
                            "path": path.display().to_string(),
                            "duration_seconds": (*seconds > 0.0).then_some(*seconds),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (path, seconds) in &durations {
                    if *seconds > 0.0 {
                        println!("{}: {seconds:.3}s", path.display());
                    } else {
                        println!("{}: {}", path.display(), "unknown".red());
                    }
                }
            }

            if durations.iter().any(|(_, seconds)| *seconds <= 0.0) {
                return Err("could not determine every duration".into());
            }
        }
        Commands::Plan {
            clip,
            audio,
            target,
            no_loop_detection,
            json,
        } => {
            let looper = build_looper(&cli.global)?;
            let target = match (audio, target) {
                (Some(audio), _) => loopsync::require_duration(looper.prober(), &audio)?,
                (None, Some(seconds)) => seconds,
                (None, None) => return Err("provide --audio or --target".into()),
            };

            let work_dir = tempfile::Builder::new().prefix("loopsync_plan_").tempdir()?;
            let plan = looper.plan(&clip, target, !no_loop_detection, work_dir.path())?;
            let baseline = optimal_repeat_count(target, plan.unit_duration(), false);

            if json {
                let payload = json!({
                    "target_seconds": target,
                    "unit_seconds": plan.unit_duration(),
                    "repeat_count": plan.repeat_count(),
                    "baseline_repeat_count": baseline,
                    "expected_seconds": plan.expected_duration(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Target: {target:.3}s");
                println!("Loop: {:.3}s", plan.unit_duration());
                println!(
                    "Repeats: {} (baseline {baseline}) = {:.3}s",
                    plan.repeat_count(),
                    plan.expected_duration()
                );
            }
        }
        Commands::Loop { clip, count, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let looper = build_looper(&cli.global)?;
            let looped = looper.export_loop(&clip, count, &out)?;
            let seconds = looped.duration(looper.prober());
            println!(
                "{} {} ({count} copies, {seconds:.3}s)",
                "saved".green().bold(),
                out.display()
            );
        }
        Commands::Sync {
            clip,
            audio,
            out,
            title,
            tags,
            sync,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let looper = build_looper(&cli.global)?;
            let mut options = job_options(&cli.global, &sync)?;
            if title.is_some() || !tags.is_empty() {
                let media_tags = MediaTags::new(title.unwrap_or_default()).with_tags(tags);
                options = options.with_tags(media_tags);
            }

            let report = LoopSyncJob::new(looper, options).run(&clip, &audio, &out)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "{} ({} loops of {:.3}s, {})",
                    report.output.display(),
                    report.plan.repeat_count(),
                    report.plan.unit_duration(),
                    report.branch
                )
                .green()
            );
            if let Some(work_dir) = report.work_dir {
                println!("work directory kept at {}", work_dir.display());
            }
        }
        #[cfg(feature = "fetch")]
        Commands::Fetch {
            url,
            out_dir,
            api_base,
            sync,
        } => {
            std::fs::create_dir_all(&out_dir)?;
            let output = run_fetch(&cli.global, &url, &out_dir, api_base, &sync)?;
            println!("{} {}", "saved".green().bold(), output.display());
        }
        Commands::Check => {
            let tools = tool_paths(&cli.global)?;
            let report = check_tools(&tools, &SystemRunner);
            print!("{report}");
            if !report.is_valid() {
                return Err(
                    "ffmpeg and ffprobe must be installed and on PATH (https://ffmpeg.org/download.html)"
                        .into(),
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "loopsync", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_policy;
    use loopsync::SyncPolicy;

    #[test]
    fn parse_policy_aliases() {
        assert_eq!(parse_policy("legacy", None).unwrap(), SyncPolicy::TrimToShorter);
        assert_eq!(parse_policy("1", None).unwrap(), SyncPolicy::TrimToShorter);
        assert_eq!(parse_policy("PRECISION", None).unwrap(), SyncPolicy::precision());
        assert_eq!(
            parse_policy("2", Some(0.005)).unwrap(),
            SyncPolicy::TrimToShorterWithTolerance(0.005)
        );
        assert!(parse_policy("fuzzy", None).is_err());
    }

    #[test]
    fn tolerance_is_rejected_for_legacy_policy() {
        assert!(parse_policy("legacy", Some(0.002)).is_err());
        assert!(parse_policy("precision", Some(-1.0)).is_err());
    }
}
