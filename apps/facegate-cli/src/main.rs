use std::{env, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use facegate_capture::{
    CaptureController, CaptureOutcome, CaptureView, DetectionClient, HttpDetectionClient,
    StillImageSource, SyntheticSource, VideoSource,
};
use facegate_ops::init_tracing;
use facegate_types::config::{CaptureConfig, FacegateConfig, OidcCredentials, MAX_TARGET_WIDTH};
use tracing::{debug, info, warn};

mod console;

use console::ConsoleView;

const CONFIG_ENV: &str = "FACEGATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "facegate.toml";

#[derive(Debug, Parser)]
#[command(name = "facegate", version, about = "Webcam face capture client and OIDC-gated face view")]
struct Cli {
    /// TOML config file; falls back to $FACEGATE_CONFIG, then facegate.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the auth gateway.
    Serve,
    /// Capture frames and post them to the detection endpoint.
    Capture(CaptureArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").args(["camera", "image", "synthetic"])))]
struct CaptureArgs {
    /// Capture from the webcam at this index (needs the `camera` feature).
    #[arg(long, value_name = "INDEX")]
    camera: Option<u32>,
    /// Use a still image as the camera.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Use a generated WIDTHxHEIGHT test pattern as the camera.
    #[arg(long, value_parser = parse_dimensions)]
    synthetic: Option<(u32, u32)>,
    #[arg(long)]
    endpoint: Option<String>,
    /// Display width the stream is scaled to.
    #[arg(long)]
    width: Option<u32>,
    /// Write the last preview image here.
    #[arg(long)]
    preview_out: Option<PathBuf>,
    #[arg(long, default_value_t = 1)]
    shots: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config);
    if let Err(err) = init_tracing(&config.ops) {
        eprintln!("Logging disabled: {err}");
    }

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Capture(args) => capture(config, args).await,
    }
}

async fn serve(config: FacegateConfig) -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(err) => debug!("No .env loaded: {err}"),
    }
    let credentials = OidcCredentials::from_env().context("identity provider credentials")?;
    facegate_gateway::serve(config, credentials).await?;
    Ok(())
}

async fn capture(config: FacegateConfig, args: CaptureArgs) -> Result<()> {
    let mut capture = config.capture;
    if let Some(endpoint) = args.endpoint {
        capture.endpoint = endpoint;
    }
    if let Some(width) = args.width {
        capture.target_width = width;
    }
    if !(1..=MAX_TARGET_WIDTH).contains(&capture.target_width) {
        bail!("--width must be between 1 and {MAX_TARGET_WIDTH}");
    }
    let view = ConsoleView::new(args.preview_out);

    match (args.camera, args.image, args.synthetic) {
        (Some(index), _, _) => run_camera(&capture, index, view, args.shots).await,
        (None, Some(path), _) => {
            run_capture(&capture, StillImageSource::new(path), view, args.shots).await
        }
        (None, None, Some((width, height))) => {
            run_capture(&capture, SyntheticSource::new(width, height), view, args.shots).await
        }
        (None, None, None) => bail!("choose a camera with --camera, --image or --synthetic"),
    }
}

#[cfg(feature = "camera")]
async fn run_camera(
    config: &CaptureConfig,
    index: u32,
    view: ConsoleView,
    shots: u32,
) -> Result<()> {
    run_capture(config, facegate_capture::CameraSource::new(index), view, shots).await
}

#[cfg(not(feature = "camera"))]
async fn run_camera(
    _config: &CaptureConfig,
    index: u32,
    _view: ConsoleView,
    _shots: u32,
) -> Result<()> {
    bail!(
        "camera {index} unavailable: facegate was built without webcam support, \
         rebuild with --features camera"
    )
}

async fn run_capture<S: VideoSource>(
    config: &CaptureConfig,
    source: S,
    view: ConsoleView,
    shots: u32,
) -> Result<()> {
    let detector = HttpDetectionClient::new(config);
    info!("Posting captures to {}", detector.endpoint());
    let mut controller = CaptureController::new(config, source, detector, view);

    let stream = controller.initialize().await?;
    controller.on_can_play(stream);

    let detected = take_shots(&mut controller, shots).await;
    match controller.view().last_count() {
        Some(last) => info!("{detected} of {shots} capture(s) answered, last: {last}"),
        None => warn!("No capture produced a face count"),
    }
    Ok(())
}

/// Triggers `shots` captures; a failed one is logged and the rest still run.
/// Returns how many produced a face count.
async fn take_shots<S, D, V>(controller: &mut CaptureController<S, D, V>, shots: u32) -> u32
where
    S: VideoSource,
    D: DetectionClient,
    V: CaptureView,
{
    let mut detected = 0;
    for shot in 1..=shots {
        match controller.capture().await {
            Ok(CaptureOutcome::Detected(result)) => {
                detected += 1;
                debug!("Capture {shot}: {} face(s)", result.faces)
            }
            Ok(CaptureOutcome::Unanswered) => warn!("Capture {shot}: no face count returned"),
            Ok(CaptureOutcome::Skipped) => {
                warn!("Capture {shot}: stream size unknown, nothing sent")
            }
            Err(err) => warn!("Capture {shot} failed: {err}"),
        }
    }
    detected
}

fn parse_dimensions(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| format!("'{value}' is not a positive integer"))
    };
    Ok((parse(width)?, parse(height)?))
}

fn config_path(from_args: Option<PathBuf>) -> PathBuf {
    from_args
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn load_config(from_args: Option<PathBuf>) -> FacegateConfig {
    let path = config_path(from_args);
    if !path.exists() {
        eprintln!("No config at '{}'; using internal defaults.", path.display());
        return FacegateConfig::default();
    }
    match FacegateConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                FacegateConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            FacegateConfig::default()
        }
    }
}
