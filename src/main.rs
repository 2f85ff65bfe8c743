use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use plantia_client::capture::{DeviceProfile, VirtualCamera};
use plantia_client::config::{ClientConfig, WorkerConfig};
use plantia_client::controller::{AcquisitionController, Completion};
use plantia_client::transport::{HttpEndpoint, PredictionResult};
use plantia_client::worker::{
    AssetRequest, CacheManifest, DiskCacheStorage, OfflineCacheWorker, ReqwestFetcher,
};
use tracing_subscriber::EnvFilter;

/// Classify plant leaves from the command line.
#[derive(Parser, Debug)]
#[command(name = "plantia")]
#[command(about = "🌿 Send leaf photos to a Plantia prediction service")]
#[command(long_about = "Drive the Plantia client from the command line: submit photos or camera \
frames for classification, inspect the control layout chosen for a device, and manage the offline asset cache.")]
struct Args {
    /// Base URL of the prediction service
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    endpoint: String,

    /// Request timeout
    #[arg(long, global = true, default_value = "30s",
          help = "Request timeout: 30 (seconds), 45s, 2m")]
    timeout: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an image file (upload path)
    Predict {
        /// Image file to submit
        file: PathBuf,
    },
    /// Play an image as a camera stream, capture a frame and classify it
    Capture {
        /// Image used as the camera frame
        frame: PathBuf,
    },
    /// Show which controls a device gets
    Controls {
        /// Browser user agent string
        #[arg(long, default_value = "")]
        user_agent: String,
        /// Page is served over plain HTTP
        #[arg(long)]
        insecure: bool,
        /// Platform lacks the camera stream API
        #[arg(long)]
        no_camera_api: bool,
    },
    /// Offline asset cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Precache the page assets and drop older cache versions
    Install {
        /// Origin serving the page
        #[arg(long)]
        origin: String,
        /// Cache storage directory
        #[arg(long)]
        dir: PathBuf,
        /// Cache version token
        #[arg(long, default_value = "v1")]
        version: String,
    },
    /// Fetch a URL cache-first
    Fetch {
        /// Absolute URL, or a path relative to --origin
        url: String,
        /// Cache storage directory
        #[arg(long)]
        dir: PathBuf,
        /// Origin serving the page
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        origin: String,
        /// Cache version token
        #[arg(long, default_value = "v1")]
        version: String,
        /// Write the body here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let timeout = parse_duration(&args.timeout)?;

    let mut config = ClientConfig::with_endpoint(&args.endpoint);
    config.timeout = timeout;

    match args.command {
        Command::Predict { file } => {
            let result = plantia_client::predict_file(&config, &file).await?;
            print_result(&result);
        }
        Command::Capture { frame } => {
            let raster = image::open(&frame)
                .with_context(|| format!("cannot open frame image {}", frame.display()))?
                .to_rgba8();
            let controller = AcquisitionController::builder()
                .with_camera(VirtualCamera::new(raster))
                .with_shared_endpoint(Arc::new(HttpEndpoint::new(&config)?))
                .with_policy(config.policy)
                .build()?;
            controller.start_camera().await?;
            let result = controller.capture().await.map(Completion::into_inner)?;
            print_result(&result);
        }
        Command::Controls {
            user_agent,
            insecure,
            no_camera_api,
        } => {
            let profile = DeviceProfile::detect(&user_agent, !insecure, !no_camera_api);
            let layout = profile.layout();
            println!("mobile:              {}", profile.is_mobile);
            println!("camera start button: {}", on_off(layout.camera_start_visible));
            println!("upload button:       {}", on_off(layout.desktop_upload_visible));
            println!("scan button:         {}", on_off(layout.mobile_scan_visible));
            if let Some(banner) = layout.mobile_banner {
                println!("banner:              {}", banner);
            }
        }
        Command::Cache(command) => run_cache(command, timeout).await?,
    }
    Ok(())
}

async fn run_cache(command: CacheCommand, timeout: Duration) -> Result<()> {
    let fetcher = Arc::new(ReqwestFetcher::new(timeout)?);
    match command {
        CacheCommand::Install {
            origin,
            dir,
            version,
        } => {
            let worker_config = WorkerConfig {
                origin,
                cache_version: version,
                ..WorkerConfig::default()
            };
            let storage = Arc::new(DiskCacheStorage::open(&dir).await?);
            let worker = OfflineCacheWorker::new(&worker_config, storage, fetcher)?;
            let count = worker.install().await?;
            let deleted = worker.activate().await?;
            println!("{}: {} assets cached in {}", worker.cache_name(), count, dir.display());
            for name in deleted {
                println!("removed obsolete cache {}", name);
            }
        }
        CacheCommand::Fetch {
            url,
            dir,
            origin,
            version,
            output,
        } => {
            let target = CacheManifest::resolve(&origin, [url.as_str()])?
                .urls()
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("nothing to fetch"))?;
            let worker_config = WorkerConfig {
                origin,
                cache_version: version,
                ..WorkerConfig::default()
            };
            let storage = Arc::new(DiskCacheStorage::open(&dir).await?);
            let worker = OfflineCacheWorker::new(&worker_config, storage, fetcher)?;
            if !worker.resume().await? {
                return Err(anyhow!(
                    "cache {} is not installed in {}; run `plantia cache install` first",
                    worker.cache_name(),
                    dir.display()
                ));
            }

            let outcome = worker.handle_fetch(&AssetRequest::get(target.as_str())).await?;
            let source = if outcome.from_cache() { "cache" } else { "network" };
            let response = outcome.into_response();
            eprintln!("{} {} ({}, {} bytes)", response.status, target, source, response.body.len());
            match output {
                Some(path) => tokio::fs::write(&path, &response.body)
                    .await
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => std::io::stdout().write_all(&response.body)?,
            }
        }
    }
    Ok(())
}

fn print_result(result: &PredictionResult) {
    let view = result.view();
    println!("label:      {}", view.display_label);
    println!("confidence: {}", view.confidence_text);
    println!("verdict:    {}", view.verdict);
    if let Some(all) = &result.all_predictions {
        for (label, probability) in all {
            println!("  {:<24} {:6.2}%", label.replace('_', " "), probability * 100.0);
        }
    }
}

fn on_off(visible: bool) -> &'static str {
    if visible { "shown" } else { "hidden" }
}

/// Parse duration string like "30", "45s", "2m"
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(Duration::from_secs(num)),
        "m" => num
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow!("Duration too large: {}", duration)),
        _ => Err(anyhow!("Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes", unit)),
    }
}
