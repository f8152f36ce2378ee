//! Food Scanner CLI
//!
//! Lists cameras, runs capture-and-analyze scans against the analysis
//! endpoint, and serves that endpoint.

use clap::{Args, Parser, Subcommand};
use food_scanner::{
    analysis::{AnalysisResult, Analyzer, HttpAnalysisClient, MockAnalyzer},
    capture::{pick_default, CameraBackend, DeviceRegistry, MockBackend},
    config::FileConfig,
    scan::{ScanOrchestrator, ScanState},
};
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "food-scanner", version, about = "Camera food scanner with remote nutrition analysis")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List cameras and show the default pick.
    Devices {
        /// Use the synthetic camera platform.
        #[arg(long)]
        mock: bool,
    },
    /// Capture stills and print their analysis.
    Scan(ScanArgs),
    /// Run the analysis endpoint.
    #[cfg(feature = "server")]
    Serve,
}

#[derive(Args)]
struct ScanArgs {
    /// Device id to open instead of the default.
    #[arg(long)]
    device: Option<String>,
    /// Analysis endpoint URL, overriding the config file.
    #[arg(long)]
    endpoint: Option<String>,
    /// Number of captures.
    #[arg(long, default_value_t = 1)]
    count: u32,
    /// Seconds between captures.
    #[arg(long, default_value_t = 2)]
    interval: u64,
    /// Use the synthetic camera platform.
    #[arg(long)]
    mock_camera: bool,
    /// Answer every capture with a canned result instead of calling the endpoint.
    #[arg(long)]
    mock_analysis: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Food Scanner v{}", food_scanner::VERSION);

    let config = match cli.config {
        Some(ref path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(async {
        match cli.command {
            Command::Devices { mock } => list_devices(mock).await,
            Command::Scan(args) => run_scan(&config, args).await,
            #[cfg(feature = "server")]
            Command::Serve => serve(&config).await,
        }
    });

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn camera_backend(mock: bool) -> Rc<dyn CameraBackend> {
    if mock {
        return Rc::new(MockBackend::new());
    }
    #[cfg(feature = "camera")]
    {
        Rc::new(food_scanner::capture::NokhwaBackend::new())
    }
    #[cfg(not(feature = "camera"))]
    {
        warn!("Built without the `camera` feature, using the mock camera");
        Rc::new(MockBackend::new())
    }
}

fn interrupt_signal() -> Result<Arc<Notify>, ctrlc::Error> {
    let interrupt = Arc::new(Notify::new());
    let handler = Arc::clone(&interrupt);
    ctrlc::set_handler(move || handler.notify_one())?;
    Ok(interrupt)
}

async fn list_devices(mock: bool) -> Result<(), Box<dyn Error>> {
    let registry = DeviceRegistry::new(camera_backend(mock));
    let devices = match registry.enumerate().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Device enumeration failed: {}", e);
            Vec::new()
        }
    };

    if devices.is_empty() {
        println!("No cameras found");
        return Ok(());
    }

    let default = pick_default(&devices);
    for device in &devices {
        let marker = if Some(device.id()) == default { '*' } else { ' ' };
        println!("{} {}\t{}", marker, device.id(), device.label());
    }
    Ok(())
}

async fn run_scan(config: &FileConfig, args: ScanArgs) -> Result<(), Box<dyn Error>> {
    let analyzer: Rc<dyn Analyzer> = if args.mock_analysis {
        Rc::new(MockAnalyzer::returning(AnalysisResult {
            food_name: "apple".into(),
            confidence: 0.9,
            calories: 52.0,
            protein: 0.3,
            carbs: 14.0,
            fats: 0.2,
        }))
    } else {
        let mut analysis = config.analysis.clone();
        if let Some(endpoint) = args.endpoint {
            analysis.endpoint = endpoint;
            analysis.validate()?;
        }
        Rc::new(HttpAnalysisClient::new(&analysis)?)
    };

    let scan = ScanOrchestrator::with_config(camera_backend(args.mock_camera), analyzer, &config.camera)
        .with_analysis_deadline(config.analysis.timeout());
    let interrupt = interrupt_signal()?;

    scan.list_devices().await?;
    if let Some(ref device) = args.device {
        scan.select_device(device)?;
    }
    scan.start_camera().await?;
    if let ScanState::Error { reason, .. } = scan.state() {
        return Err(reason.into());
    }

    for i in 0..args.count {
        tokio::select! {
            accepted = scan.capture_and_analyze() => accepted?,
            _ = interrupt.notified() => {
                info!("Interrupted");
                break;
            }
        }
        println!("{}", serde_json::to_string_pretty(&scan.state())?);

        if i + 1 < args.count {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(args.interval)) => {}
                _ = interrupt.notified() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    }

    scan.shutdown();
    Ok(())
}

#[cfg(feature = "server")]
async fn serve(config: &FileConfig) -> Result<(), Box<dyn Error>> {
    use food_scanner::{
        config::ServerConfig,
        metrics::MetricsRegistry,
        server::{AnalysisServer, GeminiModel},
    };

    let api_key = ServerConfig::api_key_from_env()?;
    let model = Arc::new(GeminiModel::new(&config.server, api_key)?);
    let metrics = Arc::new(MetricsRegistry::new()?);
    let interrupt = interrupt_signal()?;

    AnalysisServer::new(config.server.clone(), model, metrics)
        .run(async move { interrupt.notified().await })
        .await?;
    Ok(())
}
