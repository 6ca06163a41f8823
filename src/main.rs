use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use lanwatch::config::Config;
use lanwatch::db::Db;
use lanwatch::logger::init_logger;
use lanwatch::{client, events, export, server};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "packetcapture")]
use lanwatch::capture;
#[cfg(feature = "packetcapture")]
use lanwatch::events::EventSender;
#[cfg(feature = "packetcapture")]
use lanwatch::pipeline::{Pipeline, PACKET_QUEUE_DEPTH};

/// Passive network scanner: device inventory, anomaly alerts and a live
/// dashboard, all from watching traffic.
#[derive(Parser, Debug)]
#[command(name = "lanwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web interface (and the scanner, if an interface is configured)
    Web,
    /// Passive scan only, printing alerts to the console
    Scan {
        /// Interface to capture on (falls back to the config file)
        interface: Option<String>,
    },
    /// Terminal dashboard against a running web interface
    Dashboard {
        /// Backend base URL (defaults to the configured web host/port)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
    /// Print stored data
    Show {
        #[command(subcommand)]
        target: ShowTarget,
    },
    /// Export the device inventory
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },
}

#[derive(Subcommand, Debug)]
enum ShowTarget {
    Devices,
    Alerts,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // The dashboard owns the terminal; log lines would tear the UI
    if !matches!(&cli.command, Commands::Dashboard { .. }) {
        init_logger();
    }

    match cli.command {
        Commands::Web => run_web(config).await,
        Commands::Scan { interface } => run_scan(config, interface).await,
        Commands::Dashboard { url } => {
            let base_url = url.unwrap_or_else(|| config.base_url());
            client::app::run(base_url, config.dashboard).await
        }
        Commands::Show { target } => run_show(config, target),
        Commands::Export { format } => run_export(config, format),
    }
}

async fn run_web(config: Config) -> Result<()> {
    let db = Arc::new(Db::open(&config.db_path)?);
    let events = events::channel();

    let monitor = start_monitor_if_configured(&config, db.clone(), events.clone())?;

    let addr = format!("{}:{}", config.web.host, config.web.port);
    server::serve(&addr, server::AppState { db, events }).await?;

    if let Some(monitor) = monitor {
        monitor.shutdown().await;
    }

    Ok(())
}

#[cfg(feature = "packetcapture")]
fn start_monitor_if_configured(
    config: &Config,
    db: Arc<Db>,
    events: events::EventSender,
) -> Result<Option<Monitor>> {
    match &config.interface {
        Some(interface) => Ok(Some(start_monitor(interface, db, config, events)?)),
        None => {
            tracing::warn!("No capture interface configured; serving stored data only");
            Ok(None)
        }
    }
}

#[cfg(not(feature = "packetcapture"))]
fn start_monitor_if_configured(
    config: &Config,
    _db: Arc<Db>,
    _events: events::EventSender,
) -> Result<Option<Monitor>> {
    if config.interface.is_some() {
        tracing::warn!("Built without the packetcapture feature; serving stored data only");
    }
    Ok(None)
}

#[cfg(feature = "packetcapture")]
struct Monitor {
    capture: capture::CaptureHandle,
    pipeline: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "packetcapture")]
impl Monitor {
    async fn shutdown(self) {
        self.capture.join().await;
        let _ = self.pipeline.await;
    }
}

#[cfg(not(feature = "packetcapture"))]
struct Monitor;

#[cfg(not(feature = "packetcapture"))]
impl Monitor {
    async fn shutdown(self) {}
}

#[cfg(feature = "packetcapture")]
fn start_monitor(
    interface: &str,
    db: Arc<Db>,
    config: &Config,
    events: EventSender,
) -> Result<Monitor> {
    let (tx, rx) = tokio::sync::mpsc::channel(PACKET_QUEUE_DEPTH);
    let capture = capture::start(interface, tx)?;
    let pipeline = Pipeline::new(db, config, events).spawn(rx);
    Ok(Monitor { capture, pipeline })
}

#[cfg(feature = "packetcapture")]
async fn run_scan(config: Config, interface: Option<String>) -> Result<()> {
    use lanwatch::events::PushEvent;

    let interface = match interface.or_else(|| config.interface.clone()) {
        Some(interface) => interface,
        None => anyhow::bail!(
            "No interface specified. Use `lanwatch scan <interface>` or set `interface` in the config file"
        ),
    };

    let db = Arc::new(Db::open(&config.db_path)?);
    let events = events::channel();
    let mut alerts = events.subscribe();
    let monitor = start_monitor(&interface, db, &config, events)?;

    println!("[*] Passive monitoring started on {}. Press Ctrl+C to stop.", interface);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            alert = alerts.recv() => {
                if let Ok(PushEvent::Alert(alert)) = alert {
                    println!("[{}] {} - {}", alert.ts, alert.kind, alert.desc);
                }
            }
        }
    }

    monitor.shutdown().await;
    println!("Stopped scan.");
    Ok(())
}

#[cfg(not(feature = "packetcapture"))]
async fn run_scan(_config: Config, _interface: Option<String>) -> Result<()> {
    anyhow::bail!("This build has no capture support; rebuild with `--features packetcapture`")
}

fn run_show(config: Config, target: ShowTarget) -> Result<()> {
    let db = Db::open(&config.db_path)?;
    match target {
        ShowTarget::Devices => {
            for d in db.devices()? {
                let vendor: String = d.vendor.chars().take(16).collect();
                println!(
                    "{:<17}  {:<15}  {:<16}  {}  {}  last:{}",
                    d.mac,
                    d.ip,
                    vendor,
                    if d.hostname.is_empty() { "-" } else { d.hostname.as_str() },
                    if d.os_guess.is_empty() { "-" } else { d.os_guess.as_str() },
                    d.last_seen
                );
            }
        }
        ShowTarget::Alerts => {
            for a in db.anomalies()? {
                println!("[{}] {} - {}", a.ts, a.kind, a.desc);
            }
        }
    }
    Ok(())
}

fn run_export(config: Config, format: ExportFormat) -> Result<()> {
    let db = Db::open(&config.db_path)?;
    let devices = db.devices()?;
    if devices.is_empty() {
        println!("No devices found in database.");
        return Ok(());
    }
    let output = match format {
        ExportFormat::Csv => export::devices_to_csv(&devices)?,
        ExportFormat::Json => export::devices_to_json(&devices)?,
    };
    println!("{}", output);
    Ok(())
}
