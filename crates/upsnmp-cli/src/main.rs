use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use upsnmp_core::{
    parse_entries, Coordinator, DeviceConfig, DeviceEntry, DeviceStatus, DialectDetector,
    PollPolicy, Registry, Snmp2Transport, SnmpTransport,
};

mod output;

use output::{print_status, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "upsnmpd")]
#[command(about = "UPS monitor over SNMP v1/v2c (read-only)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long)]
    host: Option<String>,

    #[arg(long, default_value_t = upsnmp_core::config::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = upsnmp_core::config::DEFAULT_COMMUNITY)]
    community: String,

    #[arg(long, default_value = upsnmp_core::config::DEFAULT_DEVICE_NAME)]
    device_name: String,

    #[arg(long, default_value_t = upsnmp_core::config::DEFAULT_FAST_INTERVAL_S)]
    fast_interval: u64,

    #[arg(long, default_value_t = upsnmp_core::config::DEFAULT_SLOW_INTERVAL_S)]
    slow_interval: u64,

    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 3)]
    backoff_cap_exponent: u32,

    #[arg(long, default_value_t = 3)]
    unavailable_after: u32,
}

#[derive(Debug, Subcommand)]
enum Command {
    Probe,
    Once {
        #[arg(long, value_enum, default_value = "json")]
        format: CliFormat,
    },
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: CliFormat,
        /// JSON list of {entry_id, host, ...} device entries.
        #[arg(long)]
        config: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Human,
    Json,
    Ndjson,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Human => OutputFormat::Human,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Ndjson => OutputFormat::Ndjson,
        }
    }
}

impl Cli {
    fn device(&self) -> Result<DeviceConfig> {
        let Some(host) = self.host.clone() else {
            bail!("--host is required unless --config is given");
        };
        Ok(DeviceConfig {
            host,
            port: self.port,
            community: self.community.clone(),
            device_name: self.device_name.clone(),
            fast_interval_s: self.fast_interval,
            slow_interval_s: self.slow_interval,
        })
    }

    fn policy(&self) -> PollPolicy {
        PollPolicy {
            request_timeout: Duration::from_millis(self.timeout_ms),
            backoff_cap_exponent: self.backoff_cap_exponent,
            unavailable_after: self.unavailable_after,
            ..PollPolicy::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let policy = cli.policy();
    let transport: Arc<dyn SnmpTransport> = Arc::new(Snmp2Transport::new(policy.request_timeout));

    match &cli.command {
        Command::Probe => {
            let device = cli.device()?.validate()?;
            let mut detector = DialectDetector::new(policy.dialect_miss_threshold);
            let out = match detector.resolve(transport.as_ref(), &device.target()).await {
                Ok(dialect) => serde_json::json!({
                    "host": device.host,
                    "port": device.port,
                    "dialect": dialect,
                    "state": detector.state(),
                }),
                Err(err) => serde_json::json!({
                    "host": device.host,
                    "port": device.port,
                    "error": err.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Once { format } => {
            let device = cli.device()?.validate()?;
            let coordinator = Coordinator::new(device.host.clone(), device, policy, transport);
            let status = match coordinator.refresh_all().await {
                Ok(snapshot) => DeviceStatus::Available(snapshot),
                Err(err) => DeviceStatus::Unavailable {
                    reason: err.to_string(),
                    since: Utc::now(),
                },
            };
            print_status(&status, (*format).into())?;
        }
        Command::Run { format, config } => {
            let entries = match config {
                Some(path) => load_entries(path)?,
                None => {
                    let device = cli.device()?;
                    vec![DeviceEntry {
                        entry_id: device.host.clone(),
                        device,
                    }]
                }
            };
            run(entries, transport, policy, (*format).into()).await?;
        }
    }

    Ok(())
}

fn load_entries(path: &str) -> Result<Vec<DeviceEntry>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let entries = parse_entries(&json)?;
    if entries.is_empty() {
        bail!("{path} lists no devices");
    }
    Ok(entries)
}

async fn run(
    entries: Vec<DeviceEntry>,
    transport: Arc<dyn SnmpTransport>,
    policy: PollPolicy,
    format: OutputFormat,
) -> Result<()> {
    let mut registry = Registry::new(transport, policy);
    let mut printers = Vec::new();

    for entry in entries {
        match registry.add(&entry.entry_id, entry.device).await {
            Ok(updates) => printers.push(tokio::spawn(stream_updates(updates, format))),
            Err(err) => error!(entry_id = %entry.entry_id, %err, "entry setup failed"),
        }
    }

    if registry.is_empty() {
        bail!("no device could be set up");
    }
    info!(entries = registry.len(), "polling started");

    tokio::signal::ctrl_c().await?;
    warn!("received ctrl-c, stopping");

    registry.shutdown();
    for printer in printers {
        printer.abort();
    }

    Ok(())
}

async fn stream_updates(mut updates: watch::Receiver<DeviceStatus>, format: OutputFormat) {
    loop {
        let status = updates.borrow_and_update().clone();
        if let Err(err) = print_status(&status, format) {
            warn!(%err, "failed to print update");
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
}
