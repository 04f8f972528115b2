//! LifeVector pairing service binary.
//!
//! Runs the pairing handshake behind a line-oriented stdin/stdout bridge. The
//! BLE transport shim writes characteristic writes to stdin and reads
//! notifications from stdout; logs go to stderr.

use clap::Parser;
use pairing_session::{ApplicationWrite, ChannelNotifier, PairingService, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, Subscriber};
use tracing_subscriber::EnvFilter;

mod bridge;
mod config;
mod logging;

use config::PairingConfig;
use logging::PairingLogFormatter;

// Component logging macros are defined in logging.rs and available via #[macro_export]

/// BLE pairing service
#[derive(Parser, Debug)]
#[command(name = "lifevector-pairing", version, about = "BLE pairing service")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Idle time before an unfinished session is evicted, e.g. 5m
    #[arg(long)]
    idle_timeout: Option<humantime::Duration>,

    /// Interval between eviction sweeps, e.g. 30s
    #[arg(long)]
    sweep_interval: Option<humantime::Duration>,

    /// Cap on a reassembled public key or confirmation, in bytes
    #[arg(long)]
    max_value_bytes: Option<usize>,

    /// Forward secure-service writes to the application log
    #[arg(long)]
    forward_application_writes: bool,
}

fn subscriber(service_name: &str, log_level: &str) -> anyhow::Result<impl Subscriber + Send + Sync> {
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("lifevector_pairing={}", log_level).parse()?)
        .add_directive(format!("pairing_session={}", log_level).parse()?)
        .add_directive(format!("pairing_wire={}", log_level).parse()?)
        .add_directive(format!("pairing_crypto={}", log_level).parse()?);

    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(PairingLogFormatter::new(service_name.to_string()))
        .finish())
}

impl Args {
    fn apply_to(&self, config: &mut PairingConfig) {
        if let Some(idle) = &self.idle_timeout {
            config.session_idle_timeout = **idle;
        }
        if let Some(interval) = &self.sweep_interval {
            config.sweep_interval = **interval;
        }
        if let Some(max) = self.max_value_bytes {
            config.max_value_bytes = max;
        }
        if self.forward_application_writes {
            config.forward_application_writes = true;
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config loading logs under a provisional subscriber
    let mut config = {
        let _guard = tracing::subscriber::set_default(subscriber("pairing", &args.log_level)?);
        PairingConfig::load_from_file(&args.config)?
    };
    args.apply_to(&mut config);
    config.validate()?;

    tracing::subscriber::set_global_default(subscriber(&config.service_name, &args.log_level)?)?;

    info!("Starting LifeVector pairing service v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(SessionStore::new(config.max_value_bytes));
    let (notifier, notifications) = ChannelNotifier::new();
    let mut service = PairingService::new(store, Arc::new(notifier));

    let application_task = if config.forward_application_writes {
        let (tx, rx) = mpsc::unbounded_channel();
        service.set_application_sender(tx);
        Some(tokio::spawn(log_application_writes(rx)))
    } else {
        None
    };

    let service = Arc::new(service);

    let sweeper = {
        let service = service.clone();
        let (interval, idle) = (config.sweep_interval, config.session_idle_timeout);
        tokio::spawn(async move { service.run_sweeper(interval, idle).await })
    };

    let bridge = bridge::run(
        service.clone(),
        BufReader::new(tokio::io::stdin()),
        notifications,
        tokio::io::stdout(),
    );

    info!("Pairing service started. Waiting for writes...");

    tokio::select! {
        result = bridge => {
            if let Err(e) = result {
                component_event!(ERROR, "bridge", "Bridge failed: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT signal, shutting down");
        }
    }

    sweeper.abort();
    if let Some(task) = application_task {
        task.abort();
    }

    info!(
        "Pairing service stopped ({} sessions, {} keys issued)",
        service.store().len(),
        service.store().keys_generated()
    );
    Ok(())
}

async fn log_application_writes(mut rx: mpsc::UnboundedReceiver<ApplicationWrite>) {
    while let Some(write) = rx.recv().await {
        component_event!(
            INFO,
            "application",
            characteristic = %write.characteristic,
            bytes = write.payload.len(),
            "Application write"
        );
    }
}
