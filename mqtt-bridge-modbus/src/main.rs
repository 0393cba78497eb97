//! MQTT bridge for Modbus water-treatment instruments.
//!
//! Polls analog process values from Modbus TCP sensor transmitters and
//! republishes them as JSON telemetry over MQTT.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

use aquasight_common::LoggingConfig;
use mqtt_bridge_modbus::config::BridgeConfig;
use mqtt_bridge_modbus::link::ModbusLink;
use mqtt_bridge_modbus::poller::SitePoller;
use mqtt_bridge_modbus::publisher::MqttPublisher;

/// MQTT bridge for Modbus process instruments.
#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-modbus")]
#[command(about = "Polls Modbus instruments and publishes telemetry to MQTT")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "wwtp.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    aquasight_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting mqtt-bridge-modbus");
    info!("Loaded configuration from {:?}", args.config);

    // The initial Modbus connect is the one fatal failure in the system: a
    // site that cannot reach its slave at startup aborts the process before
    // any publish is attempted.
    let mut links = Vec::new();
    for site in &config.sites {
        let mut link = ModbusLink::new(&config.modbus)
            .map_err(|e| anyhow::anyhow!("Site '{}': {}", site.id, e))?;
        link.connect().await.map_err(|e| {
            anyhow::anyhow!("Site '{}': failed to connect to Modbus slave: {}", site.id, e)
        })?;

        info!(
            site = %site.id,
            slave = %format!("{}:{}", config.modbus.host, config.modbus.port),
            "Connected to Modbus slave"
        );

        links.push(link);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    for (site, link) in config.sites.iter().zip(links) {
        let publisher = MqttPublisher::connect(&config.mqtt, &site.client_id(), site.topic());
        let poller = SitePoller::new(site.clone(), link, publisher);

        tasks.push(tokio::spawn(poller.run(shutdown_rx.clone())));
    }

    info!("Bridge running with {} site(s)", config.sites.len());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Poller task failed");
        }
    }

    info!("Bridge stopped");
    Ok(())
}
