use std::sync::mpsc;

use charging_controller::charging::{AllocationPolicy, ChargingController, ControlCycle};
use charging_controller::mqtt::{Inbound, MqttPublisher, TopicRouter};
use charging_controller::Config;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::{debug, info, warn};

const ABOUT: &str =
    "Charging Controller - Distributes PV surplus across two EV charging stations";

/// Charging Controller - Distributes PV surplus across two EV charging stations
#[derive(Parser)]
#[command(name = "charging-controller")]
#[command(version)]
#[command(about = ABOUT, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

/// Hand one cycle's output to the broker. Failures are only reported: the gate
/// has already recorded the setpoint and the next event re-evaluates anyway.
fn publish_cycle(publisher: &MqttPublisher, cycle: &ControlCycle) {
    for command in &cycle.commands {
        match publisher.publish_setpoint(command) {
            Ok(()) => info!(
                "Set {} charging current to {} mA",
                command.station, command.charging_current_ma
            ),
            Err(e) => warn!("Failed to send {} setpoint: {}", command.station, e),
        }
    }

    if let Err(e) = publisher.publish_situation(&cycle.situation, Utc::now()) {
        warn!("Failed to publish charging situation: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration first (to get log level)
    let config_path = cli.config;
    let config = Config::from_file(&config_path)?;

    // Initialize tracing with log level from config
    let app_log_level = config.default.log_level.as_str();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("charging_controller={}", app_log_level).parse()?)
                .add_directive("rumqttc=warn".parse()?),
        )
        .init();

    let min_set_interval = Duration::from_std(config.controller.min_set_interval)?;
    let limits = config.controller.power_limits();
    let settings = config.controller.initial_settings();

    info!("Configuration loaded from: {}", config_path);
    info!("Log level: {}", config.default.log_level);
    debug!("Debug logging is enabled");

    info!("  MQTT Root: {}", config.mqtt.root);
    info!("  Minimum set interval: {:?}", config.controller.min_set_interval);
    info!("  Minimum charging power: {}W", limits.min_power_w());
    info!(
        "  Initial settings: level={:?} preferred={:?}",
        settings.charging_level, settings.preferred_station
    );

    let router = TopicRouter::new(&config);
    let (sender, receiver) = mpsc::channel();

    let shutdown = sender.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown.send(Inbound::Shutdown);
    })?;

    info!("Creating MQTT publisher...");
    let publisher = MqttPublisher::new(&config, router.subscriptions(), sender)?;
    info!("✓ MQTT publisher created successfully!");

    publisher.publish_online_status(true)?;
    info!("✓ Published online status");

    let policy = AllocationPolicy::new(limits, config.stations.enabled());
    let mut controller = ChargingController::new(policy, settings, min_set_interval);

    info!("Waiting for data to start calculation...");

    // Single worker: every event is processed to completion before the next one
    while let Ok(inbound) = receiver.recv() {
        let (topic, payload) = match inbound {
            Inbound::Message { topic, payload } => (topic, payload),
            Inbound::Shutdown => {
                info!("Shutting down");
                break;
            }
        };

        if let Some(cycle) = router.dispatch(&mut controller, &topic, &payload, Utc::now()) {
            publish_cycle(&publisher, &cycle);
        }
    }

    if let Err(e) = publisher.publish_online_status(false) {
        warn!("Failed to publish offline status: {}", e);
    }
    publisher.disconnect()?;

    Ok(())
}
