//! Charging Controller
//!
//! Distributes PV surplus across two EV charging stations sharing one grid
//! connection, driven by MQTT telemetry.

pub mod charging;
pub mod config;
pub mod errors;
pub mod mqtt;

pub use charging::ChargingController;
pub use config::Config;
pub use mqtt::publisher::MqttPublisher;
