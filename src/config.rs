//! Configuration module for the charging controller
//!
//! Loads configuration from a TOML file:
//! - [default] - General settings (log_level)
//! - [mqtt] - MQTT broker settings
//! - [topics] - Shared inbound/outbound topics
//! - [stations.inside], [stations.outside] - Per-station topics
//! - [controller] - Allocation tunables and initial settings

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::charging::{
    ChargingLevel, ChargingSettings, PowerLimits, PreferredStation, Station, StationsEnabled,
};

/// Log level for the application
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing LevelFilter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

/// General application settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DefaultConfig {
    /// Log level: TRACE, DEBUG, INFO, WARN, ERROR
    #[serde(default)]
    pub log_level: LogLevel,
}

/// MQTT broker configuration
#[derive(Deserialize, Clone)]
pub struct MqttConfig {
    /// Root topic for the controller's own status (e.g., "charging-controller")
    #[serde(default = "default_mqtt_root")]
    pub root: String,

    /// MQTT broker hostname
    pub host: Option<String>,

    /// MQTT broker port (default 1883)
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Unix socket path, takes precedence over host
    pub socket: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

fn default_mqtt_root() -> String {
    "charging-controller".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "smarthome-charging-controller".to_string()
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("root", &self.root)
            .finish()
    }
}

/// Topics not tied to a single station
#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    /// Inbound operator settings
    #[serde(default = "default_settings_topic")]
    pub settings: String,

    /// Inbound grid meter / battery inverter readings
    #[serde(default = "default_grid_topic")]
    pub grid: String,

    /// Outbound situation broadcast (retained)
    #[serde(default = "default_situation_topic")]
    pub situation: String,
}

fn default_settings_topic() -> String {
    "config/charging/settings".to_string()
}

fn default_grid_topic() -> String {
    "data/electricity/envoym3".to_string()
}

fn default_situation_topic() -> String {
    "data/charging/situation".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            settings: default_settings_topic(),
            grid: default_grid_topic(),
            situation: default_situation_topic(),
        }
    }
}

/// Topics and enable flag of one charging station
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Inbound station readings
    pub state_topic: String,

    /// Outbound current setpoints
    pub command_topic: String,

    pub enabled: bool,
}

impl StationConfig {
    fn for_device(device: &str) -> Self {
        Self {
            state_topic: format!("data/charging/{}", device),
            command_topic: format!("commands/charging/{}", device),
            enabled: true,
        }
    }
}

/// Station table as written in the file; missing keys fall back to the
/// station's device defaults
#[derive(Debug, Deserialize, Default)]
struct StationOverrides {
    state_topic: Option<String>,
    command_topic: Option<String>,
    enabled: Option<bool>,
}

impl StationOverrides {
    fn over(self, defaults: StationConfig) -> StationConfig {
        StationConfig {
            state_topic: self.state_topic.unwrap_or(defaults.state_topic),
            command_topic: self.command_topic.unwrap_or(defaults.command_topic),
            enabled: self.enabled.unwrap_or(defaults.enabled),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct StationsSection {
    #[serde(default)]
    inside: StationOverrides,
    #[serde(default)]
    outside: StationOverrides,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(from = "StationsSection")]
pub struct StationsConfig {
    pub inside: StationConfig,
    pub outside: StationConfig,
}

impl From<StationsSection> for StationsConfig {
    fn from(section: StationsSection) -> Self {
        Self {
            inside: section.inside.over(StationConfig::for_device("KebaGarage")),
            outside: section.outside.over(StationConfig::for_device("KebaOutside")),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        StationsSection::default().into()
    }
}

impl StationsConfig {
    pub fn get(&self, station: Station) -> &StationConfig {
        match station {
            Station::Inside => &self.inside,
            Station::Outside => &self.outside,
        }
    }

    pub fn enabled(&self) -> StationsEnabled {
        StationsEnabled {
            inside: self.inside.enabled,
            outside: self.outside.enabled,
        }
    }
}

/// Allocation tunables and the settings used until the first settings message
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum time between two setpoints for the same station (e.g., "10s")
    #[serde(with = "humantime_serde")]
    pub min_set_interval: Duration,

    pub voltage: i64,
    pub phases: i64,
    /// Smallest current a station can be commanded to (A)
    pub min_current_a: i64,
    pub battery_max_charge_power_w: i64,
    pub battery_max_discharge_power_w: i64,
    pub battery_assist_power_w: i64,
    pub quick_charge_power_w: i64,
    pub battery_reserve_level_pct: i64,
    pub battery_protect_level_pct: i64,

    pub charging_level: ChargingLevel,
    pub preferred_station: PreferredStation,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let limits = PowerLimits::default();
        Self {
            min_set_interval: Duration::from_secs(10),
            voltage: limits.voltage,
            phases: limits.phases,
            min_current_a: limits.min_current_a,
            battery_max_charge_power_w: limits.battery_max_charge_power_w,
            battery_max_discharge_power_w: limits.battery_max_discharge_power_w,
            battery_assist_power_w: limits.battery_assist_power_w,
            quick_charge_power_w: limits.quick_charge_power_w,
            battery_reserve_level_pct: limits.battery_reserve_level_pct,
            battery_protect_level_pct: limits.battery_protect_level_pct,
            charging_level: ChargingLevel::default(),
            preferred_station: PreferredStation::default(),
        }
    }
}

impl ControllerConfig {
    pub fn power_limits(&self) -> PowerLimits {
        PowerLimits {
            voltage: self.voltage,
            phases: self.phases,
            min_current_a: self.min_current_a,
            battery_max_charge_power_w: self.battery_max_charge_power_w,
            battery_max_discharge_power_w: self.battery_max_discharge_power_w,
            battery_assist_power_w: self.battery_assist_power_w,
            quick_charge_power_w: self.quick_charge_power_w,
            battery_reserve_level_pct: self.battery_reserve_level_pct,
            battery_protect_level_pct: self.battery_protect_level_pct,
        }
    }

    pub fn initial_settings(&self) -> ChargingSettings {
        ChargingSettings {
            charging_level: self.charging_level,
            preferred_station: self.preferred_station,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the config.toml file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration logic (semantic validation beyond type checks)
    fn validate(&self) -> Result<(), ConfigError> {
        let has_host = self.mqtt.host.as_ref().is_some_and(|h| !h.is_empty());
        if !has_host && self.mqtt.socket.is_none() {
            return Err(ConfigError::ValidationError(
                "mqtt.host or mqtt.socket must be set".to_string(),
            ));
        }

        let controller = &self.controller;
        for (name, value) in [
            ("voltage", controller.voltage),
            ("phases", controller.phases),
            ("min_current_a", controller.min_current_a),
        ] {
            if value <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "controller.{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let inbound = [
            &self.topics.settings,
            &self.topics.grid,
            &self.stations.inside.state_topic,
            &self.stations.outside.state_topic,
        ];
        for (i, topic) in inbound.iter().enumerate() {
            if inbound[i + 1..].contains(topic) {
                return Err(ConfigError::ValidationError(format!(
                    "inbound topic '{}' is configured more than once",
                    topic
                )));
            }
        }

        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
