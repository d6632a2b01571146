//! Wire formats exchanged with the other smart-home services
//!
//! Field names follow the JSON the station and meter connectors already
//! publish, so they are PascalCase (including their spelling).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::charging::{
    ChargingLevel, ChargingSettings, ChargingSituation, GridReading, PreferredStation,
    StationReading,
};
use crate::errors::MqttError;
use crate::mqtt::context::MqttPayload;

/// Saturating conversion of a decimal reading to whole milliwatts
fn milliwatts(value: f64) -> i64 {
    value as i64
}

/// Operator settings from the web UI / app
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsMessage {
    #[serde(alias = "charging_level")]
    pub charging_level: ChargingLevel,

    #[serde(rename = "PreferedChargingStation", alias = "preferred_station", default)]
    pub preferred_station: PreferredStation,
}

impl SettingsMessage {
    pub fn to_settings(&self) -> ChargingSettings {
        ChargingSettings {
            charging_level: self.charging_level,
            preferred_station: self.preferred_station,
        }
    }
}

/// Envoy meter / battery inverter reading
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridMessage {
    pub battery_level: i64, // %
    #[serde(rename = "PowerFromPV")]
    pub power_from_pv: f64, // mW
    pub power_from_battery: f64, // mW, negative when charging
    pub power_from_grid: f64, // mW, negative when feeding into the grid
    pub power_to_house: f64, // mW
}

impl GridMessage {
    pub fn to_reading(&self) -> GridReading {
        GridReading {
            power_from_grid_mw: milliwatts(self.power_from_grid),
            power_from_battery_mw: milliwatts(self.power_from_battery),
            power_from_pv_mw: milliwatts(self.power_from_pv),
            house_consumption_mw: milliwatts(self.power_to_house),
            battery_level_pct: self.battery_level,
        }
    }
}

/// Charging station state as published by the station connector
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationMessage {
    #[serde(rename = "CarIsPlugedIn")]
    pub car_is_plugged_in: bool,
    pub current_charging_power: i64, // W
}

impl StationMessage {
    pub fn to_reading(&self) -> StationReading {
        StationReading {
            connected: self.car_is_plugged_in,
            current_power_w: self.current_charging_power,
        }
    }
}

/// Setpoint for one charging station
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SetpointMessage {
    pub charging_current: i64, // mA
}

/// Situation broadcast for dashboards
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SituationMessage {
    pub time: DateTime<Utc>,
    pub inside_connected: bool,
    pub outside_connected: bool,
    pub inside_current_charging_power: i64, // W
    pub outside_current_charging_power: i64, // W
    pub grid_power: i64, // mW
    pub power_from_battery: i64, // mW
    #[serde(rename = "PowerFromPV")]
    pub power_from_pv: i64, // mW
    pub house_consumption: i64, // mW
    pub battery_level: i64, // %
    #[serde(rename = "InsideChargingLatestmA")]
    pub inside_charging_latest_ma: i64,
    #[serde(rename = "OutsideChargingLatestmA")]
    pub outside_charging_latest_ma: i64,
}

impl SituationMessage {
    pub fn from_situation(situation: &ChargingSituation, time: DateTime<Utc>) -> Self {
        Self {
            time,
            inside_connected: situation.inside_connected,
            outside_connected: situation.outside_connected,
            inside_current_charging_power: situation.inside_current_power_w,
            outside_current_charging_power: situation.outside_current_power_w,
            grid_power: situation.power_from_grid_mw,
            power_from_battery: situation.power_from_battery_mw,
            power_from_pv: situation.power_from_pv_mw,
            house_consumption: situation.house_consumption_mw,
            battery_level: situation.battery_level_pct,
            inside_charging_latest_ma: situation.inside_last_set_ma,
            outside_charging_latest_ma: situation.outside_last_set_ma,
        }
    }
}

macro_rules! json_payload {
    ($($message:ty),+) => {
        $(
            impl MqttPayload for $message {
                fn to_payload(&self) -> Result<String, MqttError> {
                    serde_json::to_string(self)
                        .map_err(|error| MqttError::SerializationError { error })
                }
            }
        )+
    };
}

json_payload!(SetpointMessage, SituationMessage);
