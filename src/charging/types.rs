//! Data types shared by the charging core
//!
//! Power values are kept as `i64` so that accumulating a handful of
//! milliwatt readings can never overflow.

use serde::{Deserialize, Serialize};

/// Sentinel for "no setpoint has been sent yet"
pub const NEVER_SET_MA: i64 = -1;

/// One of the two physical charging stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Station {
    /// Garage station
    Inside,
    Outside,
}

impl Station {
    pub const ALL: [Station; 2] = [Station::Inside, Station::Outside];

    pub fn as_str(&self) -> &'static str {
        match self {
            Station::Inside => "inside",
            Station::Outside => "outside",
        }
    }
}

impl std::fmt::Display for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Station that wins when power is insufficient for both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferredStation {
    #[default]
    None,
    Inside,
    Outside,
}

/// Operator-selected charging profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ChargingLevel {
    /// 0: charging disabled
    #[default]
    Off,
    /// 1: surplus charging, the home battery is filled first
    BatteryPriority,
    /// 2: surplus charging, the car is served first
    CarPriority,
    /// 3: surplus charging, topped up from the battery when close to the minimum
    BatteryAssisted,
    /// 4: surplus charging, topped up from the grid to the minimum
    GridAssisted,
    /// 5: fixed high power regardless of surplus
    QuickCharge,
}

impl TryFrom<i64> for ChargingLevel {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChargingLevel::Off),
            1 => Ok(ChargingLevel::BatteryPriority),
            2 => Ok(ChargingLevel::CarPriority),
            3 => Ok(ChargingLevel::BatteryAssisted),
            4 => Ok(ChargingLevel::GridAssisted),
            5 => Ok(ChargingLevel::QuickCharge),
            other => Err(format!("charging level {} is outside 0..=5", other)),
        }
    }
}

impl From<ChargingLevel> for i64 {
    fn from(level: ChargingLevel) -> Self {
        match level {
            ChargingLevel::Off => 0,
            ChargingLevel::BatteryPriority => 1,
            ChargingLevel::CarPriority => 2,
            ChargingLevel::BatteryAssisted => 3,
            ChargingLevel::GridAssisted => 4,
            ChargingLevel::QuickCharge => 5,
        }
    }
}

/// Operator settings, replaced wholesale on every update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChargingSettings {
    pub charging_level: ChargingLevel,
    pub preferred_station: PreferredStation,
}

/// Latest known electrical state of the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargingSituation {
    pub inside_connected: bool,
    pub outside_connected: bool,
    pub inside_current_power_w: i64,
    pub outside_current_power_w: i64,
    pub power_from_grid_mw: i64,    // negative when exporting
    pub power_from_battery_mw: i64, // negative when the battery is charging
    pub power_from_pv_mw: i64,
    pub house_consumption_mw: i64,
    pub battery_level_pct: i64,
    pub inside_last_set_ma: i64,
    pub outside_last_set_ma: i64,
}

impl Default for ChargingSituation {
    fn default() -> Self {
        Self {
            inside_connected: false,
            outside_connected: false,
            inside_current_power_w: 0,
            outside_current_power_w: 0,
            power_from_grid_mw: 0,
            power_from_battery_mw: 0,
            power_from_pv_mw: 0,
            house_consumption_mw: 0,
            battery_level_pct: 0,
            inside_last_set_ma: NEVER_SET_MA,
            outside_last_set_ma: NEVER_SET_MA,
        }
    }
}

impl ChargingSituation {
    pub fn connected(&self, station: Station) -> bool {
        match station {
            Station::Inside => self.inside_connected,
            Station::Outside => self.outside_connected,
        }
    }

    pub fn last_set_ma(&self, station: Station) -> i64 {
        match station {
            Station::Inside => self.inside_last_set_ma,
            Station::Outside => self.outside_last_set_ma,
        }
    }
}

/// Allocation computed for one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChargingResult {
    pub inside_power_w: i64,
    pub outside_power_w: i64,
    pub inside_current_ma: i64,
    pub outside_current_ma: i64,
}

impl ChargingResult {
    pub fn current_ma(&self, station: Station) -> i64 {
        match station {
            Station::Inside => self.inside_current_ma,
            Station::Outside => self.outside_current_ma,
        }
    }
}

/// Readings published by the grid meter / battery inverter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridReading {
    pub power_from_grid_mw: i64,
    pub power_from_battery_mw: i64,
    pub power_from_pv_mw: i64,
    pub house_consumption_mw: i64,
    pub battery_level_pct: i64,
}

/// Readings published by one charging station
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationReading {
    pub connected: bool,
    pub current_power_w: i64,
}

/// Telemetry update, tagged with the source that owns its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryUpdate {
    Grid(GridReading),
    Station(Station, StationReading),
}

/// Everything the control loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Settings(ChargingSettings),
    Telemetry(TelemetryUpdate),
}

impl From<TelemetryUpdate> for ControlEvent {
    fn from(update: TelemetryUpdate) -> Self {
        ControlEvent::Telemetry(update)
    }
}

impl From<ChargingSettings> for ControlEvent {
    fn from(settings: ChargingSettings) -> Self {
        ControlEvent::Settings(settings)
    }
}

/// Setpoint to hand to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetpointCommand {
    pub station: Station,
    pub charging_current_ma: i64,
}
