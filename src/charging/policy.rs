//! Charging power allocation
//!
//! Turns a situation snapshot and the operator settings into per-station
//! power and current targets. Evaluation is a pure function of its inputs.
//!
//! Two steps:
//! 1. how much power is available for charging under the selected level
//! 2. how that power is split between the two stations

use super::types::{
    ChargingLevel, ChargingResult, ChargingSettings, ChargingSituation, PreferredStation, Station,
};

/// Electrical constants and battery thresholds used by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerLimits {
    pub voltage: i64,
    pub phases: i64,
    /// Smallest current a station accepts (A)
    pub min_current_a: i64,
    pub battery_max_charge_power_w: i64,
    pub battery_max_discharge_power_w: i64,
    /// Battery headroom used for topping up between the protect and reserve levels
    pub battery_assist_power_w: i64,
    pub quick_charge_power_w: i64,
    pub battery_reserve_level_pct: i64,
    pub battery_protect_level_pct: i64,
}

impl Default for PowerLimits {
    fn default() -> Self {
        Self {
            voltage: 230,
            phases: 3,
            min_current_a: 6,
            battery_max_charge_power_w: 3800,
            battery_max_discharge_power_w: 3800,
            battery_assist_power_w: 2000,
            quick_charge_power_w: 8000,
            battery_reserve_level_pct: 90,
            battery_protect_level_pct: 25,
        }
    }
}

impl PowerLimits {
    /// Smallest non-zero power a station can be commanded to draw (W)
    pub fn min_power_w(&self) -> i64 {
        self.voltage
            .saturating_mul(self.min_current_a)
            .saturating_mul(self.phases)
    }

    /// Convert a power budget into the current setpoint for a 3-phase circuit.
    /// Rounds half to even.
    pub fn current_ma(&self, power_w: i64) -> i64 {
        let divisor = self.voltage.saturating_mul(self.phases);
        if divisor <= 0 {
            return 0;
        }
        let current = power_w as f64 * 1000.0 / divisor as f64;
        current.round_ties_even() as i64
    }
}

/// Which stations the controller may drive at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationsEnabled {
    pub inside: bool,
    pub outside: bool,
}

impl Default for StationsEnabled {
    fn default() -> Self {
        Self {
            inside: true,
            outside: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationPolicy {
    limits: PowerLimits,
    enabled: StationsEnabled,
}

fn mw_to_w(value: i64) -> i64 {
    value / 1000
}

impl AllocationPolicy {
    pub fn new(limits: PowerLimits, enabled: StationsEnabled) -> Self {
        Self { limits, enabled }
    }

    pub fn evaluate(
        &self,
        situation: &ChargingSituation,
        settings: &ChargingSettings,
    ) -> ChargingResult {
        let raw = self.raw_available_power(situation);
        let available = self.available_power(raw, situation.battery_level_pct, settings);
        let (inside_power_w, outside_power_w) = self.allocate(available, situation, settings);

        ChargingResult {
            inside_power_w,
            outside_power_w,
            inside_current_ma: self.limits.current_ma(inside_power_w),
            outside_current_ma: self.limits.current_ma(outside_power_w),
        }
    }

    /// Power that would be free for charging if nothing else changed (W).
    /// Grid import and battery discharge are not attributable to charging.
    pub fn raw_available_power(&self, situation: &ChargingSituation) -> i64 {
        mw_to_w(situation.power_from_grid_mw)
            .saturating_neg()
            .saturating_add(situation.outside_current_power_w)
            .saturating_add(situation.inside_current_power_w)
            .saturating_sub(mw_to_w(situation.power_from_battery_mw))
    }

    /// Apply the charging level to the raw surplus.
    ///
    /// The result is either 0 or at least the station minimum.
    pub fn available_power(
        &self,
        raw: i64,
        battery_level: i64,
        settings: &ChargingSettings,
    ) -> i64 {
        let limits = &self.limits;
        let min = limits.min_power_w();

        let adjusted = match settings.charging_level {
            ChargingLevel::Off => 0,
            ChargingLevel::BatteryPriority => {
                if battery_level < limits.battery_reserve_level_pct {
                    self.reserve_for_battery(raw, limits.battery_max_charge_power_w)
                } else {
                    raw
                }
            }
            ChargingLevel::CarPriority => raw,
            ChargingLevel::BatteryAssisted => {
                if battery_level < limits.battery_protect_level_pct {
                    self.reserve_for_battery(raw, limits.battery_max_discharge_power_w)
                } else if battery_level <= limits.battery_reserve_level_pct {
                    Self::top_up(raw, limits.battery_assist_power_w, min)
                } else {
                    Self::top_up(raw, limits.battery_max_discharge_power_w, min)
                }
            }
            ChargingLevel::GridAssisted => raw.max(min),
            ChargingLevel::QuickCharge => raw.max(limits.quick_charge_power_w),
        };

        let adjusted = adjusted.max(0);
        if adjusted < min {
            0
        } else {
            adjusted
        }
    }

    /// Hold `reserve` back for the battery; whatever exceeds it goes to the
    /// cars, never less than the station minimum.
    fn reserve_for_battery(&self, raw: i64, reserve: i64) -> i64 {
        if raw > reserve {
            raw.saturating_sub(reserve).max(self.limits.min_power_w())
        } else {
            0
        }
    }

    /// Lift `raw` to the minimum when the battery can cover the gap
    fn top_up(raw: i64, headroom: i64, min: i64) -> i64 {
        if raw < min && raw.saturating_add(headroom) >= min {
            min
        } else {
            raw
        }
    }

    fn allocate(
        &self,
        available: i64,
        situation: &ChargingSituation,
        settings: &ChargingSettings,
    ) -> (i64, i64) {
        let inside = situation.connected(Station::Inside) && self.enabled.inside;
        let outside = situation.connected(Station::Outside) && self.enabled.outside;
        let min = self.limits.min_power_w();

        match (inside, outside) {
            (true, false) => (available, 0),
            (false, true) => (0, available),
            (false, false) => (0, 0),
            (true, true) => {
                if settings.charging_level == ChargingLevel::GridAssisted {
                    (min, min)
                } else if available >= min.saturating_mul(2) {
                    (available / 2, available / 2)
                } else {
                    match settings.preferred_station {
                        PreferredStation::Outside => (0, available),
                        PreferredStation::Inside | PreferredStation::None => (available, 0),
                    }
                }
            }
        }
    }
}
