//! Latest-value store for all telemetry sources

use super::types::{ChargingSituation, Station, TelemetryUpdate};

/// Merges independent telemetry sources into one [`ChargingSituation`].
///
/// Each update only touches the fields of its own source. Sources that stop
/// reporting keep their last value; there is no decay.
#[derive(Debug, Default)]
pub struct SituationStore {
    situation: ChargingSituation,
}

impl SituationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_update(&mut self, update: &TelemetryUpdate) {
        let situation = &mut self.situation;
        match *update {
            TelemetryUpdate::Grid(reading) => {
                situation.power_from_grid_mw = reading.power_from_grid_mw;
                situation.power_from_battery_mw = reading.power_from_battery_mw;
                situation.power_from_pv_mw = reading.power_from_pv_mw;
                situation.house_consumption_mw = reading.house_consumption_mw;
                situation.battery_level_pct = reading.battery_level_pct;
            }
            TelemetryUpdate::Station(Station::Inside, reading) => {
                situation.inside_connected = reading.connected;
                situation.inside_current_power_w = reading.current_power_w;
            }
            TelemetryUpdate::Station(Station::Outside, reading) => {
                situation.outside_connected = reading.connected;
                situation.outside_current_power_w = reading.current_power_w;
            }
        }
    }

    /// Record a setpoint that the actuation gate decided to send
    pub fn record_setpoint(&mut self, station: Station, current_ma: i64) {
        match station {
            Station::Inside => self.situation.inside_last_set_ma = current_ma,
            Station::Outside => self.situation.outside_last_set_ma = current_ma,
        }
    }

    /// Copy of the current state, detached from further mutation
    pub fn snapshot(&self) -> ChargingSituation {
        self.situation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charging::types::{GridReading, StationReading, NEVER_SET_MA};

    #[test]
    fn test_starts_with_defaults() {
        let store = SituationStore::new();
        let snapshot = store.snapshot();
        assert!(!snapshot.inside_connected);
        assert!(!snapshot.outside_connected);
        assert_eq!(snapshot.power_from_grid_mw, 0);
        assert_eq!(snapshot.inside_last_set_ma, NEVER_SET_MA);
        assert_eq!(snapshot.outside_last_set_ma, NEVER_SET_MA);
    }

    #[test]
    fn test_station_update_leaves_other_sources_untouched() {
        let mut store = SituationStore::new();
        store.apply_update(&TelemetryUpdate::Grid(GridReading {
            power_from_grid_mw: -3_000_000,
            power_from_battery_mw: 500_000,
            power_from_pv_mw: 6_000_000,
            house_consumption_mw: 2_500_000,
            battery_level_pct: 64,
        }));
        store.apply_update(&TelemetryUpdate::Station(
            Station::Outside,
            StationReading {
                connected: true,
                current_power_w: 4200,
            },
        ));

        let snapshot = store.snapshot();
        assert!(snapshot.outside_connected);
        assert_eq!(snapshot.outside_current_power_w, 4200);
        assert!(!snapshot.inside_connected);
        assert_eq!(snapshot.inside_current_power_w, 0);
        assert_eq!(snapshot.power_from_grid_mw, -3_000_000);
        assert_eq!(snapshot.battery_level_pct, 64);
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        let mut store = SituationStore::new();
        store.apply_update(&TelemetryUpdate::Grid(GridReading {
            battery_level_pct: -5,
            ..Default::default()
        }));
        assert_eq!(store.snapshot().battery_level_pct, -5);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = SituationStore::new();
        let before = store.snapshot();
        store.record_setpoint(Station::Inside, 7246);
        assert_eq!(before.inside_last_set_ma, NEVER_SET_MA);
        assert_eq!(store.snapshot().inside_last_set_ma, 7246);
        assert_eq!(store.snapshot().outside_last_set_ma, NEVER_SET_MA);
    }
}
