//! Control loop
//!
//! Owns the situation store, the current settings and the actuation gate.
//! Each event is processed to completion through `&mut self`, so reading the
//! state, deciding and recording the decision cannot interleave.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::gate::{ActuationDecision, ActuationGate};
use super::policy::AllocationPolicy;
use super::situation::SituationStore;
use super::types::{
    ChargingResult, ChargingSettings, ChargingSituation, ControlEvent, SetpointCommand, Station,
};

/// Everything one control-loop iteration wants the transport to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCycle {
    pub result: ChargingResult,
    pub decisions: [(Station, ActuationDecision); 2],
    pub commands: Vec<SetpointCommand>,
    /// Post-actuation snapshot, broadcast on every cycle
    pub situation: ChargingSituation,
}

#[derive(Debug)]
pub struct ChargingController {
    store: SituationStore,
    settings: ChargingSettings,
    policy: AllocationPolicy,
    gate: ActuationGate,
}

impl ChargingController {
    pub fn new(
        policy: AllocationPolicy,
        settings: ChargingSettings,
        min_set_interval: Duration,
    ) -> Self {
        Self {
            store: SituationStore::new(),
            settings,
            policy,
            gate: ActuationGate::new(min_set_interval),
        }
    }

    pub fn settings(&self) -> &ChargingSettings {
        &self.settings
    }

    pub fn situation(&self) -> ChargingSituation {
        self.store.snapshot()
    }

    pub fn handle(&mut self, event: ControlEvent, now: DateTime<Utc>) -> ControlCycle {
        match event {
            ControlEvent::Settings(settings) => self.settings = settings,
            ControlEvent::Telemetry(update) => self.store.apply_update(&update),
        }
        self.evaluate(now)
    }

    /// Run policy and gate on the current state without a new event
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> ControlCycle {
        let snapshot = self.store.snapshot();
        let result = self.policy.evaluate(&snapshot, &self.settings);
        debug!(
            "Allocation: level={:?} inside={}W/{}mA outside={}W/{}mA",
            self.settings.charging_level,
            result.inside_power_w,
            result.inside_current_ma,
            result.outside_power_w,
            result.outside_current_ma
        );

        let decisions = self.gate.apply(&result, &mut self.store, now);
        let commands = decisions
            .iter()
            .filter(|(_, decision)| decision.should_send())
            .map(|(station, decision)| SetpointCommand {
                station: *station,
                charging_current_ma: decision.current_ma(),
            })
            .collect();

        ControlCycle {
            result,
            decisions,
            commands,
            situation: self.store.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charging::types::{
        ChargingLevel, GridReading, PreferredStation, StationReading, TelemetryUpdate,
    };
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn controller(level: ChargingLevel) -> ChargingController {
        ChargingController::new(
            AllocationPolicy::default(),
            ChargingSettings {
                charging_level: level,
                preferred_station: PreferredStation::None,
            },
            Duration::seconds(10),
        )
    }

    fn grid_export(watts: i64) -> ControlEvent {
        TelemetryUpdate::Grid(GridReading {
            power_from_grid_mw: -watts * 1000,
            battery_level_pct: 80,
            ..Default::default()
        })
        .into()
    }

    fn plugged(station: Station, current_power_w: i64) -> ControlEvent {
        TelemetryUpdate::Station(
            station,
            StationReading {
                connected: true,
                current_power_w,
            },
        )
        .into()
    }

    #[test]
    fn test_first_cycle_initialises_both_stations() {
        let mut controller = controller(ChargingLevel::CarPriority);
        let cycle = controller.handle(grid_export(1000), start());

        assert_eq!(cycle.commands.len(), 2);
        assert!(cycle.commands.iter().all(|c| c.charging_current_ma == 0));
        assert_eq!(cycle.situation.inside_last_set_ma, 0);
        assert_eq!(cycle.situation.outside_last_set_ma, 0);
    }

    #[test]
    fn test_broadcast_without_commands() {
        let mut controller = controller(ChargingLevel::CarPriority);
        controller.handle(grid_export(1000), start());
        let cycle = controller.handle(grid_export(1200), start() + Duration::seconds(20));

        assert!(cycle.commands.is_empty());
        assert_eq!(cycle.situation.power_from_grid_mw, -1_200_000);
    }

    #[test]
    fn test_surplus_reaches_connected_station() {
        let mut controller = controller(ChargingLevel::CarPriority);
        controller.handle(grid_export(5000), start());
        let cycle = controller.handle(plugged(Station::Inside, 0), start() + Duration::seconds(15));

        assert_eq!(cycle.result.inside_power_w, 5000);
        assert_eq!(
            cycle.commands,
            vec![SetpointCommand {
                station: Station::Inside,
                charging_current_ma: 7246,
            }]
        );
        assert_eq!(cycle.situation.inside_last_set_ma, 7246);
        assert_eq!(cycle.situation.outside_last_set_ma, 0);
    }

    #[test]
    fn test_rate_limit_then_implicit_retry() {
        let mut controller = controller(ChargingLevel::CarPriority);
        controller.handle(plugged(Station::Outside, 0), start());
        controller.handle(grid_export(5000), start() + Duration::seconds(11));

        // Surplus rises within the interval: suppressed
        let cycle = controller.handle(grid_export(6000), start() + Duration::seconds(15));
        assert!(cycle.commands.is_empty());
        assert!(matches!(
            cycle.decisions[1].1,
            ActuationDecision::Suppressed { .. }
        ));
        assert_eq!(cycle.situation.outside_last_set_ma, 7246);

        // Unrelated telemetry after the interval re-evaluates and sends
        let cycle = controller.handle(
            TelemetryUpdate::Station(Station::Inside, StationReading::default()).into(),
            start() + Duration::seconds(22),
        );
        assert_eq!(
            cycle.commands,
            vec![SetpointCommand {
                station: Station::Outside,
                charging_current_ma: 8696,
            }]
        );
    }

    #[test]
    fn test_settings_replace_wholesale() {
        let mut controller = controller(ChargingLevel::CarPriority);
        controller.handle(plugged(Station::Inside, 0), start());

        let settings = ChargingSettings {
            charging_level: ChargingLevel::QuickCharge,
            preferred_station: PreferredStation::Outside,
        };
        let cycle = controller.handle(settings.into(), start() + Duration::seconds(30));

        assert_eq!(controller.settings(), &settings);
        assert_eq!(cycle.result.inside_power_w, 8000);
        assert_eq!(cycle.commands[0].charging_current_ma, 11_594);
    }

    #[test]
    fn test_level_off_stops_charging() {
        let mut controller = controller(ChargingLevel::CarPriority);
        controller.handle(grid_export(6000), start());
        controller.handle(plugged(Station::Inside, 0), start() + Duration::seconds(20));
        assert_eq!(controller.situation().inside_last_set_ma, 8696);

        let cycle = controller.handle(
            ChargingSettings::default().into(),
            start() + Duration::seconds(40),
        );
        assert_eq!(
            cycle.commands,
            vec![SetpointCommand {
                station: Station::Inside,
                charging_current_ma: 0,
            }]
        );
    }
}
