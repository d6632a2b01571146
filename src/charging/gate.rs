//! Actuation gate
//!
//! Keeps charging stations from being flooded with setpoints. A station only
//! receives a new current when it differs from the last one sent, and never
//! more often than once per `min_interval`. Suppressed values are not queued;
//! the next evaluation simply tries again.
//!
//! The last sent current lives in the [`SituationStore`]; the gate is the only
//! code that writes it.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::situation::SituationStore;
use super::types::{ChargingResult, Station};

/// Per-station gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    RecentlySet(DateTime<Utc>),
}

/// Outcome of offering a target current to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationDecision {
    /// Emit a command with this current
    Send { current_ma: i64 },
    /// Target equals the last sent value
    Unchanged { current_ma: i64 },
    /// Target differs but the last command is too recent
    Suppressed { current_ma: i64, retry_in: Duration },
}

impl ActuationDecision {
    pub fn should_send(&self) -> bool {
        matches!(self, ActuationDecision::Send { .. })
    }

    pub fn current_ma(&self) -> i64 {
        match *self {
            ActuationDecision::Send { current_ma }
            | ActuationDecision::Unchanged { current_ma }
            | ActuationDecision::Suppressed { current_ma, .. } => current_ma,
        }
    }
}

#[derive(Debug)]
pub struct ActuationGate {
    min_interval: Duration,
    inside: GateState,
    outside: GateState,
}

impl ActuationGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            inside: GateState::Idle,
            outside: GateState::Idle,
        }
    }

    pub fn state(&self, station: Station) -> GateState {
        match station {
            Station::Inside => self.inside,
            Station::Outside => self.outside,
        }
    }

    fn state_mut(&mut self, station: Station) -> &mut GateState {
        match station {
            Station::Inside => &mut self.inside,
            Station::Outside => &mut self.outside,
        }
    }

    /// Time left before `station` may receive another setpoint.
    /// A clock that stepped backwards counts as expired.
    fn remaining(&self, station: Station, now: DateTime<Utc>) -> Option<Duration> {
        match self.state(station) {
            GateState::Idle => None,
            GateState::RecentlySet(last) => {
                let elapsed = now - last;
                if elapsed >= Duration::zero() && elapsed < self.min_interval {
                    Some(self.min_interval - elapsed)
                } else {
                    None
                }
            }
        }
    }

    /// Offer a target current for one station.
    ///
    /// A `Send` decision is recorded in `store` immediately; the gate does not
    /// wait for delivery.
    pub fn offer(
        &mut self,
        station: Station,
        current_ma: i64,
        store: &mut SituationStore,
        now: DateTime<Utc>,
    ) -> ActuationDecision {
        let last_sent_ma = store.snapshot().last_set_ma(station);
        if current_ma == last_sent_ma {
            return ActuationDecision::Unchanged { current_ma };
        }

        if let Some(retry_in) = self.remaining(station, now) {
            info!(
                "{} charging current was set too recently, skipping {} mA (retry in {}s)",
                station,
                current_ma,
                retry_in.num_seconds()
            );
            return ActuationDecision::Suppressed {
                current_ma,
                retry_in,
            };
        }

        debug!(
            "{} charging current {} mA -> {} mA",
            station, last_sent_ma, current_ma
        );
        store.record_setpoint(station, current_ma);
        *self.state_mut(station) = GateState::RecentlySet(now);
        ActuationDecision::Send { current_ma }
    }

    /// Offer both stations' targets from one evaluation
    pub fn apply(
        &mut self,
        result: &ChargingResult,
        store: &mut SituationStore,
        now: DateTime<Utc>,
    ) -> [(Station, ActuationDecision); 2] {
        Station::ALL.map(|station| {
            let decision = self.offer(station, result.current_ma(station), store, now);
            (station, decision)
        })
    }
}
