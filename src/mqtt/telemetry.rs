//! Inbound topic routing
//!
//! Decodes `(topic, payload)` pairs into [`ControlEvent`]s exactly once, at the
//! transport boundary. Payloads that do not decode never reach the controller.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::charging::{ChargingController, ControlCycle, ControlEvent, Station, TelemetryUpdate};
use crate::config::Config;
use crate::errors::TelemetryError;
use crate::mqtt::types::{GridMessage, SettingsMessage, StationMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Settings,
    Grid,
    Station(Station),
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: Vec<(String, Source)>,
}

fn parse<T: DeserializeOwned>(topic: &str, payload: &[u8]) -> Result<T, TelemetryError> {
    serde_json::from_slice(payload).map_err(|e| TelemetryError::MalformedPayload {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

impl TopicRouter {
    pub fn new(config: &Config) -> Self {
        let routes = vec![
            (config.topics.settings.clone(), Source::Settings),
            (config.topics.grid.clone(), Source::Grid),
            (
                config.stations.inside.state_topic.clone(),
                Source::Station(Station::Inside),
            ),
            (
                config.stations.outside.state_topic.clone(),
                Source::Station(Station::Outside),
            ),
        ];
        Self { routes }
    }

    /// Topics to subscribe to
    pub fn subscriptions(&self) -> Vec<String> {
        self.routes.iter().map(|(topic, _)| topic.clone()).collect()
    }

    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<ControlEvent, TelemetryError> {
        let source = self
            .routes
            .iter()
            .find(|(route, _)| route == topic)
            .map(|(_, source)| *source)
            .ok_or_else(|| TelemetryError::UnknownTopic(topic.to_string()))?;

        let event = match source {
            Source::Settings => {
                ControlEvent::Settings(parse::<SettingsMessage>(topic, payload)?.to_settings())
            }
            Source::Grid => {
                TelemetryUpdate::Grid(parse::<GridMessage>(topic, payload)?.to_reading()).into()
            }
            Source::Station(station) => TelemetryUpdate::Station(
                station,
                parse::<StationMessage>(topic, payload)?.to_reading(),
            )
            .into(),
        };
        Ok(event)
    }

    /// Decode one message and run it through the controller.
    ///
    /// Returns `None` when the message is dropped: unknown topics quietly,
    /// malformed payloads with a warning. The controller is not touched then.
    pub fn dispatch(
        &self,
        controller: &mut ChargingController,
        topic: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Option<ControlCycle> {
        let event = match self.decode(topic, payload) {
            Ok(event) => event,
            Err(e @ TelemetryError::UnknownTopic(_)) => {
                debug!("{}", e);
                return None;
            }
            Err(e) => {
                warn!("Dropping telemetry: {}", e);
                return None;
            }
        };
        debug!("Received {:?} on {}", event, topic);
        Some(controller.handle(event, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charging::{ChargingLevel, ChargingSettings, PreferredStation, StationReading};

    fn router() -> TopicRouter {
        TopicRouter::new(&Config::from_toml("[mqtt]\nhost = \"test\"").unwrap())
    }

    #[test]
    fn test_subscriptions_cover_all_sources() {
        assert_eq!(
            router().subscriptions(),
            vec![
                "config/charging/settings",
                "data/electricity/envoym3",
                "data/charging/KebaGarage",
                "data/charging/KebaOutside",
            ]
        );
    }

    #[test]
    fn test_decode_station() {
        let event = router()
            .decode(
                "data/charging/KebaOutside",
                br#"{"CarIsPlugedIn": false, "CurrentChargingPower": 0}"#,
            )
            .unwrap();
        assert_eq!(
            event,
            ControlEvent::Telemetry(TelemetryUpdate::Station(
                Station::Outside,
                StationReading::default()
            ))
        );
    }

    #[test]
    fn test_decode_settings() {
        let event = router()
            .decode(
                "config/charging/settings",
                br#"{"ChargingLevel": 5, "PreferedChargingStation": "Inside"}"#,
            )
            .unwrap();
        assert_eq!(
            event,
            ControlEvent::Settings(ChargingSettings {
                charging_level: ChargingLevel::QuickCharge,
                preferred_station: PreferredStation::Inside,
            })
        );
    }

    #[test]
    fn test_unknown_topic() {
        let error = router().decode("data/charging/Elsewhere", b"{}").unwrap_err();
        assert!(matches!(error, TelemetryError::UnknownTopic(t) if t == "data/charging/Elsewhere"));
    }

    #[test]
    fn test_malformed_payload() {
        let router = router();
        for payload in [&b"not json"[..], &br#"{"BatteryLevel": "full"}"#[..], &b""[..]] {
            let error = router.decode("data/electricity/envoym3", payload).unwrap_err();
            assert!(matches!(error, TelemetryError::MalformedPayload { .. }));
        }
    }
}
