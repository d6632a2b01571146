use crate::charging::{ChargingSituation, SetpointCommand, Station};
use crate::config::{Config, StationsConfig};
use crate::errors::MqttError;
use crate::mqtt::context::PublishContext;
use crate::mqtt::types::{SetpointMessage, SituationMessage};
use chrono::{DateTime, Utc};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

/// Back-off after a failed connection attempt
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Work item for the control loop thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message { topic: String, payload: Vec<u8> },
    Shutdown,
}

pub struct MqttPublisher {
    client: Client,
    root_topic: String,
    situation_topic: String,
    stations: StationsConfig,
}

impl MqttPublisher {
    /// Connect to the broker and forward every message received on
    /// `subscriptions` to `inbound`.
    pub fn new(
        config: &Config,
        subscriptions: Vec<String>,
        inbound: Sender<Inbound>,
    ) -> Result<Self, MqttError> {
        let client_id = config.mqtt.client_id.clone();

        let mut mqtt_options = if let Some(socket_path) = &config.mqtt.socket {
            // Unix domain socket connection
            tracing::info!("Using MQTT Unix socket: {}", socket_path);
            let mut options = MqttOptions::new(client_id, socket_path, 0);
            #[cfg(unix)]
            options.set_transport(rumqttc::Transport::unix());
            options
        } else {
            // TCP connection
            let host = config.mqtt.host.as_ref().ok_or_else(|| {
                MqttError::ClientError("MQTT host or socket must be configured".to_string())
            })?;

            tracing::info!("Using MQTT TCP connection: {}:{}", host, config.mqtt.port);
            MqttOptions::new(client_id, host, config.mqtt.port)
        };

        if !config.mqtt.username.is_empty() {
            mqtt_options.set_credentials(&config.mqtt.username, &config.mqtt.password);
        }

        mqtt_options.set_keep_alive(Duration::from_secs(60));

        // Set Last Will and Testament - publish "false" to online topic when connection is lost
        let online_topic = format!("{}/online", config.mqtt.root);
        mqtt_options.set_last_will(rumqttc::LastWill {
            topic: online_topic,
            message: b"false".to_vec().into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        });

        let (client, mut connection) = Client::new(mqtt_options, 10);

        // Connection is polled on its own thread; the control loop only sees a channel
        let subscriber = client.clone();
        thread::spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                        // Subscriptions do not survive a clean-session reconnect
                        for topic in &subscriptions {
                            if let Err(e) = subscriber.try_subscribe(topic, QoS::AtLeastOnce) {
                                tracing::error!("Failed to subscribe to '{}': {:?}", topic, e);
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = Inbound::Message {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        };
                        if inbound.send(message).is_err() {
                            tracing::debug!("Control loop has stopped, closing MQTT connection");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("MQTT connection error: {:?}", e);
                        thread::sleep(RECONNECT_DELAY);
                    }
                }
            }
        });

        Ok(Self {
            client,
            root_topic: config.mqtt.root.clone(),
            situation_topic: config.topics.situation.clone(),
            stations: config.stations.clone(),
        })
    }

    pub fn context(&'_ self, prefix: &str) -> PublishContext<'_> {
        PublishContext::new(&self.client, prefix)
    }

    fn command_topic(&self, station: Station) -> &str {
        &self.stations.get(station).command_topic
    }

    pub fn publish_online_status(&self, online: bool) -> Result<(), MqttError> {
        self.context(&self.root_topic).publish("online", &online)
    }

    /// Publish a current setpoint for one station (not retained)
    pub fn publish_setpoint(&self, command: &SetpointCommand) -> Result<(), MqttError> {
        let message = SetpointMessage {
            charging_current: command.charging_current_ma,
        };
        self.context(self.command_topic(command.station))
            .retained(false)
            .publish("", &message)
    }

    /// Publish the situation snapshot (retained for late subscribers)
    pub fn publish_situation(
        &self,
        situation: &ChargingSituation,
        time: DateTime<Utc>,
    ) -> Result<(), MqttError> {
        let message = SituationMessage::from_situation(situation, time);
        self.context(&self.situation_topic).publish("", &message)
    }

    pub fn disconnect(&self) -> Result<(), MqttError> {
        self.client
            .disconnect()
            .map_err(|e| MqttError::ClientError(e.to_string()))
    }
}
