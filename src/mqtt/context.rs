use rumqttc::{Client, QoS};

use crate::errors::MqttError;

pub trait MqttPayload {
    fn to_payload(&self) -> Result<String, MqttError>;
}

impl MqttPayload for bool {
    fn to_payload(&self) -> Result<String, MqttError> {
        Ok(self.to_string())
    }
}

/// Join a prefix and a topic, skipping empty parts
pub fn join_topic(prefix: &str, topic: &str) -> String {
    match (prefix.is_empty(), topic.is_empty()) {
        (true, _) => topic.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, topic),
    }
}

pub struct PublishContext<'a> {
    client: &'a Client,
    pub prefix: String,
    pub qos: QoS,
    pub retain: bool,
}

impl<'a> PublishContext<'a> {
    pub fn new(client: &'a Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }

    pub fn retained(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn publish<T: MqttPayload>(&self, topic: &str, payload: &T) -> Result<(), MqttError> {
        let full_topic = join_topic(&self.prefix, topic);
        let payload = payload.to_payload()?;
        self.client
            .publish(&full_topic, self.qos, self.retain, payload)
            .map_err(|e| MqttError::PublishFailed {
                topic: full_topic,
                reason: e.to_string(),
            })
    }
}
