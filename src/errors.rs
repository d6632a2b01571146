//! Error types for the charging controller
//!
//! Uses thiserror for ergonomic error definitions.
//! These errors can be converted to anyhow::Error in the main application.

/// Inbound telemetry that could not be turned into a control event
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("No handler for topic '{0}'")]
    UnknownTopic(String),

    #[error("Malformed payload on topic '{topic}': {reason}")]
    MalformedPayload { topic: String, reason: String },
}

/// MQTT connection and publishing errors
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Failed to publish message to topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Failed to serialize data: {error:?}")]
    SerializationError { error: serde_json::Error },

    #[error("MQTT client error: {0}")]
    ClientError(String),
}
