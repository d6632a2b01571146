//! MQTT transport adapter
//!
//! Decodes inbound messages into control events and publishes the outcome of
//! each control cycle.

pub mod context;
pub mod publisher;
pub mod telemetry;
pub mod types;

pub use publisher::{Inbound, MqttPublisher};
pub use telemetry::TopicRouter;
