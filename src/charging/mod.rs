//! Charging power allocation core
//!
//! Free of I/O: events go in, a [`ControlCycle`] describing what to publish
//! comes out.

pub mod controller;
pub mod gate;
pub mod policy;
pub mod situation;
pub mod types;

pub use controller::{ChargingController, ControlCycle};
pub use gate::{ActuationDecision, ActuationGate, GateState};
pub use policy::{AllocationPolicy, PowerLimits, StationsEnabled};
pub use situation::SituationStore;
pub use types::*;
