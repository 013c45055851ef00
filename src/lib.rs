//! PHYSIs Link Library
//!
//! Client-side contract for PHYSIs maker kits: connection controllers for
//! direct BLE links and MQTT broker sessions, the sensing frame decoder and
//! the output command encoder, plus an in-process kit simulator.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::error::{PhysisError, PhysisResult};
pub use crate::domain::config::PhysisConfig;
pub use crate::domain::identity::{DeviceIdentity, TopicPair};
pub use crate::core::protocol::{ButtonState, OutboundCommand, TelemetryDisplay, TelemetryFrame};
pub use crate::core::session::{BleController, ConnectionState, MqttController, Session, SessionUpdate};
