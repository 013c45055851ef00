use crate::domain::error::{PhysisError, PhysisResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serial number naming a PHYSIs kit. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(serial_number: impl Into<String>) -> PhysisResult<Self> {
        let serial_number = serial_number.into();
        if serial_number.is_empty() {
            return Err(PhysisError::Validation {
                field: "serial number",
            });
        }
        Ok(Self(serial_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceIdentity {
    type Error = PhysisError;

    fn try_from(value: String) -> PhysisResult<Self> {
        Self::new(value)
    }
}

impl From<DeviceIdentity> for String {
    fn from(identity: DeviceIdentity) -> Self {
        identity.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monitoring and control topics bound to an MQTT connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPair {
    subscribe: String,
    publish: String,
}

impl TopicPair {
    /// The subscribe topic is checked first.
    pub fn new(subscribe: impl Into<String>, publish: impl Into<String>) -> PhysisResult<Self> {
        let subscribe = subscribe.into();
        if subscribe.is_empty() {
            return Err(PhysisError::Validation {
                field: "subscribe topic",
            });
        }
        let publish = publish.into();
        if publish.is_empty() {
            return Err(PhysisError::Validation {
                field: "publish topic",
            });
        }
        Ok(Self { subscribe, publish })
    }

    pub fn subscribe(&self) -> &str {
        &self.subscribe
    }

    pub fn publish(&self) -> &str {
        &self.publish
    }
}
