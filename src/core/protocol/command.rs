use crate::domain::error::{PhysisError, PhysisResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const DIGITAL_HIGH: &str = "DH";
const DIGITAL_LOW: &str = "DL";
const ANALOG_PREFIX: &str = "A";

/// Control command sent to the kit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundCommand {
    /// Drive the digital output high
    DigitalHigh,
    /// Drive the digital output low
    DigitalLow,
    /// Write an analog value; the text is forwarded as typed
    AnalogWrite(String),
}

impl OutboundCommand {
    pub fn analog(value: impl Into<String>) -> Self {
        OutboundCommand::AnalogWrite(value.into())
    }

    /// Wire text for this command. Never fails.
    pub fn encode(&self) -> String {
        match self {
            OutboundCommand::DigitalHigh => DIGITAL_HIGH.to_string(),
            OutboundCommand::DigitalLow => DIGITAL_LOW.to_string(),
            OutboundCommand::AnalogWrite(value) => format!("{}{}", ANALOG_PREFIX, value),
        }
    }

    /// Rejects an analog write with no value. Controllers call this before
    /// anything reaches the transport.
    pub fn validate(&self) -> PhysisResult<()> {
        match self {
            OutboundCommand::AnalogWrite(value) if value.is_empty() => {
                Err(PhysisError::Validation {
                    field: "analog value",
                })
            }
            _ => Ok(()),
        }
    }

    /// Parse wire text back into a command.
    pub fn parse(text: &str) -> PhysisResult<Self> {
        match text {
            DIGITAL_HIGH => Ok(OutboundCommand::DigitalHigh),
            DIGITAL_LOW => Ok(OutboundCommand::DigitalLow),
            other => match other.strip_prefix(ANALOG_PREFIX) {
                Some(value) => Ok(OutboundCommand::AnalogWrite(value.to_string())),
                None => Err(PhysisError::InvalidInput(format!(
                    "Unknown command '{}'",
                    other
                ))),
            },
        }
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
