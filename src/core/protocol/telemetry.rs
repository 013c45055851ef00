use crate::domain::error::{PhysisError, PhysisResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator used by the kit firmware.
pub const FIELD_DELIMITER: char = ',';

/// Minimum number of fields in a sensing frame.
pub const FRAME_FIELDS: usize = 4;

/// Sensor labels, in frame order.
pub const SENSOR_LABELS: [&str; FRAME_FIELDS] =
    ["Temperature", "Humidity", "Illuminance", "Button State"];

/// Push button state reported in the fourth field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    /// `"1"` (digital HIGH) means the button is held down.
    pub fn from_field(field: &str) -> Self {
        if field == "1" {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self, ButtonState::Pressed)
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonState::Pressed => write!(f, "Button DOWN"),
            ButtonState::Released => write!(f, "Button UP"),
        }
    }
}

/// One sensing frame: `temperature,humidity,illuminance,button`.
///
/// Sensor readings keep the text the kit sent so the display shows exactly
/// what the firmware printed; use the numeric accessors when arithmetic is
/// needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub temperature: String,
    pub humidity: String,
    pub illuminance: String,
    pub button: ButtonState,
}

impl TelemetryFrame {
    /// Decode a frame from its wire text.
    pub fn decode(payload: &str) -> PhysisResult<Self> {
        let line = payload.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();

        if fields.len() < FRAME_FIELDS {
            return Err(PhysisError::MalformedFrame {
                fields: fields.len(),
                payload: payload.to_string(),
            });
        }

        Ok(Self {
            temperature: fields[0].to_string(),
            humidity: fields[1].to_string(),
            illuminance: fields[2].to_string(),
            button: ButtonState::from_field(fields[3]),
        })
    }

    /// Encode back to wire text, as the kit firmware would print it.
    pub fn encode(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.temperature,
            self.humidity,
            self.illuminance,
            if self.button.is_pressed() { "1" } else { "0" },
            d = FIELD_DELIMITER,
        )
    }

    pub fn temperature_celsius(&self) -> PhysisResult<f64> {
        self.numeric(&self.temperature)
    }

    pub fn humidity_percent(&self) -> PhysisResult<f64> {
        self.numeric(&self.humidity)
    }

    pub fn illuminance_lux(&self) -> PhysisResult<f64> {
        self.numeric(&self.illuminance)
    }

    fn numeric(&self, field: &str) -> PhysisResult<f64> {
        field.parse::<f64>().map_err(|_| PhysisError::MalformedFrame {
            fields: FRAME_FIELDS,
            payload: self.encode(),
        })
    }
}

/// Display strings for the four sensor fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryDisplay {
    pub temperature: String,
    pub humidity: String,
    pub illuminance: String,
    pub button: String,
}

impl TelemetryDisplay {
    /// Values shown before the first frame arrives.
    pub fn placeholder() -> Self {
        Self {
            temperature: "00".to_string(),
            humidity: "00".to_string(),
            illuminance: "00".to_string(),
            button: ButtonState::Released.to_string(),
        }
    }

    /// Label/value pairs in frame order.
    pub fn rows(&self) -> [(&'static str, &str); FRAME_FIELDS] {
        [
            (SENSOR_LABELS[0], self.temperature.as_str()),
            (SENSOR_LABELS[1], self.humidity.as_str()),
            (SENSOR_LABELS[2], self.illuminance.as_str()),
            (SENSOR_LABELS[3], self.button.as_str()),
        ]
    }
}

impl Default for TelemetryDisplay {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl From<&TelemetryFrame> for TelemetryDisplay {
    fn from(frame: &TelemetryFrame) -> Self {
        Self {
            temperature: format!("{} ℃", frame.temperature),
            humidity: format!("{} %", frame.humidity),
            illuminance: format!("{} Lux", frame.illuminance),
            button: frame.button.to_string(),
        }
    }
}
