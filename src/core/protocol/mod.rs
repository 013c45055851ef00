// Protocol module - Kit message contract
pub mod command;
pub mod telemetry;

pub use command::OutboundCommand;
pub use telemetry::{ButtonState, TelemetryDisplay, TelemetryFrame};
