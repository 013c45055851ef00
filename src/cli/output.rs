use crate::cli::args::OutputFormat;
use crate::core::communication::MessageDirection;
use crate::core::protocol::{TelemetryDisplay, TelemetryFrame};
use crate::core::session::{ConnectionState, Session};
use crate::domain::config::{DeviceConfig, PhysisConfig};
use serde_json;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_telemetry(&self, frame: &TelemetryFrame) -> Result<(), OutputError>;
    fn write_state(&self, state: ConnectionState) -> Result<(), OutputError>;
    fn write_session(&self, session: &Session) -> Result<(), OutputError>;
    fn write_config(&self, config: &PhysisConfig) -> Result<(), OutputError>;
    fn write_devices(&self, devices: &[DeviceConfig]) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::PhysisError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
    quiet: bool,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quiet: false,
        }
    }

    /// Writer that only reports errors
    pub fn quiet(format: OutputFormat) -> Self {
        Self {
            format,
            quiet: true,
        }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_telemetry(&self, frame: &TelemetryFrame) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        let display = TelemetryDisplay::from(frame);
        match self.format {
            OutputFormat::Text => {
                for (label, value) in display.rows() {
                    println!("{:<14}{}", format!("{}:", label), value);
                }
                println!();
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "frame": frame,
                    "display": display,
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            OutputFormat::Table => {
                println!("{}", Table::new(vec![TelemetryRow::from(&display)]));
            }
        }
        Ok(())
    }

    fn write_state(&self, state: ConnectionState) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "state": state, "code": state.code() });
                println!("{}", serde_json::to_string(&output)?);
            }
            _ => println!("[{}]", state),
        }
        Ok(())
    }

    fn write_session(&self, session: &Session) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Text => {
                let stats = session.statistics();
                println!("Session: {} ({})", session.session_id(), session.transport_type());
                println!("  Kit: {}", session.device());
                if let Some(topics) = session.topics() {
                    println!("  Monitoring topic: {}", topics.subscribe());
                    println!("  Control topic: {}", topics.publish());
                }
                println!("  Status: {}", session.status());
                println!("  Frames: {} decoded, {} rejected", stats.frames_decoded, stats.frames_rejected);
                println!("  Commands: {} sent, {} dropped", stats.commands_sent, stats.commands_dropped);

                let errors = session.history().filtered(MessageDirection::Error);
                if !errors.is_empty() {
                    println!("  Errors:");
                    for message in errors {
                        println!("    {}", message.payload);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(session)?);
            }
            OutputFormat::Table => {
                println!("{}", Table::new(vec![SessionRow::from(session)]));
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &PhysisConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("PHYSIs Link Configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  History limit: {}", config.global.history_limit);
                println!("  Connect timeout: {}ms", config.global.connect_timeout_ms);
                println!("  Frame policy: {:?}", config.global.frame_policy);
                println!("  Subscribe policy: {:?}", config.global.subscribe_policy);
                println!("  Simulated kit: {}", config.simulator.serial_number);

                if !config.devices.is_empty() {
                    println!("  Devices:");
                    for device in &config.devices {
                        let desc = if device.description.is_empty() { "No description" } else { &device.description };
                        println!("    {}: {}", device.name, desc);
                    }
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(config)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                if !config.devices.is_empty() {
                    let table_data: Vec<DeviceTableRow> = config.devices.iter().map(DeviceTableRow::from).collect();
                    println!("{}", Table::new(table_data));
                }
            }
        }
        Ok(())
    }

    fn write_devices(&self, devices: &[DeviceConfig]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                for device in devices {
                    println!("Device: {}", device.name);
                    let desc = if device.description.is_empty() { "No description" } else { &device.description };
                    println!("  Description: {}", desc);
                    println!("  Link: {} ({})", device.link.kind(), device.link.serial_number());
                    println!();
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(devices)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                if !devices.is_empty() {
                    let table_data: Vec<DeviceTableRow> = devices.iter().map(DeviceTableRow::from).collect();
                    println!("{}", Table::new(table_data));
                }
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for a sensing frame
#[derive(Tabled)]
struct TelemetryRow {
    temperature: String,
    humidity: String,
    illuminance: String,
    button: String,
}

impl From<&TelemetryDisplay> for TelemetryRow {
    fn from(display: &TelemetryDisplay) -> Self {
        Self {
            temperature: display.temperature.clone(),
            humidity: display.humidity.clone(),
            illuminance: display.illuminance.clone(),
            button: display.button.clone(),
        }
    }
}

/// Table row for a session summary
#[derive(Tabled)]
struct SessionRow {
    id: String,
    kit: String,
    transport: String,
    status: String,
    frames: u64,
    rejected: u64,
    sent: u64,
    dropped: u64,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        let stats = session.statistics();
        Self {
            id: session.session_id().to_string(),
            kit: session.device().to_string(),
            transport: session.transport_type().to_string(),
            status: session.status().to_string(),
            frames: stats.frames_decoded,
            rejected: stats.frames_rejected,
            sent: stats.commands_sent,
            dropped: stats.commands_dropped,
        }
    }
}

/// Table row for device configuration
#[derive(Tabled)]
struct DeviceTableRow {
    name: String,
    description: String,
    link: String,
    serial: String,
}

impl From<&DeviceConfig> for DeviceTableRow {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            name: device.name.clone(),
            description: device.description.clone(),
            link: device.link.kind().to_string(),
            serial: device.link.serial_number().to_string(),
        }
    }
}
