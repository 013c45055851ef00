use crate::cli::args::{
    Args, BleArgs, Command, ConfigCommand, EncodeCommand, MqttArgs, SessionOptions,
};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::protocol::{OutboundCommand, TelemetryFrame};
use crate::core::session::{
    BleController, ConnectionState, ControllerSettings, MqttController, SendOutcome, SessionUpdate,
};
use crate::core::communication::event_channel;
use crate::domain::config::{DeviceConfig, LinkConfig, PhysisConfig};
use crate::domain::error::{PhysisError, PhysisResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::simulator::{SimulatedBleKit, SimulatedMqttKit};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Execute CLI command
pub async fn execute_command(args: Args) -> PhysisResult<()> {
    let writer = if args.quiet {
        ConsoleWriter::quiet(args.output)
    } else {
        ConsoleWriter::new(args.output)
    };

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    // Initialize logging
    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        Command::Decode { payload } => {
            let frame = TelemetryFrame::decode(&payload)?;
            writer.write_telemetry(&frame)?;
            Ok(())
        }
        Command::Encode(encode_args) => {
            let command = match encode_args.command {
                EncodeCommand::Dh => OutboundCommand::DigitalHigh,
                EncodeCommand::Dl => OutboundCommand::DigitalLow,
                EncodeCommand::Analog { value } => OutboundCommand::analog(value),
            };
            command.validate()?;
            writer.write_message(&command.encode())?;
            Ok(())
        }
        Command::Ble(ble_args) => run_ble_session(ble_args, &writer, &config).await,
        Command::Mqtt(mqtt_args) => run_mqtt_session(mqtt_args, &writer, &config).await,
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("physis {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// What the session loop should do after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Connected,
    Stop,
}

/// Prints updates and decides when a session run is over
struct Monitor<'a> {
    writer: &'a ConsoleWriter,
    frames_wanted: usize,
    frames_seen: usize,
    connected: bool,
    last_state: ConnectionState,
}

impl<'a> Monitor<'a> {
    fn new(writer: &'a ConsoleWriter, frames_wanted: usize) -> Self {
        Self {
            writer,
            frames_wanted,
            frames_seen: 0,
            connected: false,
            last_state: ConnectionState::Connecting,
        }
    }

    fn done(&self) -> bool {
        self.frames_seen >= self.frames_wanted
    }

    fn handle(&mut self, update: SessionUpdate) -> PhysisResult<Flow> {
        match update {
            SessionUpdate::StateChanged(state) => {
                self.last_state = state;
                self.writer.write_state(state)?;
                if state.is_connected() {
                    if self.connected {
                        return Ok(Flow::Continue);
                    }
                    self.connected = true;
                    Ok(Flow::Connected)
                } else if state.is_pending() {
                    Ok(Flow::Continue)
                } else {
                    Ok(Flow::Stop)
                }
            }
            SessionUpdate::Telemetry(frame) => {
                self.writer.write_telemetry(&frame)?;
                self.frames_seen += 1;
                Ok(if self.done() { Flow::Stop } else { Flow::Continue })
            }
            SessionUpdate::FrameRejected(reason) => {
                self.writer.write_error(&reason)?;
                Ok(Flow::Continue)
            }
            SessionUpdate::Ignored => Ok(Flow::Continue),
            SessionUpdate::ConnectTimedOut => {
                self.last_state = ConnectionState::Disconnected;
                self.writer.write_error("Connect timed out")?;
                Ok(Flow::Stop)
            }
        }
    }

    /// Error for a run that never reached the kit
    fn failure(&self, serial_number: &str) -> Option<PhysisError> {
        if self.connected {
            return None;
        }
        Some(PhysisError::TransportFailure(match self.last_state {
            ConnectionState::DiscoveryFailed => format!("Kit {} was not found", serial_number),
            state => format!("Could not connect to {}: {}", serial_number, state),
        }))
    }
}

async fn run_ble_session(
    args: BleArgs,
    writer: &ConsoleWriter,
    config: &PhysisConfig,
) -> PhysisResult<()> {
    let options = args.session;
    let commands = parse_commands(&options.send)?;

    let serial_number = match find_device(config, options.device.as_deref())? {
        Some(device) => match &device.link {
            LinkConfig::Ble { serial_number } => serial_number.clone(),
            LinkConfig::Mqtt { .. } => {
                return Err(PhysisError::InvalidInput(format!(
                    "Device '{}' is configured for MQTT",
                    device.name
                )))
            }
        },
        None => options
            .serial
            .clone()
            .unwrap_or_else(|| config.simulator.serial_number.clone()),
    };

    let (sender, queue) = event_channel();
    let kit = SimulatedBleKit::new(config.simulator.clone(), sender);
    let mut controller = BleController::new(kit, queue, ControllerSettings::from(&config.global));

    controller.request_connect(&serial_number).await?;
    writer.write_message(&format!("Connecting to {} over BLE", serial_number))?;

    let idle = idle_timeout(config, &options);
    let mut monitor = Monitor::new(writer, options.frames);
    while let Some(update) = next_or_idle(idle, controller.next_update()).await {
        match monitor.handle(update)? {
            Flow::Continue => {}
            Flow::Connected => {
                for command in &commands {
                    let outcome = controller.send_command(command).await?;
                    report_send(writer, command, outcome)?;
                }
                if monitor.done() {
                    break;
                }
            }
            Flow::Stop => break,
        }
    }

    controller.request_disconnect().await?;
    for update in controller.drain_pending() {
        if let SessionUpdate::StateChanged(state) = update {
            writer.write_state(state)?;
        }
    }

    if let Some(session) = controller.session() {
        writer.write_session(session)?;
    }
    controller.shutdown().await?;

    match monitor.failure(&serial_number) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn run_mqtt_session(
    args: MqttArgs,
    writer: &ConsoleWriter,
    config: &PhysisConfig,
) -> PhysisResult<()> {
    let options = args.session;
    let commands = parse_commands(&options.send)?;

    let (serial_number, subscribe_topic, publish_topic) =
        match find_device(config, options.device.as_deref())? {
            Some(device) => match &device.link {
                LinkConfig::Mqtt {
                    serial_number,
                    subscribe_topic,
                    publish_topic,
                } => (
                    serial_number.clone(),
                    args.subscribe.clone().unwrap_or_else(|| subscribe_topic.clone()),
                    args.publish.clone().unwrap_or_else(|| publish_topic.clone()),
                ),
                LinkConfig::Ble { .. } => {
                    return Err(PhysisError::InvalidInput(format!(
                        "Device '{}' is configured for BLE",
                        device.name
                    )))
                }
            },
            None => (
                options
                    .serial
                    .clone()
                    .unwrap_or_else(|| config.simulator.serial_number.clone()),
                args.subscribe
                    .clone()
                    .unwrap_or_else(|| config.simulator.monitor_topic.clone()),
                args.publish
                    .clone()
                    .unwrap_or_else(|| config.simulator.control_topic.clone()),
            ),
        };

    let (sender, queue) = event_channel();
    let kit = SimulatedMqttKit::new(config.simulator.clone(), sender);
    let mut controller = MqttController::new(kit, queue, ControllerSettings::from(&config.global));

    controller
        .request_connect(&serial_number, &subscribe_topic, &publish_topic)
        .await?;
    writer.write_message(&format!(
        "Connecting to {} through the broker (monitor '{}', control '{}')",
        serial_number, subscribe_topic, publish_topic
    ))?;

    let idle = idle_timeout(config, &options);
    let mut monitor = Monitor::new(writer, options.frames);
    while let Some(update) = next_or_idle(idle, controller.next_update()).await {
        match monitor.handle(update?)? {
            Flow::Continue => {}
            Flow::Connected => {
                for command in &commands {
                    let outcome = controller.publish_command(command).await?;
                    report_send(writer, command, outcome)?;
                }
                if monitor.done() {
                    break;
                }
            }
            Flow::Stop => break,
        }
    }

    controller.request_disconnect().await?;
    for update in controller.drain_pending().await {
        if let SessionUpdate::StateChanged(state) = update? {
            writer.write_state(state)?;
        }
    }

    if let Some(session) = controller.session() {
        writer.write_session(session)?;
    }
    controller.shutdown().await?;

    match monitor.failure(&serial_number) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Longest quiet stretch tolerated before a session run gives up
fn idle_timeout(config: &PhysisConfig, options: &SessionOptions) -> Duration {
    let floor = config.simulator.connect_delay_ms.max(config.simulator.frame_interval_ms) * 5;
    Duration::from_millis(options.idle_timeout_ms.max(floor))
}

/// Next controller update, or `None` when the link stays quiet too long
async fn next_or_idle<U, F>(idle: Duration, next: F) -> Option<U>
where
    F: Future<Output = Option<U>>,
{
    match tokio::time::timeout(idle, next).await {
        Ok(update) => update,
        Err(_) => {
            debug!("No traffic for {:?}; ending session", idle);
            None
        }
    }
}

fn parse_commands(texts: &[String]) -> PhysisResult<Vec<OutboundCommand>> {
    texts.iter().map(|text| OutboundCommand::parse(text)).collect()
}

fn report_send(writer: &ConsoleWriter, command: &OutboundCommand, outcome: SendOutcome) -> PhysisResult<()> {
    match outcome {
        SendOutcome::Sent => writer.write_message(&format!("Sent {}", command.encode()))?,
        SendOutcome::Dropped => writer.write_error(&format!("Dropped {}: link is down", command.encode()))?,
    }
    Ok(())
}

fn find_device<'a>(config: &'a PhysisConfig, name: Option<&str>) -> PhysisResult<Option<&'a DeviceConfig>> {
    let Some(name) = name else {
        return Ok(None);
    };
    config
        .devices
        .iter()
        .find(|device| device.name == name)
        .map(Some)
        .ok_or_else(|| PhysisError::InvalidInput(format!("No device named '{}' in configuration", name)))
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &PhysisConfig,
    config_manager: &ConfigManager,
) -> PhysisResult<()> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let result = match &file {
                Some(config_path) => config_manager.load_config_from_path(config_path.as_ref()),
                None => config_manager.load_config(),
            };
            match (result, file) {
                (Ok(_), Some(config_path)) => {
                    writer.write_message(&format!("Configuration file '{}' is valid", config_path))?
                }
                (Ok(_), None) => writer.write_message("Current configuration is valid")?,
                (Err(e), _) => {
                    writer.write_error(&format!("Configuration validation failed: {}", e))?;
                    return Err(e);
                }
            }
            Ok(())
        }
        ConfigCommand::Init { dir, global } => {
            if global {
                let global_path = config_manager.get_global_config_path_ref();
                config_manager.save_config_to_path(global_path, &PhysisConfig::default())?;
                writer.write_message(&format!("Global configuration initialized at '{}'", global_path.display()))?;
            } else {
                let base: PathBuf = match dir {
                    Some(dir) => dir.into(),
                    None => std::env::current_dir()?,
                };
                let config_file = config_manager.init_project_config(&base)?;
                writer.write_message(&format!("Project configuration initialized at '{}'", config_file.display()))?;
            }
            Ok(())
        }
        ConfigCommand::Devices => {
            writer.write_devices(&config.devices)?;
            Ok(())
        }
    }
}
