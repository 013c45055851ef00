use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for PHYSIs Link
#[derive(Parser, Debug)]
#[command(
    name = "physis",
    version = env!("CARGO_PKG_VERSION"),
    about = "BLE and MQTT client for PHYSIs maker kits",
    long_about = "Connects to a PHYSIs kit over BLE or through an MQTT broker, shows its sensing frames and sends digital/analog output commands. Sessions run against the built-in kit simulator."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode one sensing frame (`temperature,humidity,illuminance,button`)
    Decode {
        /// Frame text as sent by the kit
        #[arg(allow_hyphen_values = true)]
        payload: String,
    },
    /// Print the wire text of an output command
    Encode(EncodeArgs),
    /// Run a BLE session against the kit simulator
    Ble(BleArgs),
    /// Run an MQTT session against the kit simulator
    Mqtt(MqttArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Output command to encode
#[derive(ClapArgs, Debug)]
pub struct EncodeArgs {
    #[command(subcommand)]
    pub command: EncodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Drive the digital output HIGH
    Dh,
    /// Drive the digital output LOW
    Dl,
    /// Write an analog value
    Analog {
        /// Value text, sent verbatim
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

/// Options shared by both session commands
#[derive(ClapArgs, Debug)]
pub struct SessionOptions {
    /// Kit serial number (defaults to the simulated kit)
    #[arg(short, long)]
    pub serial: Option<String>,

    /// Use a kit from the configuration by name
    #[arg(short, long, conflicts_with = "serial")]
    pub device: Option<String>,

    /// Stop after this many frames
    #[arg(short, long, default_value = "5")]
    pub frames: usize,

    /// Command to send once connected (DH, DL or A<value>); repeatable
    #[arg(long = "send", value_name = "COMMAND")]
    pub send: Vec<String>,

    /// Give up after this many milliseconds without traffic
    #[arg(long, default_value = "3000")]
    pub idle_timeout_ms: u64,
}

/// BLE session arguments
#[derive(ClapArgs, Debug)]
pub struct BleArgs {
    #[command(flatten)]
    pub session: SessionOptions,
}

/// MQTT session arguments
#[derive(ClapArgs, Debug)]
pub struct MqttArgs {
    #[command(flatten)]
    pub session: SessionOptions,

    /// Monitoring topic to subscribe to
    #[arg(long)]
    pub subscribe: Option<String>,

    /// Control topic to publish commands on
    #[arg(long)]
    pub publish: Option<String>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Create default configuration
    Init {
        /// Directory to create `.physis/config.toml` in
        #[arg(long)]
        dir: Option<String>,
        /// Global configuration
        #[arg(short, long)]
        global: bool,
    },
    /// List kit configurations
    Devices,
}

impl Command {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::Decode { .. } => "decode",
            Command::Encode(_) => "encode",
            Command::Ble(_) => "ble",
            Command::Mqtt(_) => "mqtt",
            Command::Config(_) => "config",
            Command::Version => "version",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
