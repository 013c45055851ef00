use serde::{Deserialize, Serialize};

/// PHYSIs Link configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysisConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Kit simulator settings
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Known kits
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-session traffic history limit
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Give up on a pending connect after this long (0 = wait forever)
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// What to do with frames that do not carry four fields
    #[serde(default)]
    pub frame_policy: FramePolicy,
    /// Whether repeated MQTT connection successes subscribe again
    #[serde(default)]
    pub subscribe_policy: SubscribePolicy,
}

/// Handling of malformed telemetry frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    /// Surface the rejected frame to the caller and log a warning
    #[default]
    Report,
    /// Drop the frame quietly
    Discard,
}

/// Subscription behaviour on MQTT connection success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribePolicy {
    /// Subscribe once per connect cycle
    #[default]
    Guarded,
    /// Subscribe on every success callback
    Always,
}

/// Kit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Kit name
    pub name: String,
    /// Kit description
    #[serde(default)]
    pub description: String,
    /// Link type
    pub link: LinkConfig,
}

/// Link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LinkConfig {
    #[serde(rename = "ble")]
    Ble { serial_number: String },
    #[serde(rename = "mqtt")]
    Mqtt {
        serial_number: String,
        subscribe_topic: String,
        publish_topic: String,
    },
}

impl LinkConfig {
    pub fn serial_number(&self) -> &str {
        match self {
            LinkConfig::Ble { serial_number } => serial_number,
            LinkConfig::Mqtt { serial_number, .. } => serial_number,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LinkConfig::Ble { .. } => "ble",
            LinkConfig::Mqtt { .. } => "mqtt",
        }
    }
}

/// Simulated kit behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Serial number the simulated kit answers to
    #[serde(default = "default_simulated_serial")]
    pub serial_number: String,
    /// Topic the simulated kit publishes frames on
    #[serde(default = "default_monitor_topic")]
    pub monitor_topic: String,
    /// Topic the simulated kit takes commands from
    #[serde(default = "default_control_topic")]
    pub control_topic: String,
    /// Delay before the connection result is reported
    #[serde(default = "default_connect_delay")]
    pub connect_delay_ms: u64,
    /// Interval between telemetry frames
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_history_limit() -> usize {
    1000
}

fn default_simulated_serial() -> String {
    "PHYSIS-SIM".to_string()
}

fn default_monitor_topic() -> String {
    "physis/monitor".to_string()
}

fn default_control_topic() -> String {
    "physis/control".to_string()
}

fn default_connect_delay() -> u64 {
    50
}

fn default_frame_interval() -> u64 {
    200
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            history_limit: default_history_limit(),
            connect_timeout_ms: 0,
            frame_policy: FramePolicy::default(),
            subscribe_policy: SubscribePolicy::default(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            serial_number: default_simulated_serial(),
            monitor_topic: default_monitor_topic(),
            control_topic: default_control_topic(),
            connect_delay_ms: default_connect_delay(),
            frame_interval_ms: default_frame_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = PhysisConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let _deserialized: PhysisConfig = toml::from_str(&toml_str).unwrap();
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: PhysisConfig = toml::from_str("").unwrap();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.connect_timeout_ms, 0);
        assert_eq!(config.global.frame_policy, FramePolicy::Report);
        assert_eq!(config.global.subscribe_policy, SubscribePolicy::Guarded);
        assert_eq!(config.simulator.serial_number, "PHYSIS-SIM");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_mqtt_device_config() {
        let toml_str = r#"
            [global]
            subscribe_policy = "always"
            frame_policy = "discard"

            [[devices]]
            name = "greenhouse"
            link = { type = "mqtt", serial_number = "KIT7", subscribe_topic = "gh/sense", publish_topic = "gh/ctrl" }
        "#;

        let config: PhysisConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.global.subscribe_policy, SubscribePolicy::Always);
        assert_eq!(config.global.frame_policy, FramePolicy::Discard);
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].link.kind(), "mqtt");
        assert_eq!(config.devices[0].link.serial_number(), "KIT7");
    }

    #[test]
    fn test_ble_device_round_trip() {
        let config = PhysisConfig {
            devices: vec![DeviceConfig {
                name: "desk".to_string(),
                description: "Desk kit".to_string(),
                link: LinkConfig::Ble {
                    serial_number: "KIT1".to_string(),
                },
            }],
            ..PhysisConfig::default()
        };

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: PhysisConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.devices[0].link, config.devices[0].link);
    }
}
