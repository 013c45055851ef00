use crate::core::communication::event::{BLE_CONNECTED, BLE_DISCONNECTED, BLE_NO_DISCOVERY};
use crate::core::protocol::TelemetryFrame;
use crate::domain::config::{FramePolicy, GlobalConfig, SubscribePolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Link state as last reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link
    Disconnected,
    /// Connect requested, no result yet
    Connecting,
    /// Link established
    Connected,
    /// The kit was not found
    DiscoveryFailed,
    /// The transport reported a code outside the known set
    Unknown(i32),
}

impl ConnectionState {
    /// Map a BLE result code. Codes outside 200/201/202 are kept as `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            BLE_CONNECTED => ConnectionState::Connected,
            BLE_DISCONNECTED => ConnectionState::Disconnected,
            BLE_NO_DISCOVERY => ConnectionState::DiscoveryFailed,
            other => ConnectionState::Unknown(other),
        }
    }

    /// BLE result code for this state, when it has one
    pub fn code(&self) -> Option<i32> {
        match self {
            ConnectionState::Connected => Some(BLE_CONNECTED),
            ConnectionState::Disconnected => Some(BLE_DISCONNECTED),
            ConnectionState::DiscoveryFailed => Some(BLE_NO_DISCOVERY),
            ConnectionState::Unknown(code) => Some(*code),
            ConnectionState::Connecting => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether a connect request is still waiting for its result
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::DiscoveryFailed => write!(f, "Discovery failed"),
            ConnectionState::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Frames decoded and displayed
    pub frames_decoded: u64,
    /// Frames that did not carry four fields
    pub frames_rejected: u64,
    /// Commands handed to the transport
    pub commands_sent: u64,
    /// Commands dropped because the link was down
    pub commands_dropped: u64,
}

/// What a controller did with a user action or transport callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionUpdate {
    /// The transport reported a new link state
    StateChanged(ConnectionState),
    /// A frame was decoded
    Telemetry(TelemetryFrame),
    /// A frame was rejected; carries the reason
    FrameRejected(String),
    /// The event did not concern the bound session, or was discarded
    Ignored,
    /// A pending connect gave up waiting for its result
    ConnectTimedOut,
}

/// Outcome of a connect request that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The transport was asked to connect
    Requested,
    /// A link is already up; nothing was done
    AlreadyConnected,
}

/// Outcome of a command that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport
    Sent,
    /// Link down; silently dropped
    Dropped,
}

/// Controller behaviour knobs, taken from the global configuration
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub frame_policy: FramePolicy,
    pub subscribe_policy: SubscribePolicy,
    pub connect_timeout: Option<Duration>,
    pub history_limit: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for ControllerSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            frame_policy: config.frame_policy,
            subscribe_policy: config.subscribe_policy,
            connect_timeout: match config.connect_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            history_limit: config.history_limit,
        }
    }
}
