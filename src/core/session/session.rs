use crate::core::communication::{Message, MessageHistory, TransportType};
use crate::core::protocol::{OutboundCommand, TelemetryDisplay, TelemetryFrame};
use crate::core::session::state::{ConnectionState, SessionStatistics, SessionUpdate};
use crate::domain::config::FramePolicy;
use crate::domain::identity::{DeviceIdentity, TopicPair};
use serde::Serialize;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Everything bound to one connect attempt.
///
/// A controller builds a new `Session` for every accepted connect request,
/// so nothing from an earlier kit leaks into the next one.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    session_id: String,
    transport_type: TransportType,
    device: DeviceIdentity,
    topics: Option<TopicPair>,
    status: ConnectionState,
    subscribed: bool,
    created_at: SystemTime,
    last_activity: SystemTime,
    display: TelemetryDisplay,
    last_frame: Option<TelemetryFrame>,
    statistics: SessionStatistics,
    history: MessageHistory,
}

impl Session {
    /// New BLE session, already marked as connecting
    pub fn ble(device: DeviceIdentity, history_limit: usize) -> Self {
        Self::new(TransportType::Ble, device, None, history_limit)
    }

    /// New MQTT session, already marked as connecting
    pub fn mqtt(device: DeviceIdentity, topics: TopicPair, history_limit: usize) -> Self {
        Self::new(TransportType::Mqtt, device, Some(topics), history_limit)
    }

    fn new(
        transport_type: TransportType,
        device: DeviceIdentity,
        topics: Option<TopicPair>,
        history_limit: usize,
    ) -> Self {
        let now = SystemTime::now();
        let mut history = MessageHistory::new(history_limit);
        history.push(Message::system(format!("Connecting to {} over {}", device, transport_type)));

        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            transport_type,
            device,
            topics,
            status: ConnectionState::Connecting,
            subscribed: false,
            created_at: now,
            last_activity: now,
            display: TelemetryDisplay::placeholder(),
            last_frame: None,
            statistics: SessionStatistics::default(),
            history,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn topics(&self) -> Option<&TopicPair> {
        self.topics.as_ref()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn last_activity(&self) -> SystemTime {
        self.last_activity
    }

    pub fn display(&self) -> &TelemetryDisplay {
        &self.display
    }

    pub fn last_frame(&self) -> Option<&TelemetryFrame> {
        self.last_frame.as_ref()
    }

    pub fn statistics(&self) -> &SessionStatistics {
        &self.statistics
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Overwrite the link state with what the transport reported
    pub fn set_status(&mut self, status: ConnectionState) {
        self.status = status;
        if !status.is_connected() {
            self.subscribed = false;
        }
        self.touch();
        self.history.push(Message::system(format!("Link {}", status)));
    }

    pub fn mark_subscribed(&mut self, topic: &str) {
        self.subscribed = true;
        self.history.push(Message::system(format!("Subscribed to {}", topic)));
    }

    /// Whether an inbound MQTT message belongs to this session
    pub fn matches(&self, device_id: &str, topic: &str) -> bool {
        self.device.as_str() == device_id
            && self.topics.as_ref().is_some_and(|t| t.subscribe() == topic)
    }

    pub fn record_sent(&mut self, command: &OutboundCommand) {
        self.statistics.commands_sent += 1;
        self.touch();
        self.history.push(Message::sent(command.encode()));
    }

    pub fn record_dropped(&mut self, command: &OutboundCommand) {
        self.statistics.commands_dropped += 1;
        debug!("Dropped '{}': {} link is {}", command, self.transport_type, self.status);
    }

    pub fn record_error(&mut self, description: impl Into<String>) {
        self.history.push(Message::error(description));
    }

    /// Decode an inbound payload and update the display.
    pub fn apply_payload(&mut self, payload: &str, policy: FramePolicy) -> SessionUpdate {
        self.touch();
        self.history.push(Message::received(payload));

        match TelemetryFrame::decode(payload) {
            Ok(frame) => {
                self.statistics.frames_decoded += 1;
                self.display = TelemetryDisplay::from(&frame);
                self.last_frame = Some(frame.clone());
                SessionUpdate::Telemetry(frame)
            }
            Err(e) => {
                self.statistics.frames_rejected += 1;
                self.history.push(Message::error(e.to_string()));
                reject_frame(e.to_string(), policy)
            }
        }
    }

    fn touch(&mut self) {
        self.last_activity = SystemTime::now();
    }
}

/// Apply the frame policy to a decode failure
pub(crate) fn reject_frame(reason: String, policy: FramePolicy) -> SessionUpdate {
    match policy {
        FramePolicy::Report => {
            warn!("{}", reason);
            SessionUpdate::FrameRejected(reason)
        }
        FramePolicy::Discard => {
            debug!("Discarding frame: {}", reason);
            SessionUpdate::Ignored
        }
    }
}
