use crate::core::communication::{BleEvent, BleTransport, EventQueue};
use crate::core::protocol::{OutboundCommand, TelemetryFrame};
use crate::core::session::session::{reject_frame, Session};
use crate::core::session::state::{
    ConnectOutcome, ConnectionState, ControllerSettings, SendOutcome, SessionUpdate,
};
use crate::domain::error::{PhysisError, PhysisResult};
use crate::domain::identity::DeviceIdentity;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connection controller for a kit reached over BLE
pub struct BleController<T: BleTransport> {
    transport: T,
    events: EventQueue<BleEvent>,
    settings: ControllerSettings,
    session: Option<Session>,
    /// Last reported link state, kept even when no session is bound
    link: ConnectionState,
    disconnect_requested: bool,
    connect_deadline: Option<Instant>,
}

impl<T: BleTransport> BleController<T> {
    pub fn new(transport: T, events: EventQueue<BleEvent>, settings: ControllerSettings) -> Self {
        Self {
            transport,
            events,
            settings,
            session: None,
            link: ConnectionState::Disconnected,
            disconnect_requested: false,
            connect_deadline: None,
        }
    }

    /// Current link state; `Disconnected` before the first connect.
    pub fn state(&self) -> ConnectionState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask the transport to connect to `serial_number`.
    ///
    /// An empty serial number fails before the transport is touched. While a
    /// link is up this does nothing; otherwise a fresh session replaces the
    /// previous one.
    pub async fn request_connect(&mut self, serial_number: &str) -> PhysisResult<ConnectOutcome> {
        let device = DeviceIdentity::new(serial_number)?;

        if self.is_connected() {
            debug!("BLE link to {} already up", self.describe());
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let mut session = Session::ble(device, self.settings.history_limit);
        if let Err(e) = self.transport.connect(serial_number).await {
            session.set_status(ConnectionState::Disconnected);
            session.record_error(e.to_string());
            self.session = Some(session);
            self.link = ConnectionState::Disconnected;
            self.connect_deadline = None;
            return Err(PhysisError::TransportFailure(format!(
                "BLE connect to {} could not be issued: {}",
                serial_number, e
            )));
        }

        info!("BLE connect requested for {}", serial_number);
        self.session = Some(session);
        self.link = ConnectionState::Connecting;
        self.disconnect_requested = false;
        self.connect_deadline = self.settings.connect_timeout.map(|t| Instant::now() + t);
        Ok(ConnectOutcome::Requested)
    }

    /// Close the link if it is up. Returns whether a disconnect was issued.
    ///
    /// Only one disconnect is issued per link; repeats before the transport
    /// reports the result are no-ops.
    pub async fn request_disconnect(&mut self) -> PhysisResult<bool> {
        if !self.is_connected() {
            debug!("BLE disconnect ignored: link is {}", self.state());
            return Ok(false);
        }
        if self.disconnect_requested {
            debug!("BLE disconnect already requested for {}", self.describe());
            return Ok(false);
        }

        self.transport
            .disconnect()
            .await
            .map_err(|e| PhysisError::TransportFailure(format!("BLE disconnect failed: {}", e)))?;
        self.disconnect_requested = true;
        info!("BLE disconnect requested for {}", self.describe());
        Ok(true)
    }

    /// Send a command to the kit while the link is up.
    pub async fn send_command(&mut self, command: &OutboundCommand) -> PhysisResult<SendOutcome> {
        command.validate()?;

        let session = match self.session.as_mut() {
            Some(session) if session.status().is_connected() => session,
            Some(session) => {
                session.record_dropped(command);
                return Ok(SendOutcome::Dropped);
            }
            None => {
                debug!("Dropped '{}': no BLE session", command);
                return Ok(SendOutcome::Dropped);
            }
        };

        let payload = command.encode();
        if let Err(e) = self.transport.send(&payload).await {
            session.record_error(e.to_string());
            return Err(PhysisError::TransportFailure(format!(
                "BLE send of '{}' failed: {}",
                payload, e
            )));
        }
        session.record_sent(command);
        debug!("BLE sent '{}'", payload);
        Ok(SendOutcome::Sent)
    }

    /// Connection result callback. The state is overwritten with whatever
    /// the transport reported, with or without a bound session.
    pub fn on_connection_result(&mut self, code: i32) -> SessionUpdate {
        let state = ConnectionState::from_code(code);
        self.connect_deadline = None;
        self.link = state;
        if state.is_connected() {
            self.disconnect_requested = false;
        }

        let Some(session) = self.session.as_mut() else {
            warn!("BLE connection result {} with no session", code);
            return SessionUpdate::StateChanged(state);
        };

        session.set_status(state);
        match state {
            ConnectionState::Connected => {
                info!("BLE connection result ({}): connected to {}", code, session.device())
            }
            ConnectionState::Unknown(_) => {
                warn!("BLE connection result ({}): unrecognized code", code)
            }
            _ => info!("BLE connection result ({}): {}", code, state),
        }
        SessionUpdate::StateChanged(state)
    }

    /// Inbound message callback. Every BLE message is decoded.
    pub fn on_message(&mut self, payload: &str) -> SessionUpdate {
        let policy = self.settings.frame_policy;
        match self.session.as_mut() {
            Some(session) => session.apply_payload(payload, policy),
            None => match TelemetryFrame::decode(payload) {
                Ok(frame) => SessionUpdate::Telemetry(frame),
                Err(e) => reject_frame(e.to_string(), policy),
            },
        }
    }

    /// Route one transport callback
    pub fn dispatch(&mut self, event: BleEvent) -> SessionUpdate {
        match event {
            BleEvent::ConnectionResult(code) => self.on_connection_result(code),
            BleEvent::Message(payload) => self.on_message(&payload),
        }
    }

    /// Wait for the next callback and apply it.
    ///
    /// With a connect timeout configured, a pending connect that sees no
    /// result in time falls back to `Disconnected`. Returns `None` once the
    /// transport has dropped its event sender.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let event = match self.pending_deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(event) => event,
                Err(_) => return Some(self.expire_connect()),
            },
            None => self.events.recv().await,
        };
        event.map(|event| self.dispatch(event))
    }

    /// Apply every callback already delivered, without waiting
    pub fn drain_pending(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(event) = self.events.try_recv() {
            updates.push(self.dispatch(event));
        }
        updates
    }

    /// Tear the controller down, closing a live link exactly once.
    pub async fn shutdown(mut self) -> PhysisResult<()> {
        if self.is_connected() {
            self.request_disconnect().await?;
        }
        Ok(())
    }

    fn pending_deadline(&self) -> Option<Instant> {
        self.connect_deadline.filter(|_| self.state().is_pending())
    }

    fn expire_connect(&mut self) -> SessionUpdate {
        self.connect_deadline = None;
        self.link = ConnectionState::Disconnected;
        if let Some(session) = self.session.as_mut() {
            warn!("BLE connect to {} timed out", session.device());
            session.set_status(ConnectionState::Disconnected);
            session.record_error("connect timed out");
        }
        SessionUpdate::ConnectTimedOut
    }

    fn describe(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.device().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }
}
