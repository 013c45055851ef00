use crate::core::communication::{EventQueue, MqttEvent, MqttTransport};
use crate::core::protocol::OutboundCommand;
use crate::core::session::session::Session;
use crate::core::session::state::{
    ConnectOutcome, ConnectionState, ControllerSettings, SendOutcome, SessionUpdate,
};
use crate::domain::config::SubscribePolicy;
use crate::domain::error::{PhysisError, PhysisResult};
use crate::domain::identity::{DeviceIdentity, TopicPair};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connection controller for a kit reached through an MQTT broker
pub struct MqttController<T: MqttTransport> {
    transport: T,
    events: EventQueue<MqttEvent>,
    settings: ControllerSettings,
    session: Option<Session>,
    disconnect_requested: bool,
    connect_deadline: Option<Instant>,
}

impl<T: MqttTransport> MqttController<T> {
    pub fn new(transport: T, events: EventQueue<MqttEvent>, settings: ControllerSettings) -> Self {
        Self {
            transport,
            events,
            settings,
            session: None,
            disconnect_requested: false,
            connect_deadline: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(Session::status)
            .unwrap_or(ConnectionState::Disconnected)
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

    /// Bind a kit and its topics, then ask the broker transport to connect.
    ///
    /// Fields are checked in order (serial number, subscribe topic, publish
    /// topic) and the first empty one aborts the request.
    pub async fn request_connect(
        &mut self,
        serial_number: &str,
        subscribe_topic: &str,
        publish_topic: &str,
    ) -> PhysisResult<ConnectOutcome> {
        let device = DeviceIdentity::new(serial_number)?;
        let topics = TopicPair::new(subscribe_topic, publish_topic)?;

        if self.is_connected() {
            debug!("MQTT session already up; keeping current binding");
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let mut session = Session::mqtt(device, topics, self.settings.history_limit);
        if let Err(e) = self.transport.connect().await {
            session.set_status(ConnectionState::Disconnected);
            session.record_error(e.to_string());
            self.session = Some(session);
            self.connect_deadline = None;
            return Err(PhysisError::TransportFailure(format!(
                "MQTT connect could not be issued: {}",
                e
            )));
        }

        info!(
            "MQTT connect requested for {} (monitor '{}', control '{}')",
            serial_number, subscribe_topic, publish_topic
        );
        self.session = Some(session);
        self.disconnect_requested = false;
        self.connect_deadline = self.settings.connect_timeout.map(|t| Instant::now() + t);
        Ok(ConnectOutcome::Requested)
    }

    /// Close the broker session if it is up. Returns whether a disconnect
    /// was issued.
    pub async fn request_disconnect(&mut self) -> PhysisResult<bool> {
        if !self.is_connected() {
            debug!("MQTT disconnect ignored: link is {}", self.state());
            return Ok(false);
        }
        if self.disconnect_requested {
            debug!("MQTT disconnect already requested");
            return Ok(false);
        }

        self.transport
            .disconnect()
            .await
            .map_err(|e| PhysisError::TransportFailure(format!("MQTT disconnect failed: {}", e)))?;
        self.disconnect_requested = true;
        info!("MQTT disconnect requested");
        Ok(true)
    }

    /// Publish a command on the bound control topic. Dropped silently while
    /// the broker session is down.
    pub async fn publish_command(&mut self, command: &OutboundCommand) -> PhysisResult<SendOutcome> {
        command.validate()?;

        let session = match self.session.as_mut() {
            Some(session) if session.status().is_connected() => session,
            Some(session) => {
                session.record_dropped(command);
                return Ok(SendOutcome::Dropped);
            }
            None => {
                debug!("Dropped '{}': no MQTT session", command);
                return Ok(SendOutcome::Dropped);
            }
        };

        let payload = command.encode();
        let device_id = session.device().as_str().to_string();
        let topic = match session.topics() {
            Some(topics) => topics.publish().to_string(),
            None => return Err(PhysisError::TransportFailure("MQTT session has no topics".to_string())),
        };

        if let Err(e) = self.transport.publish(&device_id, &topic, &payload).await {
            session.record_error(e.to_string());
            return Err(PhysisError::TransportFailure(format!(
                "MQTT publish of '{}' to '{}' failed: {}",
                payload, topic, e
            )));
        }
        session.record_sent(command);
        debug!("MQTT published '{}' to '{}'", payload, topic);
        Ok(SendOutcome::Sent)
    }

    /// Broker connection result. Success starts the subscription on the
    /// bound monitoring topic.
    pub async fn on_connection_result(&mut self, success: bool) -> PhysisResult<SessionUpdate> {
        self.connect_deadline = None;
        let policy = self.settings.subscribe_policy;

        let Some(session) = self.session.as_mut() else {
            warn!("MQTT connection result {} with no session", success);
            return Ok(SessionUpdate::Ignored);
        };

        if !success {
            info!("MQTT connection result: false");
            session.set_status(ConnectionState::Disconnected);
            return Ok(SessionUpdate::StateChanged(ConnectionState::Disconnected));
        }

        let already_subscribed = session.is_subscribed();
        session.set_status(ConnectionState::Connected);
        self.disconnect_requested = false;
        info!("MQTT connection result: true");

        if already_subscribed && policy == SubscribePolicy::Guarded {
            debug!("Subscription already active; not subscribing again");
            return Ok(SessionUpdate::StateChanged(ConnectionState::Connected));
        }

        let device_id = session.device().as_str().to_string();
        let topic = match session.topics() {
            Some(topics) => topics.subscribe().to_string(),
            None => return Err(PhysisError::TransportFailure("MQTT session has no topics".to_string())),
        };

        if let Err(e) = self.transport.subscribe(&device_id, &topic).await {
            session.record_error(e.to_string());
            return Err(PhysisError::TransportFailure(format!(
                "MQTT subscribe to '{}' failed: {}",
                topic, e
            )));
        }
        session.mark_subscribed(&topic);
        info!("Subscribed to '{}' for {}", topic, device_id);
        Ok(SessionUpdate::StateChanged(ConnectionState::Connected))
    }

    /// Broker session ended, whoever closed it.
    pub fn on_disconnected(&mut self) -> SessionUpdate {
        match self.session.as_mut() {
            Some(session) => {
                info!("MQTT session for {} closed", session.device());
                session.set_status(ConnectionState::Disconnected);
                SessionUpdate::StateChanged(ConnectionState::Disconnected)
            }
            None => SessionUpdate::Ignored,
        }
    }

    /// Message on a subscribed topic. Only the bound kit and monitoring
    /// topic are decoded; anything else is ignored untouched.
    pub fn on_subscribe_message(&mut self, device_id: &str, topic: &str, payload: &str) -> SessionUpdate {
        let policy = self.settings.frame_policy;
        match self.session.as_mut() {
            Some(session) if session.matches(device_id, topic) => {
                session.apply_payload(payload, policy)
            }
            _ => {
                debug!("Ignoring message from {} on '{}'", device_id, topic);
                SessionUpdate::Ignored
            }
        }
    }

    /// Route one transport callback
    pub async fn dispatch(&mut self, event: MqttEvent) -> PhysisResult<SessionUpdate> {
        match event {
            MqttEvent::ConnectionResult(success) => self.on_connection_result(success).await,
            MqttEvent::Disconnected => Ok(self.on_disconnected()),
            MqttEvent::SubscribeMessage {
                device_id,
                topic,
                payload,
            } => Ok(self.on_subscribe_message(&device_id, &topic, &payload)),
        }
    }

    /// Wait for the next callback and apply it. See
    /// [`BleController::next_update`](super::ble::BleController::next_update).
    pub async fn next_update(&mut self) -> Option<PhysisResult<SessionUpdate>> {
        let event = match self.pending_deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(event) => event,
                Err(_) => return Some(Ok(self.expire_connect())),
            },
            None => self.events.recv().await,
        };
        match event {
            Some(event) => Some(self.dispatch(event).await),
            None => None,
        }
    }

    /// Apply every callback already delivered, without waiting
    pub async fn drain_pending(&mut self) -> Vec<PhysisResult<SessionUpdate>> {
        let mut updates = Vec::new();
        while let Some(event) = self.events.try_recv() {
            updates.push(self.dispatch(event).await);
        }
        updates
    }

    /// Tear the controller down, closing a live session exactly once.
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
        if let Some(session) = self.session.as_mut() {
            warn!("MQTT connect for {} timed out", session.device());
            session.set_status(ConnectionState::Disconnected);
            session.record_error("connect timed out");
        }
        SessionUpdate::ConnectTimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::{event_channel, EventSender};
    use crate::core::protocol::ButtonState;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Connect,
        Disconnect,
        Subscribe(String, String),
        Publish(String, String, String),
    }

    #[derive(Default, Clone)]
    struct MockMqtt {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl MockMqtt {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn subscriptions(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Subscribe(..)))
                .count()
        }
    }

    #[async_trait]
    impl MqttTransport for MockMqtt {
        async fn connect(&self) -> PhysisResult<()> {
            self.calls.lock().unwrap().push(Call::Connect);
            Ok(())
        }

        async fn disconnect(&self) -> PhysisResult<()> {
            self.calls.lock().unwrap().push(Call::Disconnect);
            Ok(())
        }

        async fn subscribe(&self, device_id: &str, topic: &str) -> PhysisResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Subscribe(device_id.to_string(), topic.to_string()));
            Ok(())
        }

        async fn publish(&self, device_id: &str, topic: &str, payload: &str) -> PhysisResult<()> {
            self.calls.lock().unwrap().push(Call::Publish(
                device_id.to_string(),
                topic.to_string(),
                payload.to_string(),
            ));
            Ok(())
        }
    }

    fn controller_with(
        settings: ControllerSettings,
    ) -> (MqttController<MockMqtt>, MockMqtt, EventSender<MqttEvent>) {
        let mock = MockMqtt::default();
        let (sender, queue) = event_channel();
        (MqttController::new(mock.clone(), queue, settings), mock, sender)
    }

    fn controller() -> (MqttController<MockMqtt>, MockMqtt, EventSender<MqttEvent>) {
        controller_with(ControllerSettings::default())
    }

    async fn connected() -> (MqttController<MockMqtt>, MockMqtt, EventSender<MqttEvent>) {
        let (mut ctrl, mock, events) = controller();
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();
        ctrl.on_connection_result(true).await.unwrap();
        (ctrl, mock, events)
    }

    #[tokio::test]
    async fn test_validation_order() {
        let (mut ctrl, mock, _events) = controller();

        let err = ctrl.request_connect("", "", "").await.unwrap_err();
        assert!(err.to_string().contains("serial number"));

        let err = ctrl.request_connect("KIT1", "", "").await.unwrap_err();
        assert!(err.to_string().contains("subscribe topic"));

        let err = ctrl.request_connect("KIT1", "kit/monitor", "").await.unwrap_err();
        assert!(err.to_string().contains("publish topic"));

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_success_subscribes_bound_pair() {
        let (ctrl, mock, _events) = connected().await;

        assert!(ctrl.is_connected());
        assert_eq!(
            mock.calls(),
            vec![
                Call::Connect,
                Call::Subscribe("KIT1".to_string(), "kit/monitor".to_string()),
            ]
        );
        assert!(ctrl.session().unwrap().is_subscribed());
    }

    #[tokio::test]
    async fn test_repeated_success_subscribes_once() {
        let (mut ctrl, mock, _events) = connected().await;
        ctrl.on_connection_result(true).await.unwrap();
        ctrl.on_connection_result(true).await.unwrap();
        assert_eq!(mock.subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_fresh_connect_cycle_subscribes_again() {
        let (mut ctrl, mock, _events) = connected().await;
        ctrl.request_disconnect().await.unwrap();
        ctrl.on_disconnected();

        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();
        ctrl.on_connection_result(true).await.unwrap();
        assert_eq!(mock.subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_always_policy_resubscribes() {
        let settings = ControllerSettings {
            subscribe_policy: SubscribePolicy::Always,
            ..ControllerSettings::default()
        };
        let (mut ctrl, mock, _events) = controller_with(settings);
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();
        ctrl.on_connection_result(true).await.unwrap();
        ctrl.on_connection_result(true).await.unwrap();
        assert_eq!(mock.subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_failed_result_does_not_subscribe() {
        let (mut ctrl, mock, _events) = controller();
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();

        let update = ctrl.on_connection_result(false).await.unwrap();
        assert_eq!(update, SessionUpdate::StateChanged(ConnectionState::Disconnected));
        assert_eq!(mock.subscriptions(), 0);
        assert!(!ctrl.request_disconnect().await.unwrap());
    }

    #[tokio::test]
    async fn test_mismatched_messages_ignored() {
        let (mut ctrl, _mock, _events) = connected().await;
        let before = ctrl.session().unwrap().statistics().clone();
        let history_before = ctrl.session().unwrap().history().len();

        assert_eq!(
            ctrl.on_subscribe_message("KIT2", "kit/monitor", "1,2,3,1"),
            SessionUpdate::Ignored
        );
        assert_eq!(
            ctrl.on_subscribe_message("KIT1", "other/topic", "1,2,3,1"),
            SessionUpdate::Ignored
        );

        let session = ctrl.session().unwrap();
        assert_eq!(session.statistics(), &before);
        assert_eq!(session.history().len(), history_before);
        assert!(session.last_frame().is_none());
    }

    #[tokio::test]
    async fn test_matching_message_decoded() {
        let (mut ctrl, _mock, _events) = connected().await;

        match ctrl.on_subscribe_message("KIT1", "kit/monitor", "23,55,140,1") {
            SessionUpdate::Telemetry(frame) => {
                assert_eq!(frame.temperature, "23");
                assert_eq!(frame.button, ButtonState::Pressed);
            }
            other => panic!("unexpected update {:?}", other),
        }
        assert_eq!(ctrl.session().unwrap().display().humidity, "55 %");
    }

    #[tokio::test]
    async fn test_publish_guarded_by_connection() {
        let (mut ctrl, mock, _events) = controller();
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();
        assert_eq!(
            ctrl.publish_command(&OutboundCommand::DigitalHigh).await.unwrap(),
            SendOutcome::Dropped
        );

        ctrl.on_connection_result(true).await.unwrap();
        assert_eq!(
            ctrl.publish_command(&OutboundCommand::analog("128")).await.unwrap(),
            SendOutcome::Sent
        );
        assert_eq!(
            mock.calls().last(),
            Some(&Call::Publish(
                "KIT1".to_string(),
                "kit/control".to_string(),
                "A128".to_string()
            ))
        );

        ctrl.on_disconnected();
        assert_eq!(
            ctrl.publish_command(&OutboundCommand::DigitalLow).await.unwrap(),
            SendOutcome::Dropped
        );
    }

    #[tokio::test]
    async fn test_disconnected_callback_clears_flag() {
        let (mut ctrl, mock, _events) = connected().await;
        assert!(ctrl.request_disconnect().await.unwrap());
        assert!(ctrl.is_connected(), "state waits for the callback");

        ctrl.on_disconnected();
        assert!(!ctrl.is_connected());
        assert!(!ctrl.request_disconnect().await.unwrap());
        assert_eq!(
            mock.calls().iter().filter(|c| **c == Call::Disconnect).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_connect_while_connected_keeps_binding() {
        let (mut ctrl, mock, _events) = connected().await;
        let outcome = ctrl.request_connect("KIT9", "x", "y").await.unwrap();
        assert_eq!(outcome, ConnectOutcome::AlreadyConnected);
        assert_eq!(ctrl.session().unwrap().device().as_str(), "KIT1");
        assert_eq!(mock.calls().iter().filter(|c| **c == Call::Connect).count(), 1);
    }

    #[tokio::test]
    async fn test_queue_dispatch() {
        let (mut ctrl, mock, events) = controller();
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();

        events.emit(MqttEvent::ConnectionResult(true));
        events.emit(MqttEvent::SubscribeMessage {
            device_id: "KIT1".to_string(),
            topic: "kit/monitor".to_string(),
            payload: "20,40,90,0".to_string(),
        });
        events.emit(MqttEvent::Disconnected);

        let updates: Vec<SessionUpdate> = ctrl
            .drain_pending()
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], SessionUpdate::StateChanged(ConnectionState::Connected));
        assert!(matches!(updates[1], SessionUpdate::Telemetry(_)));
        assert_eq!(updates[2], SessionUpdate::StateChanged(ConnectionState::Disconnected));
        assert_eq!(mock.subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_repeated_disconnect_before_callback_issued_once() {
        let (mut ctrl, mock, _events) = connected().await;

        assert!(ctrl.request_disconnect().await.unwrap());
        assert!(!ctrl.request_disconnect().await.unwrap());
        ctrl.shutdown().await.unwrap();

        let disconnects = mock.calls().iter().filter(|c| **c == Call::Disconnect).count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn test_shutdown_only_when_connected() {
        let (ctrl, mock, _events) = connected().await;
        ctrl.shutdown().await.unwrap();
        assert_eq!(mock.calls().last(), Some(&Call::Disconnect));

        let (ctrl, mock, _events) = controller();
        ctrl.shutdown().await.unwrap();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let settings = ControllerSettings {
            connect_timeout: Some(Duration::from_millis(250)),
            ..ControllerSettings::default()
        };
        let (mut ctrl, _mock, _events) = controller_with(settings);
        ctrl.request_connect("KIT1", "kit/monitor", "kit/control").await.unwrap();

        let update = ctrl.next_update().await.unwrap().unwrap();
        assert_eq!(update, SessionUpdate::ConnectTimedOut);
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);
    }
}
