use physis_link::core::communication::event_channel;
use physis_link::core::session::ControllerSettings;
use physis_link::domain::config::SimulatorConfig;
use physis_link::infrastructure::simulator::{SimulatedBleKit, SimulatedMqttKit};
use physis_link::{
    BleController, ButtonState, ConnectionState, MqttController, OutboundCommand, PhysisConfig,
    SessionUpdate, TelemetryFrame,
};
use std::time::Duration;

/// End-to-end tests against the kit simulator
#[cfg(test)]
mod integration_tests {
    use super::*;

    fn simulator() -> SimulatorConfig {
        SimulatorConfig {
            serial_number: "KIT-42".to_string(),
            connect_delay_ms: 20,
            frame_interval_ms: 50,
            ..SimulatorConfig::default()
        }
    }

    async fn next_frame_ble<T>(controller: &mut BleController<T>) -> TelemetryFrame
    where
        T: physis_link::core::communication::BleTransport,
    {
        loop {
            match controller.next_update().await {
                Some(SessionUpdate::Telemetry(frame)) => return frame,
                Some(_) => continue,
                None => panic!("event queue closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ble_session_lifecycle() {
        let (sender, queue) = event_channel();
        let kit = SimulatedBleKit::new(simulator(), sender);
        let mut controller = BleController::new(kit, queue, ControllerSettings::default());

        controller.request_connect("KIT-42").await.unwrap();
        assert_eq!(controller.state(), ConnectionState::Connecting);

        assert_eq!(
            controller.next_update().await,
            Some(SessionUpdate::StateChanged(ConnectionState::Connected))
        );

        let frame = next_frame_ble(&mut controller).await;
        assert_eq!(frame.button, ButtonState::Released);

        controller.send_command(&OutboundCommand::DigitalHigh).await.unwrap();
        let frame = next_frame_ble(&mut controller).await;
        assert_eq!(frame.button, ButtonState::Pressed);

        let session = controller.session().unwrap();
        assert_eq!(session.display().button, "Button DOWN");
        assert_eq!(session.statistics().commands_sent, 1);
        assert!(session.statistics().frames_decoded >= 2);

        assert!(controller.request_disconnect().await.unwrap());
        let updates = controller.drain_pending();
        assert_eq!(
            updates.last(),
            Some(&SessionUpdate::StateChanged(ConnectionState::Disconnected))
        );
        assert_eq!(controller.state(), ConnectionState::Disconnected);

        // link is down: commands are dropped without reaching the kit
        let outcome = controller.send_command(&OutboundCommand::DigitalLow).await.unwrap();
        assert_eq!(outcome, physis_link::core::session::SendOutcome::Dropped);
        assert!(controller.transport().outputs().await.digital_high);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ble_unknown_kit() {
        let (sender, queue) = event_channel();
        let kit = SimulatedBleKit::new(simulator(), sender);
        let mut controller = BleController::new(kit, queue, ControllerSettings::default());

        controller.request_connect("KIT-0").await.unwrap();
        assert_eq!(
            controller.next_update().await,
            Some(SessionUpdate::StateChanged(ConnectionState::DiscoveryFailed))
        );
        assert!(!controller.request_disconnect().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mqtt_session_lifecycle() {
        let config = simulator();
        let (sender, queue) = event_channel();
        let kit = SimulatedMqttKit::new(config.clone(), sender);
        let mut controller = MqttController::new(kit, queue, ControllerSettings::default());

        controller
            .request_connect("KIT-42", &config.monitor_topic, &config.control_topic)
            .await
            .unwrap();

        let update = controller.next_update().await.unwrap().unwrap();
        assert_eq!(update, SessionUpdate::StateChanged(ConnectionState::Connected));
        assert!(controller.session().unwrap().is_subscribed());

        controller
            .publish_command(&OutboundCommand::analog("300"))
            .await
            .unwrap();

        let frame = loop {
            match controller.next_update().await.unwrap().unwrap() {
                SessionUpdate::Telemetry(frame) => break frame,
                _ => continue,
            }
        };
        assert!(frame.illuminance_lux().unwrap() >= 300.0);

        controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_mqtt_wrong_topic_sees_nothing() {
        let config = simulator();
        let (sender, queue) = event_channel();
        let kit = SimulatedMqttKit::new(config.clone(), sender);
        let mut controller = MqttController::new(kit, queue, ControllerSettings::default());

        controller
            .request_connect("KIT-42", "somewhere/else", &config.control_topic)
            .await
            .unwrap();
        controller.next_update().await.unwrap().unwrap();

        let quiet = tokio::time::timeout(Duration::from_secs(2), controller.next_update()).await;
        assert!(quiet.is_err());
        assert_eq!(controller.session().unwrap().statistics().frames_decoded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_falls_back_to_disconnected() {
        let config = SimulatorConfig {
            connect_delay_ms: 10_000,
            ..simulator()
        };
        let settings = ControllerSettings {
            connect_timeout: Some(Duration::from_millis(500)),
            ..ControllerSettings::default()
        };
        let (sender, queue) = event_channel();
        let kit = SimulatedBleKit::new(config, sender);
        let mut controller = BleController::new(kit, queue, settings);

        controller.request_connect("KIT-42").await.unwrap();
        assert_eq!(controller.next_update().await, Some(SessionUpdate::ConnectTimedOut));
        assert_eq!(controller.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_config_defaults() {
        let config = PhysisConfig::default();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.history_limit, 1000);
        assert_eq!(config.global.connect_timeout_ms, 0);
        assert_eq!(config.simulator.monitor_topic, "physis/monitor");
        assert!(ControllerSettings::from(&config.global).connect_timeout.is_none());
    }
}
