use crate::domain::error::PhysisResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Ble,
    Mqtt,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Ble => write!(f, "ble"),
            TransportType::Mqtt => write!(f, "mqtt"),
        }
    }
}

/// Direct link to a kit over Bluetooth Low Energy.
///
/// Every call only issues a request. Outcomes come back later as
/// [`BleEvent`](super::event::BleEvent)s on the controller's event queue;
/// an `Err` means the request could not be issued at all.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Start connecting to the kit with the given serial number
    async fn connect(&self, serial_number: &str) -> PhysisResult<()>;

    /// Close the current link
    async fn disconnect(&self) -> PhysisResult<()>;

    /// Write a text payload to the kit
    async fn send(&self, payload: &str) -> PhysisResult<()>;
}

/// Broker-relayed link to a kit over MQTT.
///
/// Outcomes come back as [`MqttEvent`](super::event::MqttEvent)s.
#[async_trait]
pub trait MqttTransport: Send + Sync {
    /// Start a broker session using the transport's credentials
    async fn connect(&self) -> PhysisResult<()>;

    /// Close the broker session
    async fn disconnect(&self) -> PhysisResult<()>;

    /// Subscribe to a kit's topic
    async fn subscribe(&self, device_id: &str, topic: &str) -> PhysisResult<()>;

    /// Publish a text payload to a kit's topic
    async fn publish(&self, device_id: &str, topic: &str, payload: &str) -> PhysisResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // Records every request it is asked to issue
    #[derive(Default, Clone)]
    struct RecordingBle {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BleTransport for RecordingBle {
        async fn connect(&self, serial_number: &str) -> PhysisResult<()> {
            self.calls.lock().unwrap().push(format!("connect {}", serial_number));
            Ok(())
        }

        async fn disconnect(&self) -> PhysisResult<()> {
            self.calls.lock().unwrap().push("disconnect".to_string());
            Ok(())
        }

        async fn send(&self, payload: &str) -> PhysisResult<()> {
            self.calls.lock().unwrap().push(format!("send {}", payload));
            Ok(())
        }
    }

    #[test]
    fn test_transport_type_display() {
        assert_eq!(TransportType::Ble.to_string(), "ble");
        assert_eq!(TransportType::Mqtt.to_string(), "mqtt");
    }

    #[tokio::test]
    async fn test_transport_is_object_safe() {
        let recorder = RecordingBle::default();
        let transport: Box<dyn BleTransport> = Box::new(recorder.clone());

        transport.connect("KIT1").await.unwrap();
        transport.send("DH").await.unwrap();
        transport.disconnect().await.unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(*calls, vec!["connect KIT1", "send DH", "disconnect"]);
    }
}
