//! Transport callbacks, delivered as values into a queue the controller owns.
//!
//! A transport holds an [`EventSender`]; the controller holds the only
//! [`EventQueue`], so connection state has a single writer no matter which
//! thread the transport reports from.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// BLE result code: link established
pub const BLE_CONNECTED: i32 = 200;
/// BLE result code: link failed or closed
pub const BLE_DISCONNECTED: i32 = 201;
/// BLE result code: the kit was not found
pub const BLE_NO_DISCOVERY: i32 = 202;

/// Callback from a BLE transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BleEvent {
    /// Connection result code, normally one of 200/201/202
    ConnectionResult(i32),
    /// Text received from the kit
    Message(String),
}

/// Callback from an MQTT transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MqttEvent {
    /// Broker connection result
    ConnectionResult(bool),
    /// Broker session lost or closed
    Disconnected,
    /// Message on a subscribed topic
    SubscribeMessage {
        device_id: String,
        topic: String,
        payload: String,
    },
}

/// Transport-side handle for delivering callbacks
#[derive(Debug)]
pub struct EventSender<E> {
    inner: mpsc::UnboundedSender<E>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: std::fmt::Debug> EventSender<E> {
    /// Deliver an event. Returns false once the controller is gone.
    pub fn emit(&self, event: E) -> bool {
        match self.inner.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!("Dropping {:?}: event queue closed", event);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Controller-side single consumer of transport callbacks
#[derive(Debug)]
pub struct EventQueue<E> {
    inner: mpsc::UnboundedReceiver<E>,
}

impl<E> EventQueue<E> {
    /// Wait for the next event; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<E> {
        self.inner.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.inner.try_recv().ok()
    }
}

/// Create a connected sender/queue pair
pub fn event_channel<E>() -> (EventSender<E>, EventQueue<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { inner: tx }, EventQueue { inner: rx })
}
