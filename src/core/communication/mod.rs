// Communication module - Transport seams and callback delivery
pub mod event;
pub mod message;
pub mod transport;

pub use event::{event_channel, BleEvent, EventQueue, EventSender, MqttEvent};
pub use message::{Message, MessageDirection, MessageHistory};
pub use transport::{BleTransport, MqttTransport, TransportType};
