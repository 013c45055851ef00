// Session module - Per-connection state and connection controllers
pub mod ble;
pub mod mqtt;
pub mod session;
pub mod state;

pub use ble::BleController;
pub use mqtt::MqttController;
pub use session::Session;
pub use state::{
    ConnectOutcome, ConnectionState, ControllerSettings, SendOutcome, SessionStatistics,
    SessionUpdate,
};
