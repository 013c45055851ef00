// Core module - Message contract, transports and connection control
pub mod communication;
pub mod protocol;
pub mod session;
