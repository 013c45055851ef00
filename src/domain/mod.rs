// Domain module - Configuration, identities and errors
pub mod config;
pub mod error;
pub mod identity;
