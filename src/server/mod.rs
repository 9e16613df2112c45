//! TCP server
//!
//! Accepts vendor and viewer connections and wires them to a shared
//! [`VendorTracker`](crate::registry::VendorTracker).

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use handler::{AuthResult, DefaultHandler, TrackerHandler};
pub use listener::TrackerServer;
