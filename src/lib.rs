//! Real-time location distribution for mobile vendors
//!
//! `vendor-beacon` keeps a live registry of online vendors (food trucks and the
//! like), fans their position changes out to subscribed viewers, and answers
//! "who is within R km of me" queries against the same live state.
//!
//! # Layout
//!
//! - [`geo`]: positions, great-circle distance and the spatial index
//! - [`registry`]: presence, subscriptions and the update broadcaster
//! - [`protocol`]: newline-delimited JSON wire messages and framing
//! - [`server`]: TCP listener, per-connection sessions and the handler seam
//! - [`client`]: small vendor/viewer clients speaking the wire protocol
//! - [`stats`]: counters for the tracker and the server
//!
//! # Example
//!
//! ```no_run
//! use vendor_beacon::{DefaultHandler, ServerConfig, TrackerServer};
//!
//! # async fn example() -> vendor_beacon::error::Result<()> {
//! let server = TrackerServer::new(ServerConfig::default(), DefaultHandler);
//! server.run().await
//! # }
//! ```

pub mod client;
pub mod error;
pub mod geo;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use geo::{haversine, Position};
pub use registry::{
    BroadcastEvent, DisplayMeta, PublishReport, TrackerConfig, TrackerError, VendorId,
    VendorTracker, VendorUpdate, ViewerId,
};
pub use server::handler::{AuthResult, DefaultHandler, TrackerHandler};
pub use server::{ServerConfig, TrackerServer};
