//! Client implementation
//!
//! Small async clients speaking the wire protocol:
//! - [`VendorPublisher`] for vendor apps reporting their position
//! - [`ViewerClient`] for map views subscribing to vendor events
//!
//! Both sit on a [`TrackerConnector`], which also buffers events that arrive
//! while a request is waiting for its reply.

pub mod connector;
pub mod publisher;
pub mod viewer;

pub use connector::TrackerConnector;
pub use publisher::VendorPublisher;
pub use viewer::ViewerClient;
