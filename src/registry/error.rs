//! Tracker error types

use thiserror::Error;

use super::event::{VendorId, ViewerId};

/// Error type for tracker operations
///
/// All variants are returned before any state is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Malformed coordinates, identifiers or radius
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Position update for a vendor without an online session
    #[error("Vendor not online: {0}")]
    NotOnline(VendorId),

    /// Reference to a vendor the registry has never seen
    #[error("Unknown vendor: {0}")]
    UnknownVendor(VendorId),

    /// Move or offline from a connection that does not own the vendor
    #[error("Vendor {0} is owned by another session")]
    NotOwner(VendorId),
}

/// A per-viewer delivery failure
///
/// Reported in [`PublishReport`](super::PublishReport) and logged; never fails
/// the publish itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// The viewer's outbound queue is full
    #[error("Queue full for {0}")]
    QueueFull(ViewerId),

    /// The viewer's connection is gone
    #[error("{0} disconnected")]
    Disconnected(ViewerId),
}

impl DeliveryFailure {
    pub fn viewer_id(&self) -> ViewerId {
        match self {
            DeliveryFailure::QueueFull(id) | DeliveryFailure::Disconnected(id) => *id,
        }
    }
}
