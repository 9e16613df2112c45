//! Handler context
//!
//! Context passed to handler callbacks containing session information.

use std::net::SocketAddr;

use super::state::SessionState;
use crate::registry::VendorId;
use crate::stats::SessionStats;

/// Context passed to TrackerHandler callbacks
///
/// Provides read-only access to session information. For operations
/// that modify state, use the return values from handler methods.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Vendor this connection speaks for, if any
    pub vendor: Option<VendorId>,

    /// Whether the connection is subscribed as a viewer
    pub is_viewer: bool,

    /// Current session statistics
    pub stats: SessionStats,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            vendor: None,
            is_viewer: false,
            stats: SessionStats::default(),
        }
    }

    /// Snapshot a session
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            session_id: state.id,
            peer_addr: state.peer_addr,
            vendor: state.vendor.clone(),
            is_viewer: state.is_viewer(),
            stats: state.stats.clone(),
        }
    }
}
