//! Session state machine
//!
//! Tracks a connection from accept to teardown, including which vendor it
//! speaks for and whether it is subscribed as a viewer.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::{SubscriptionFilter, VendorId};
use crate::stats::SessionStats;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, nothing exchanged yet
    Connected,
    /// At least one frame accepted
    Active,
    /// Session is closing
    Closing,
    /// Session closed
    Closed,
}

/// Why a vendor announcement cannot be bound to this session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConflict {
    pub bound: VendorId,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Vendor this connection announced (at most one per connection)
    pub vendor: Option<VendorId>,

    /// Active viewer subscription
    pub subscription: Option<SubscriptionFilter>,

    /// Traffic counters
    pub stats: SessionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connected,
            connected_at: Instant::now(),
            vendor: None,
            subscription: None,
            stats: SessionStats::new(),
        }
    }

    /// Mark the session active after its first accepted frame
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Connected {
            self.phase = SessionPhase::Active;
        }
    }

    /// Check that `vendor_id` may be used on this connection
    ///
    /// A connection is tied to one vendor; once bound, other ids conflict.
    pub fn check_vendor(&self, vendor_id: &VendorId) -> Result<(), BindingConflict> {
        match &self.vendor {
            Some(bound) if bound != vendor_id => Err(BindingConflict {
                bound: bound.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Bind the connection to a vendor
    pub fn bind_vendor(&mut self, vendor_id: VendorId) {
        self.vendor = Some(vendor_id);
    }

    /// Forget the vendor after it went offline explicitly
    pub fn release_vendor(&mut self) -> Option<VendorId> {
        self.vendor.take()
    }

    /// Whether the session is subscribed as a viewer
    pub fn is_viewer(&self) -> bool {
        self.subscription.is_some()
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Start closing the session
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closing;
    }

    /// Finish teardown, freezing the session duration into the stats
    pub fn finish(&mut self) {
        self.stats.duration = self.duration();
        self.phase = SessionPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7878)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(1, addr());
        assert_eq!(state.phase, SessionPhase::Connected);

        state.activate();
        assert!(state.is_active());

        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        state.finish();
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_vendor_binding() {
        let mut state = SessionState::new(1, addr());
        let t1 = VendorId::parse("T1").unwrap();
        let t2 = VendorId::parse("T2").unwrap();

        assert!(state.check_vendor(&t1).is_ok());
        state.bind_vendor(t1.clone());

        assert!(state.check_vendor(&t1).is_ok());
        assert_eq!(
            state.check_vendor(&t2),
            Err(BindingConflict { bound: t1.clone() })
        );

        assert_eq!(state.release_vendor(), Some(t1));
        assert!(state.check_vendor(&t2).is_ok());
    }
}
