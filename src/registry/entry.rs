//! Per-vendor state stored in the presence registry

use std::time::{Duration, Instant};

use super::event::{DisplayMeta, VendorId};
use crate::geo::Position;

/// An online vendor
///
/// An entry exists only while the vendor is online; going offline removes it.
#[derive(Debug, Clone)]
pub struct VendorSession {
    /// Vendor identity
    pub vendor_id: VendorId,

    /// Current authoritative position
    pub position: Position,

    /// Session id of the connection that owns this vendor
    pub session_id: u64,

    /// Display fields captured when the vendor came online
    pub meta: DisplayMeta,

    /// When the vendor first came online (kept across re-announcements)
    pub online_since: Instant,

    /// Last online announcement or position report
    pub updated_at: Instant,
}

impl VendorSession {
    pub(super) fn new(
        vendor_id: VendorId,
        position: Position,
        session_id: u64,
        meta: DisplayMeta,
    ) -> Self {
        let now = Instant::now();
        Self {
            vendor_id,
            position,
            session_id,
            meta,
            online_since: now,
            updated_at: now,
        }
    }

    /// Time since the last update
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.updated_at)
    }
}
