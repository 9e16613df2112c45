//! Presence registry
//!
//! Source of truth for which vendors are online, where they are and which
//! connection owns them. Not thread-safe on its own: it lives inside the
//! tracker's live state and is only mutated from the publish path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::entry::VendorSession;
use super::error::TrackerError;
use super::event::{DisplayMeta, VendorId};
use crate::geo::Position;

/// Result of an online announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// Vendor was offline
    Fresh,
    /// Vendor was already online; position, owner and meta were replaced
    Reannounced,
}

/// Registry of online vendors
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    vendors: HashMap<VendorId, VendorSession>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a vendor online at `position`, owned by `session_id`
    ///
    /// Idempotent: an already-online vendor is treated as a fresh announcement
    /// at the new position.
    pub fn set_online(
        &mut self,
        vendor_id: &VendorId,
        position: Position,
        session_id: u64,
        meta: DisplayMeta,
    ) -> Announcement {
        match self.vendors.get_mut(vendor_id) {
            Some(entry) => {
                entry.position = position;
                entry.session_id = session_id;
                entry.meta = meta;
                entry.updated_at = Instant::now();
                Announcement::Reannounced
            }
            None => {
                self.vendors.insert(
                    vendor_id.clone(),
                    VendorSession::new(vendor_id.clone(), position, session_id, meta),
                );
                Announcement::Fresh
            }
        }
    }

    /// Remove a vendor, returning its final state
    pub fn set_offline(&mut self, vendor_id: &VendorId) -> Result<VendorSession, TrackerError> {
        self.vendors
            .remove(vendor_id)
            .ok_or_else(|| TrackerError::UnknownVendor(vendor_id.clone()))
    }

    /// Move an online vendor
    ///
    /// Never creates state: an offline vendor yields `NotOnline`.
    pub fn update_position(
        &mut self,
        vendor_id: &VendorId,
        position: Position,
    ) -> Result<&VendorSession, TrackerError> {
        let entry = self
            .vendors
            .get_mut(vendor_id)
            .ok_or_else(|| TrackerError::NotOnline(vendor_id.clone()))?;

        entry.position = position;
        entry.updated_at = Instant::now();
        Ok(entry)
    }

    pub fn is_online(&self, vendor_id: &VendorId) -> bool {
        self.vendors.contains_key(vendor_id)
    }

    pub fn get(&self, vendor_id: &VendorId) -> Option<&VendorSession> {
        self.vendors.get(vendor_id)
    }

    /// Session id currently owning a vendor
    pub fn owner(&self, vendor_id: &VendorId) -> Option<u64> {
        self.vendors.get(vendor_id).map(|v| v.session_id)
    }

    /// Vendors whose last update is older than `timeout`
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<VendorId> {
        let mut ids: Vec<VendorId> = self
            .vendors
            .values()
            .filter(|v| v.idle_for(now) > timeout)
            .map(|v| v.vendor_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of all online vendors
    pub fn vendor_ids(&self) -> impl Iterator<Item = &VendorId> {
        self.vendors.keys()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}
