//! Vendor tracker: the update broadcaster
//!
//! Owns the live state (presence registry + spatial index) and the viewer
//! subscriptions. Every mutation goes through [`VendorTracker::publish`] (or
//! its disconnect/expiry variants), which validates, applies the change to
//! both structures inside one write lock, and fans the resulting event out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock};

use super::config::TrackerConfig;
use super::entry::VendorSession;
use super::error::{DeliveryFailure, TrackerError};
use super::event::{BroadcastEvent, DisplayMeta, EventKind, VendorId, VendorUpdate, ViewerId};
use super::presence::{Announcement, PresenceRegistry};
use super::subscription::{EventSender, SubscriptionFilter, SubscriptionManager};
use crate::geo::{round_km, Position, SpatialIndex};
use crate::stats::{TrackerMetrics, TrackerStats};

/// Outcome of an accepted update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    /// Event that was broadcast (None when the update changed nothing)
    pub event: Option<EventKind>,
    /// Viewers the event was queued for
    pub delivered: usize,
    /// Viewers that could not be reached
    pub failures: Vec<DeliveryFailure>,
}

impl PublishReport {
    fn noop() -> Self {
        Self::default()
    }
}

/// A vendor returned by a proximity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyVendor {
    pub vendor_id: VendorId,
    /// Distance rounded to one decimal
    pub distance_km: f64,
    #[serde(default)]
    pub meta: DisplayMeta,
}

/// Why a vendor is being taken offline
#[derive(Debug, Clone, Copy)]
enum OfflineCause {
    /// The owning connection asked
    Announced { session_id: u64 },
    /// The owning connection went away
    Disconnected { session_id: u64 },
    /// No update within the stale timeout
    Stale { timeout: Duration },
}

/// A validated change ready to apply
#[derive(Debug)]
enum Change {
    Online {
        vendor_id: VendorId,
        position: Position,
        session_id: u64,
        meta: DisplayMeta,
    },
    Moved {
        vendor_id: VendorId,
        position: Position,
        session_id: u64,
    },
    Offline {
        vendor_id: VendorId,
        cause: OfflineCause,
    },
}

impl Change {
    fn validate(session_id: u64, update: VendorUpdate) -> Result<Self, TrackerError> {
        match update {
            VendorUpdate::Online {
                vendor_id,
                lat,
                lng,
                meta,
            } => Ok(Change::Online {
                vendor_id: VendorId::parse(vendor_id)?,
                position: Position::new(lat, lng)?,
                session_id,
                meta,
            }),
            VendorUpdate::Moved {
                vendor_id,
                lat,
                lng,
            } => Ok(Change::Moved {
                vendor_id: VendorId::parse(vendor_id)?,
                position: Position::new(lat, lng)?,
                session_id,
            }),
            VendorUpdate::Offline { vendor_id } => Ok(Change::Offline {
                vendor_id: VendorId::parse(vendor_id)?,
                cause: OfflineCause::Announced { session_id },
            }),
        }
    }

    fn vendor_id(&self) -> &VendorId {
        match self {
            Change::Online { vendor_id, .. }
            | Change::Moved { vendor_id, .. }
            | Change::Offline { vendor_id, .. } => vendor_id,
        }
    }
}

/// Presence and index, always updated together
struct LiveState {
    presence: PresenceRegistry,
    index: Box<dyn SpatialIndex>,
}

impl LiveState {
    /// Only the session that announced a vendor may move it or take it offline
    fn check_owner(&self, vendor_id: &VendorId, session_id: u64) -> Result<(), TrackerError> {
        match self.presence.owner(vendor_id) {
            Some(owner) if owner != session_id => {
                tracing::warn!(
                    vendor = %vendor_id,
                    owner = owner,
                    session_id = session_id,
                    "Update from non-owning session rejected"
                );
                Err(TrackerError::NotOwner(vendor_id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Apply a change to both structures
    ///
    /// Returns the event to broadcast, or None when nothing changed.
    fn apply(&mut self, change: Change) -> Result<Option<BroadcastEvent>, TrackerError> {
        let event = match change {
            Change::Online {
                vendor_id,
                position,
                session_id,
                meta,
            } => {
                let announcement = self
                    .presence
                    .set_online(&vendor_id, position, session_id, meta.clone());
                self.index.upsert(&vendor_id, position);

                tracing::info!(
                    vendor = %vendor_id,
                    session_id = session_id,
                    position = %position,
                    reannounced = announcement == Announcement::Reannounced,
                    "Vendor online"
                );

                BroadcastEvent::VendorOnline {
                    vendor_id,
                    position,
                    meta,
                }
            }
            Change::Moved {
                vendor_id,
                position,
                session_id,
            } => {
                self.check_owner(&vendor_id, session_id)?;
                self.presence.update_position(&vendor_id, position)?;
                self.index.upsert(&vendor_id, position);

                tracing::trace!(vendor = %vendor_id, position = %position, "Vendor moved");

                BroadcastEvent::VendorMoved {
                    vendor_id,
                    position,
                }
            }
            Change::Offline { vendor_id, cause } => {
                let Some(session) = self.presence.get(&vendor_id) else {
                    tracing::debug!(vendor = %vendor_id, "Offline for unknown vendor ignored");
                    return Ok(None);
                };

                match cause {
                    OfflineCause::Announced { session_id } => {
                        self.check_owner(&vendor_id, session_id)?;
                    }
                    OfflineCause::Disconnected { session_id } if session.session_id != session_id => {
                        tracing::debug!(
                            vendor = %vendor_id,
                            owner = session.session_id,
                            session_id = session_id,
                            "Disconnect from non-owning session ignored"
                        );
                        return Ok(None);
                    }
                    OfflineCause::Stale { timeout } if session.idle_for(Instant::now()) <= timeout => {
                        return Ok(None);
                    }
                    _ => {}
                }

                let session = self.presence.set_offline(&vendor_id)?;
                // The index holds the position viewers last saw
                let last_position = self.index.remove(&vendor_id).unwrap_or(session.position);

                tracing::info!(vendor = %vendor_id, cause = ?cause, "Vendor offline");

                BroadcastEvent::VendorOffline {
                    vendor_id,
                    last_position,
                }
            }
        };

        debug_assert_eq!(self.presence.len(), self.index.len());
        Ok(Some(event))
    }
}

/// Central tracker for online vendors and their viewers
///
/// Updates for one vendor are serialized by a per-vendor lock held across
/// apply and fan-out, so every viewer sees that vendor's events in order.
/// Different vendors proceed independently. Queries only take the live
/// state read lock.
pub struct VendorTracker {
    live: RwLock<LiveState>,
    subscriptions: RwLock<SubscriptionManager>,
    vendor_locks: Mutex<HashMap<VendorId, Arc<Mutex<()>>>>,
    metrics: TrackerMetrics,
    config: TrackerConfig,
}

impl VendorTracker {
    /// Create a tracker with default configuration
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Create a tracker with custom configuration
    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            live: RwLock::new(LiveState {
                presence: PresenceRegistry::new(),
                index: config.index.build(),
            }),
            subscriptions: RwLock::new(SubscriptionManager::new()),
            vendor_locks: Mutex::new(HashMap::new()),
            metrics: TrackerMetrics::new(),
            config,
        }
    }

    /// Get the tracker configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Validate and apply a vendor update, then broadcast it
    ///
    /// `session_id` identifies the connection submitting the update; an
    /// online announcement makes it the vendor's owner.
    pub async fn publish(
        &self,
        session_id: u64,
        update: VendorUpdate,
    ) -> Result<PublishReport, TrackerError> {
        let change = Change::validate(session_id, update).map_err(|e| {
            self.metrics.record_rejected();
            tracing::debug!(session_id = session_id, error = %e, "Update rejected");
            e
        })?;

        self.commit(change).await
    }

    /// Take a vendor offline because its connection closed
    ///
    /// Ignored unless `session_id` still owns the vendor, so a vendor that
    /// reconnected elsewhere stays online.
    pub async fn disconnect_vendor(&self, vendor_id: &VendorId, session_id: u64) -> PublishReport {
        let change = Change::Offline {
            vendor_id: vendor_id.clone(),
            cause: OfflineCause::Disconnected { session_id },
        };
        self.commit(change).await.unwrap_or_default()
    }

    async fn commit(&self, change: Change) -> Result<PublishReport, TrackerError> {
        let lock = self.vendor_lock(change.vendor_id()).await;
        let _serial = lock.lock().await;

        let applied = {
            let mut live = self.live.write().await;
            live.apply(change)
        };

        match applied {
            Ok(Some(event)) => {
                self.metrics.record_applied();
                Ok(self.fan_out(event).await)
            }
            Ok(None) => Ok(PublishReport::noop()),
            Err(e) => {
                self.metrics.record_rejected();
                tracing::debug!(error = %e, "Update rejected");
                Err(e)
            }
        }
    }

    async fn vendor_lock(&self, vendor_id: &VendorId) -> Arc<Mutex<()>> {
        let mut locks = self.vendor_locks.lock().await;
        Arc::clone(locks.entry(vendor_id.clone()).or_default())
    }

    /// Queue an event for every interested viewer without waiting on any
    async fn fan_out(&self, event: BroadcastEvent) -> PublishReport {
        let event = Arc::new(event);
        let subscriptions = self.subscriptions.read().await;

        let mut delivered = 0;
        let mut failures = Vec::new();

        for viewer_id in subscriptions.interested_in(&event) {
            let Some(tx) = subscriptions.sender(viewer_id) else {
                continue;
            };

            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        viewer = %viewer_id,
                        vendor = %event.vendor_id(),
                        kind = %event.kind(),
                        "Viewer queue full, event dropped"
                    );
                    failures.push(DeliveryFailure::QueueFull(viewer_id));
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(viewer = %viewer_id, "Viewer gone, skipping delivery");
                    failures.push(DeliveryFailure::Disconnected(viewer_id));
                }
            }
        }

        self.metrics.record_fanout(delivered, failures.len());

        tracing::debug!(
            vendor = %event.vendor_id(),
            kind = %event.kind(),
            delivered = delivered,
            failed = failures.len(),
            "Event broadcast"
        );

        PublishReport {
            event: Some(event.kind()),
            delivered,
            failures,
        }
    }

    /// Subscribe a viewer, replacing any previous subscription
    ///
    /// Region radii above the configured maximum are clamped. Returns the
    /// filter actually installed.
    pub async fn subscribe(
        &self,
        viewer_id: ViewerId,
        filter: SubscriptionFilter,
        tx: EventSender,
    ) -> Result<SubscriptionFilter, TrackerError> {
        let filter = match filter {
            SubscriptionFilter::Region(mut region) => {
                region.radius_km = self.resolve_radius(Some(region.radius_km))?;
                SubscriptionFilter::Region(region)
            }
            SubscriptionFilter::Unfiltered => SubscriptionFilter::Unfiltered,
        };

        let replaced = self
            .subscriptions
            .write()
            .await
            .subscribe(viewer_id, filter, tx);

        tracing::info!(
            viewer = %viewer_id,
            filter = ?filter,
            replaced = replaced.is_some(),
            "Viewer subscribed"
        );

        Ok(filter)
    }

    /// Remove a viewer's subscription; future broadcasts skip it
    pub async fn unsubscribe(&self, viewer_id: ViewerId) -> bool {
        let removed = self.subscriptions.write().await.unsubscribe(viewer_id);
        if removed {
            tracing::debug!(viewer = %viewer_id, "Viewer unsubscribed");
        }
        removed
    }

    /// Online vendors within `radius_km` of `center`, nearest first
    ///
    /// `None` uses the default radius; larger than the maximum is clamped;
    /// negative or non-finite is rejected.
    pub async fn find_nearby(
        &self,
        center: Position,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyVendor>, TrackerError> {
        let radius_km = self.resolve_radius(radius_km)?;
        self.metrics.record_query();

        let live = self.live.read().await;
        let results = live
            .index
            .query(center, radius_km)
            .into_iter()
            .map(|hit| {
                let meta = live
                    .presence
                    .get(&hit.vendor_id)
                    .map(|v| v.meta.clone())
                    .unwrap_or_default();
                NearbyVendor {
                    vendor_id: hit.vendor_id,
                    distance_km: round_km(hit.distance_km),
                    meta,
                }
            })
            .collect();

        Ok(results)
    }

    fn resolve_radius(&self, radius_km: Option<f64>) -> Result<f64, TrackerError> {
        match radius_km {
            None => Ok(self.config.default_radius_km),
            Some(r) if !r.is_finite() || r < 0.0 => Err(TrackerError::InvalidInput(format!(
                "radius {} must be a non-negative number",
                r
            ))),
            Some(r) => Ok(r.min(self.config.max_radius_km)),
        }
    }

    /// Check if a vendor is online
    pub async fn is_online(&self, vendor_id: &VendorId) -> bool {
        self.live.read().await.presence.is_online(vendor_id)
    }

    /// Snapshot of a vendor's online state
    pub async fn vendor(&self, vendor_id: &VendorId) -> Option<VendorSession> {
        self.live.read().await.presence.get(vendor_id).cloned()
    }

    /// Number of online vendors
    pub async fn online_count(&self) -> usize {
        self.live.read().await.presence.len()
    }

    /// Number of subscribed viewers
    pub async fn viewer_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Current counters
    pub fn stats(&self) -> TrackerStats {
        self.metrics.snapshot()
    }

    /// Run cleanup once
    ///
    /// Takes offline (with a broadcast) every vendor silent for longer than
    /// `stale_vendor_timeout`, then drops serialization locks of vendors that
    /// are gone. Returns the number of vendors expired.
    pub async fn cleanup(&self) -> usize {
        let mut expired = 0;

        if let Some(timeout) = self.config.stale_vendor_timeout {
            let stale = self.live.read().await.presence.stale(Instant::now(), timeout);

            for vendor_id in stale {
                let change = Change::Offline {
                    vendor_id: vendor_id.clone(),
                    cause: OfflineCause::Stale { timeout },
                };
                // Re-checked under the vendor lock: it may have reported since
                if let Ok(PublishReport { event: Some(_), .. }) = self.commit(change).await {
                    self.metrics.record_expired();
                    expired += 1;
                    tracing::info!(vendor = %vendor_id, "Stale vendor expired");
                }
            }
        }

        self.prune_vendor_locks().await;
        expired
    }

    async fn prune_vendor_locks(&self) {
        let mut locks = self.vendor_locks.lock().await;
        let live = self.live.read().await;
        // A count of 1 means only the map holds it: nobody is inside or waiting
        locks.retain(|id, lock| Arc::strong_count(lock) > 1 || live.presence.is_online(id));
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        let interval = tracker.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tracker.cleanup().await;
            }
        })
    }

    #[cfg(test)]
    async fn assert_consistent(&self) {
        let live = self.live.read().await;
        assert_eq!(live.presence.len(), live.index.len());
        for id in live.presence.vendor_ids() {
            assert!(live.index.contains(id), "{} missing from index", id);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.vendor_locks.lock().await.len()
    }
}

impl Default for VendorTracker {
    fn default() -> Self {
        Self::new()
    }
}
