//! Viewer subscriptions
//!
//! Each viewer holds at most one subscription: either everything, or a
//! circular region. The manager also owns the viewer's outbound queue so the
//! filter and the delivery target are always replaced together.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::event::{BroadcastEvent, ViewerId};
use crate::geo::{distance, Position};

/// Outbound queue of a viewer connection
pub type EventSender = mpsc::Sender<Arc<BroadcastEvent>>;

/// Receiving half of a viewer's queue
pub type EventReceiver = mpsc::Receiver<Arc<BroadcastEvent>>;

/// Circular area of interest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub center: Position,
    pub radius_km: f64,
}

impl Region {
    pub fn new(center: Position, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    /// Whether `position` lies inside or exactly on the edge
    pub fn contains(&self, position: Position) -> bool {
        distance(self.center, position) <= self.radius_km
    }
}

/// What a viewer wants to hear about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubscriptionFilter {
    /// Every vendor event
    Unfiltered,
    /// Only vendors inside the region
    Region(Region),
}

impl SubscriptionFilter {
    pub fn matches(&self, position: Position) -> bool {
        match self {
            SubscriptionFilter::Unfiltered => true,
            SubscriptionFilter::Region(region) => region.contains(position),
        }
    }
}

#[derive(Debug)]
struct ViewerEntry {
    filter: SubscriptionFilter,
    tx: EventSender,
}

/// Subscriptions keyed by viewer
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    viewers: BTreeMap<ViewerId, ViewerEntry>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a viewer, replacing any previous subscription
    ///
    /// Returns the filter that was replaced, if any.
    pub fn subscribe(
        &mut self,
        viewer_id: ViewerId,
        filter: SubscriptionFilter,
        tx: EventSender,
    ) -> Option<SubscriptionFilter> {
        self.viewers
            .insert(viewer_id, ViewerEntry { filter, tx })
            .map(|prev| prev.filter)
    }

    /// Drop a viewer's subscription; returns whether one existed
    pub fn unsubscribe(&mut self, viewer_id: ViewerId) -> bool {
        self.viewers.remove(&viewer_id).is_some()
    }

    /// Viewers that should receive `event`, in ascending id order
    ///
    /// Offline events are matched against the vendor's last indexed position
    /// so viewers that could see the vendor are told it left.
    pub fn interested_in(&self, event: &BroadcastEvent) -> Vec<ViewerId> {
        let position = event.interest_position();
        self.viewers
            .iter()
            .filter(|(_, entry)| entry.filter.matches(position))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Outbound queue of a subscribed viewer
    pub fn sender(&self, viewer_id: ViewerId) -> Option<&EventSender> {
        self.viewers.get(&viewer_id).map(|e| &e.tx)
    }

    /// Current filter of a viewer
    pub fn filter(&self, viewer_id: ViewerId) -> Option<SubscriptionFilter> {
        self.viewers.get(&viewer_id).map(|e| e.filter)
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::event::VendorId;

    fn pos(lat: f64, lng: f64) -> Position {
        Position::new(lat, lng).unwrap()
    }

    fn moved_to(lat: f64, lng: f64) -> BroadcastEvent {
        BroadcastEvent::VendorMoved {
            vendor_id: VendorId::parse("T1").unwrap(),
            position: pos(lat, lng),
        }
    }

    fn origin_region(radius_km: f64) -> SubscriptionFilter {
        SubscriptionFilter::Region(Region::new(pos(0.0, 0.0), radius_km))
    }

    #[test]
    fn test_region_membership() {
        let (tx, _rx) = mpsc::channel(4);
        let mut subs = SubscriptionManager::new();
        subs.subscribe(ViewerId(1), origin_region(5.0), tx);

        // ~1.1 km from the origin
        assert_eq!(subs.interested_in(&moved_to(0.01, 0.0)), vec![ViewerId(1)]);
        // ~111 km from the origin
        assert!(subs.interested_in(&moved_to(1.0, 0.0)).is_empty());
    }

    #[test]
    fn test_unfiltered_sees_everything() {
        let (tx, _rx) = mpsc::channel(4);
        let mut subs = SubscriptionManager::new();
        subs.subscribe(ViewerId(3), SubscriptionFilter::Unfiltered, tx.clone());
        subs.subscribe(ViewerId(1), origin_region(5.0), tx);

        assert_eq!(subs.interested_in(&moved_to(50.0, 50.0)), vec![ViewerId(3)]);
        assert_eq!(
            subs.interested_in(&moved_to(0.0, 0.0)),
            vec![ViewerId(1), ViewerId(3)]
        );
    }

    #[test]
    fn test_resubscribe_replaces() {
        let (tx, _rx) = mpsc::channel(4);
        let mut subs = SubscriptionManager::new();

        assert!(subs
            .subscribe(ViewerId(1), origin_region(5.0), tx.clone())
            .is_none());
        let prev = subs.subscribe(ViewerId(1), SubscriptionFilter::Unfiltered, tx);

        assert_eq!(prev, Some(origin_region(5.0)));
        assert_eq!(subs.len(), 1);
        assert_eq!(subs.filter(ViewerId(1)), Some(SubscriptionFilter::Unfiltered));
    }

    #[test]
    fn test_unsubscribe() {
        let (tx, _rx) = mpsc::channel(4);
        let mut subs = SubscriptionManager::new();
        subs.subscribe(ViewerId(1), SubscriptionFilter::Unfiltered, tx);

        assert!(subs.unsubscribe(ViewerId(1)));
        assert!(!subs.unsubscribe(ViewerId(1)));
        assert!(subs.interested_in(&moved_to(0.0, 0.0)).is_empty());
        assert!(subs.sender(ViewerId(1)).is_none());
    }

    #[test]
    fn test_region_boundary_inclusive() {
        let edge = pos(0.03, 0.04);
        let exact = distance(pos(0.0, 0.0), edge);
        let region = Region::new(pos(0.0, 0.0), exact);

        assert!(region.contains(edge));
        assert!(!Region::new(pos(0.0, 0.0), exact - 1e-9).contains(edge));
    }

    #[test]
    fn test_offline_matched_on_last_position() {
        let (tx, _rx) = mpsc::channel(4);
        let mut subs = SubscriptionManager::new();
        subs.subscribe(ViewerId(1), origin_region(5.0), tx);

        let gone = BroadcastEvent::VendorOffline {
            vendor_id: VendorId::parse("T1").unwrap(),
            last_position: pos(0.01, 0.0),
        };
        assert_eq!(subs.interested_in(&gone), vec![ViewerId(1)]);
    }
}
