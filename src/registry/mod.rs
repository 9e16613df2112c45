//! Vendor registry and update fan-out
//!
//! The registry tracks which vendors are online and where, and routes their
//! changes to viewers. Each viewer connection owns a bounded `mpsc` queue;
//! the tracker pushes into it with `try_send` so a slow viewer never stalls
//! anybody else.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<VendorTracker>
//!                 ┌──────────────────────────────────┐
//!                 │ vendor_locks: per-vendor Mutex   │
//!                 │ live: RwLock<{                   │
//!                 │   presence: PresenceRegistry,    │
//!                 │   index: Box<dyn SpatialIndex>,  │
//!                 │ }>                               │
//!                 │ subscriptions: RwLock<           │
//!                 │   SubscriptionManager>           │
//!                 └────────────────┬─────────────────┘
//!                                  │
//!        ┌─────────────────────────┼──────────────────────────┐
//!        │                         │                          │
//!        ▼                         ▼                          ▼
//!    [Vendor]                  [Viewer]                   [Viewer]
//!    publish()                 rx.recv()                  rx.recv()
//!        │                         ▲                          ▲
//!        └─► apply ─► interested_in ─► try_send ──────────────┘
//! ```
//!
//! # Ordering
//!
//! A vendor's lock is held from apply through fan-out. Each viewer queue is
//! FIFO, so two updates for the same vendor reach every viewer in the order
//! they were applied. Events are shared as `Arc<BroadcastEvent>`.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod presence;
pub mod store;
pub mod subscription;

pub use config::TrackerConfig;
pub use entry::VendorSession;
pub use error::{DeliveryFailure, TrackerError};
pub use event::{BroadcastEvent, DisplayMeta, EventKind, VendorId, VendorUpdate, ViewerId};
pub use presence::{Announcement, PresenceRegistry};
pub use store::{NearbyVendor, PublishReport, VendorTracker};
pub use subscription::{
    EventReceiver, EventSender, Region, SubscriptionFilter, SubscriptionManager,
};
