//! Tracker configuration

use std::time::Duration;

use crate::geo::IndexKind;

/// Configuration for [`VendorTracker`](super::VendorTracker)
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Radius used when a query does not specify one
    pub default_radius_km: f64,

    /// Upper bound for query and subscription radii; larger values are clamped
    pub max_radius_km: f64,

    /// Spatial index backing the live state
    pub index: IndexKind,

    /// Vendors silent for longer than this are taken offline (None = never)
    pub stale_vendor_timeout: Option<Duration>,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            max_radius_km: 100.0,
            index: IndexKind::Linear,
            stale_vendor_timeout: Some(Duration::from_secs(300)),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl TrackerConfig {
    /// Set the default query radius (clamped to the maximum)
    pub fn default_radius_km(mut self, km: f64) -> Self {
        self.default_radius_km = km.min(self.max_radius_km);
        self
    }

    /// Set the maximum radius
    pub fn max_radius_km(mut self, km: f64) -> Self {
        self.max_radius_km = km;
        self.default_radius_km = self.default_radius_km.min(km);
        self
    }

    /// Select the spatial index
    pub fn index(mut self, kind: IndexKind) -> Self {
        self.index = kind;
        self
    }

    /// Set the stale vendor timeout
    pub fn stale_vendor_timeout(mut self, timeout: Duration) -> Self {
        self.stale_vendor_timeout = Some(timeout);
        self
    }

    /// Never expire silent vendors
    pub fn disable_stale_expiry(mut self) -> Self {
        self.stale_vendor_timeout = None;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
