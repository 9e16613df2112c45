//! Identifiers, updates and the events broadcast to viewers

use serde::{Deserialize, Serialize};

use super::error::TrackerError;
use crate::geo::Position;

const MAX_VENDOR_ID_LEN: usize = 64;

/// Unique identifier for a vendor
///
/// 1 to 64 characters of ASCII letters, digits, `-`, `_` or `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    /// Validate and wrap a raw vendor id
    pub fn parse(raw: impl Into<String>) -> Result<Self, TrackerError> {
        let raw = raw.into();

        if raw.is_empty() || raw.len() > MAX_VENDOR_ID_LEN {
            return Err(TrackerError::InvalidInput(format!(
                "vendor id must be 1..={} characters",
                MAX_VENDOR_ID_LEN
            )));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(TrackerError::InvalidInput(format!(
                "vendor id {:?} contains invalid characters",
                raw
            )));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for VendorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VendorId::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a viewer; the session id of its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u64);

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Display fields pulled from the vendor directory
///
/// Purely decorative: never consulted for online state or position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
}

impl DisplayMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An unvalidated change submitted by a vendor session
#[derive(Debug, Clone)]
pub enum VendorUpdate {
    /// Vendor announces it is online at a position
    Online {
        vendor_id: String,
        lat: f64,
        lng: f64,
        meta: DisplayMeta,
    },
    /// Online vendor reports a new position
    Moved { vendor_id: String, lat: f64, lng: f64 },
    /// Vendor goes offline
    Offline { vendor_id: String },
}

impl VendorUpdate {
    pub fn online(vendor_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        VendorUpdate::Online {
            vendor_id: vendor_id.into(),
            lat,
            lng,
            meta: DisplayMeta::default(),
        }
    }

    pub fn moved(vendor_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        VendorUpdate::Moved {
            vendor_id: vendor_id.into(),
            lat,
            lng,
        }
    }

    pub fn offline(vendor_id: impl Into<String>) -> Self {
        VendorUpdate::Offline {
            vendor_id: vendor_id.into(),
        }
    }

    /// Raw vendor id as submitted
    pub fn raw_vendor_id(&self) -> &str {
        match self {
            VendorUpdate::Online { vendor_id, .. }
            | VendorUpdate::Moved { vendor_id, .. }
            | VendorUpdate::Offline { vendor_id } => vendor_id,
        }
    }
}

/// Kind of broadcast event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    VendorOnline,
    VendorMoved,
    VendorOffline,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::VendorOnline => "vendor-online",
            EventKind::VendorMoved => "vendor-moved",
            EventKind::VendorOffline => "vendor-offline",
        };
        f.write_str(name)
    }
}

/// An event fanned out to interested viewers
///
/// Shared between recipients as `Arc<BroadcastEvent>`.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    VendorOnline {
        vendor_id: VendorId,
        position: Position,
        meta: DisplayMeta,
    },
    VendorMoved {
        vendor_id: VendorId,
        position: Position,
    },
    /// `last_position` is only used to find who was watching; it is not sent
    VendorOffline {
        vendor_id: VendorId,
        last_position: Position,
    },
}

impl BroadcastEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BroadcastEvent::VendorOnline { .. } => EventKind::VendorOnline,
            BroadcastEvent::VendorMoved { .. } => EventKind::VendorMoved,
            BroadcastEvent::VendorOffline { .. } => EventKind::VendorOffline,
        }
    }

    pub fn vendor_id(&self) -> &VendorId {
        match self {
            BroadcastEvent::VendorOnline { vendor_id, .. }
            | BroadcastEvent::VendorMoved { vendor_id, .. }
            | BroadcastEvent::VendorOffline { vendor_id, .. } => vendor_id,
        }
    }

    /// Position used to decide which region subscriptions care
    pub fn interest_position(&self) -> Position {
        match self {
            BroadcastEvent::VendorOnline { position, .. }
            | BroadcastEvent::VendorMoved { position, .. } => *position,
            BroadcastEvent::VendorOffline { last_position, .. } => *last_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_id_accepts_common_forms() {
        for raw in ["T1", "truck-42", "taco_bell.sf", "a"] {
            assert!(VendorId::parse(raw).is_ok(), "{}", raw);
        }
    }

    #[test]
    fn test_vendor_id_rejects_bad_input() {
        assert!(VendorId::parse("").is_err());
        assert!(VendorId::parse("has space").is_err());
        assert!(VendorId::parse("emoji🚚").is_err());
        assert!(VendorId::parse("x".repeat(65)).is_err());
        assert!(VendorId::parse("x".repeat(64)).is_ok());
    }

    #[test]
    fn test_vendor_id_deserialize_validates() {
        let ok: VendorId = serde_json::from_str(r#""T1""#).unwrap();
        assert_eq!(ok.as_str(), "T1");
        assert!(serde_json::from_str::<VendorId>(r#""bad id""#).is_err());
    }

    #[test]
    fn test_offline_interest_uses_last_position() {
        let last = Position::new(1.0, 2.0).unwrap();
        let event = BroadcastEvent::VendorOffline {
            vendor_id: VendorId::parse("T1").unwrap(),
            last_position: last,
        };
        assert_eq!(event.kind(), EventKind::VendorOffline);
        assert_eq!(event.interest_position(), last);
    }
}
