//! Wire messages
//!
//! Every frame is a JSON object with a `type` tag. Clients send
//! [`ClientMessage`]s; the server answers with [`ServerMessage`]s and pushes
//! vendor events on the same connection.
//!
//! ```text
//! → {"type":"announce-online","vendor_id":"T1","lat":37.7749,"lng":-122.4194}
//! ← {"type":"ack","op":"announce-online","delivered":3}
//! → {"type":"subscribe","region":{"lat":37.77,"lng":-122.42,"radius_km":5}}
//! ← {"type":"vendor-moved","id":"T1","position":{"lat":37.775,"lng":-122.419}}
//! ```

use serde::{Deserialize, Serialize};

use crate::geo::Position;
use crate::registry::{BroadcastEvent, DisplayMeta, NearbyVendor, TrackerError, VendorId};

/// Circular region requested by a viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Vendor comes online; binds the connection to `vendor_id`
    AnnounceOnline {
        vendor_id: String,
        lat: f64,
        lng: f64,
    },
    /// Online vendor reports a new position
    ReportPosition {
        vendor_id: String,
        lat: f64,
        lng: f64,
    },
    /// Vendor goes offline
    AnnounceOffline { vendor_id: String },
    /// Viewer subscribes; no region means every vendor
    Subscribe {
        #[serde(default)]
        region: Option<RegionRequest>,
    },
    /// Viewer stops receiving events
    Unsubscribe,
    /// One-shot proximity query
    FindNearby {
        lat: f64,
        lng: f64,
        #[serde(default)]
        radius_km: Option<f64>,
    },
    /// Keepalive
    Ping,
}

impl ClientMessage {
    /// Wire name of the message type
    pub fn op(&self) -> &'static str {
        match self {
            ClientMessage::AnnounceOnline { .. } => "announce-online",
            ClientMessage::ReportPosition { .. } => "report-position",
            ClientMessage::AnnounceOffline { .. } => "announce-offline",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe => "unsubscribe",
            ClientMessage::FindNearby { .. } => "find-nearby",
            ClientMessage::Ping => "ping",
        }
    }
}

/// Error categories reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidInput,
    NotOnline,
    UnknownVendor,
    Unauthorized,
    Protocol,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::NotOnline => "not-online",
            ErrorKind::UnknownVendor => "unknown-vendor",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

impl From<&TrackerError> for ErrorKind {
    fn from(err: &TrackerError) -> Self {
        match err {
            TrackerError::InvalidInput(_) => ErrorKind::InvalidInput,
            TrackerError::NotOnline(_) => ErrorKind::NotOnline,
            TrackerError::UnknownVendor(_) => ErrorKind::UnknownVendor,
            TrackerError::NotOwner(_) => ErrorKind::Unauthorized,
        }
    }
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    VendorOnline {
        id: VendorId,
        position: Position,
        #[serde(rename = "displayMeta")]
        display_meta: DisplayMeta,
    },
    VendorMoved {
        id: VendorId,
        position: Position,
    },
    VendorOffline {
        id: VendorId,
    },
    /// A request was applied
    Ack {
        op: String,
        #[serde(default)]
        delivered: usize,
    },
    /// Answer to `find-nearby`
    Nearby { results: Vec<NearbyVendor> },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn ack(op: &str, delivered: usize) -> Self {
        ServerMessage::Ack {
            op: op.to_string(),
            delivered,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            kind,
            message: message.into(),
        }
    }

    /// Whether this is a pushed vendor event rather than a reply
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            ServerMessage::VendorOnline { .. }
                | ServerMessage::VendorMoved { .. }
                | ServerMessage::VendorOffline { .. }
        )
    }
}

impl From<&TrackerError> for ServerMessage {
    fn from(err: &TrackerError) -> Self {
        ServerMessage::error(ErrorKind::from(err), err.to_string())
    }
}

impl From<&BroadcastEvent> for ServerMessage {
    fn from(event: &BroadcastEvent) -> Self {
        match event {
            BroadcastEvent::VendorOnline {
                vendor_id,
                position,
                meta,
            } => ServerMessage::VendorOnline {
                id: vendor_id.clone(),
                position: *position,
                display_meta: meta.clone(),
            },
            BroadcastEvent::VendorMoved {
                vendor_id,
                position,
            } => ServerMessage::VendorMoved {
                id: vendor_id.clone(),
                position: *position,
            },
            BroadcastEvent::VendorOffline { vendor_id, .. } => ServerMessage::VendorOffline {
                id: vendor_id.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "announce-online",
            "vendor_id": "T1",
            "lat": 37.7749,
            "lng": -122.4194
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::AnnounceOnline {
                vendor_id: "T1".into(),
                lat: 37.7749,
                lng: -122.4194
            }
        );
        assert_eq!(msg.op(), "announce-online");

        let unsub: ClientMessage = serde_json::from_value(json!({"type": "unsubscribe"})).unwrap();
        assert_eq!(unsub, ClientMessage::Unsubscribe);
    }

    #[test]
    fn test_optional_fields_default() {
        let sub: ClientMessage = serde_json::from_value(json!({"type": "subscribe"})).unwrap();
        assert_eq!(sub, ClientMessage::Subscribe { region: None });

        let query: ClientMessage =
            serde_json::from_value(json!({"type": "find-nearby", "lat": 1.0, "lng": 2.0})).unwrap();
        assert_eq!(
            query,
            ClientMessage::FindNearby {
                lat: 1.0,
                lng: 2.0,
                radius_km: None
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_value::<ClientMessage>(json!({"type": "teleport"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_offline_event_hides_last_position() {
        let event = BroadcastEvent::VendorOffline {
            vendor_id: VendorId::parse("T1").unwrap(),
            last_position: Position::new(1.0, 2.0).unwrap(),
        };
        let value = serde_json::to_value(ServerMessage::from(&event)).unwrap();
        assert_eq!(value, json!({"type": "vendor-offline", "id": "T1"}));
    }

    #[test]
    fn test_online_event_shape() {
        let event = BroadcastEvent::VendorOnline {
            vendor_id: VendorId::parse("T1").unwrap(),
            position: Position::new(1.0, 2.0).unwrap(),
            meta: DisplayMeta::named("Tacos"),
        };
        let value = serde_json::to_value(ServerMessage::from(&event)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "vendor-online",
                "id": "T1",
                "position": {"lat": 1.0, "lng": 2.0},
                "displayMeta": {"name": "Tacos"}
            })
        );
    }

    #[test]
    fn test_error_from_tracker_error() {
        let err = TrackerError::NotOnline(VendorId::parse("T1").unwrap());
        match ServerMessage::from(&err) {
            ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotOnline),
            other => panic!("unexpected {:?}", other),
        }

        let err = TrackerError::NotOwner(VendorId::parse("T1").unwrap());
        assert_eq!(ErrorKind::from(&err), ErrorKind::Unauthorized);
    }
}
