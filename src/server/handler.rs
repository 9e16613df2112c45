//! Integration hooks
//!
//! Implement [`TrackerHandler`] to authorize vendors and viewers, attach
//! display metadata to announcements, or observe connection lifecycle.
//! Every method has a default, so an empty `impl` accepts everything.

use std::future::Future;

use crate::geo::Position;
use crate::registry::{DisplayMeta, SubscriptionFilter, VendorId};
use crate::session::SessionContext;

/// Result of an authorization hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Allow the request
    Accept,
    /// Refuse the request with a reason sent back to the client
    Reject(String),
}

impl AuthResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, AuthResult::Accept)
    }
}

/// Callbacks invoked by the server
///
/// ```no_run
/// use vendor_beacon::server::handler::{AuthResult, TrackerHandler};
/// use vendor_beacon::session::SessionContext;
/// use vendor_beacon::{DisplayMeta, Position, VendorId};
///
/// struct Registered;
///
/// impl TrackerHandler for Registered {
///     async fn on_vendor_online(
///         &self,
///         _ctx: &SessionContext,
///         vendor_id: &VendorId,
///         _position: Position,
///     ) -> AuthResult {
///         if vendor_id.as_str().starts_with("truck-") {
///             AuthResult::Accept
///         } else {
///             AuthResult::Reject("unregistered vendor".into())
///         }
///     }
///
///     async fn vendor_profile(&self, vendor_id: &VendorId) -> Option<DisplayMeta> {
///         Some(DisplayMeta::named(vendor_id.as_str()))
///     }
/// }
/// ```
pub trait TrackerHandler: Send + Sync + 'static {
    /// A TCP connection was accepted; return false to drop it
    fn on_connection(&self, _ctx: &SessionContext) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// A vendor asks to go online
    fn on_vendor_online(
        &self,
        _ctx: &SessionContext,
        _vendor_id: &VendorId,
        _position: Position,
    ) -> impl Future<Output = AuthResult> + Send {
        async { AuthResult::Accept }
    }

    /// A viewer asks to subscribe
    fn on_subscribe(
        &self,
        _ctx: &SessionContext,
        _filter: &SubscriptionFilter,
    ) -> impl Future<Output = AuthResult> + Send {
        async { AuthResult::Accept }
    }

    /// Display metadata attached to the vendor's online event
    fn vendor_profile(
        &self,
        _vendor_id: &VendorId,
    ) -> impl Future<Output = Option<DisplayMeta>> + Send {
        async { None }
    }

    /// The connection closed, after the vendor and viewer were cleaned up
    fn on_disconnect(&self, _ctx: &SessionContext) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Handler that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

impl TrackerHandler for DefaultHandler {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn ctx() -> SessionContext {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        SessionContext::new(1, addr)
    }

    #[tokio::test]
    async fn test_default_handler_accepts() {
        let handler = DefaultHandler;
        let id = VendorId::parse("T1").unwrap();
        let pos = Position::new(0.0, 0.0).unwrap();

        assert!(handler.on_connection(&ctx()).await);
        assert!(handler.on_vendor_online(&ctx(), &id, pos).await.is_accept());
        assert!(handler
            .on_subscribe(&ctx(), &SubscriptionFilter::Unfiltered)
            .await
            .is_accept());
        assert_eq!(handler.vendor_profile(&id).await, None);
    }
}
