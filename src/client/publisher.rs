//! Vendor publisher
//!
//! High-level API for a vendor app: go online, stream position reports,
//! go offline.

use tokio::net::ToSocketAddrs;

use crate::error::Result;
use crate::protocol::ClientMessage;

use super::connector::TrackerConnector;

/// Publishes one vendor's presence and position
///
/// # Example
/// ```no_run
/// use vendor_beacon::client::VendorPublisher;
///
/// # async fn example() -> vendor_beacon::error::Result<()> {
/// let mut publisher = VendorPublisher::connect("127.0.0.1:7878", "T1").await?;
///
/// publisher.announce(37.7749, -122.4194).await?;
/// publisher.report(37.7755, -122.4190).await?;
/// publisher.offline().await?;
/// # Ok(())
/// # }
/// ```
pub struct VendorPublisher {
    connector: TrackerConnector,
    vendor_id: String,
    online: bool,
}

impl VendorPublisher {
    /// Connect to the server on behalf of `vendor_id`
    pub async fn connect<A: ToSocketAddrs>(addr: A, vendor_id: impl Into<String>) -> Result<Self> {
        let connector = TrackerConnector::connect(addr).await?;
        Ok(Self::with_connector(connector, vendor_id))
    }

    /// Publish over an existing connection
    pub fn with_connector(connector: TrackerConnector, vendor_id: impl Into<String>) -> Self {
        Self {
            connector,
            vendor_id: vendor_id.into(),
            online: false,
        }
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    /// Whether the last announce succeeded and no offline followed
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Go online at a position
    ///
    /// Returns how many viewers received the `vendor-online` event.
    pub async fn announce(&mut self, lat: f64, lng: f64) -> Result<usize> {
        let delivered = self
            .connector
            .expect_ack(&ClientMessage::AnnounceOnline {
                vendor_id: self.vendor_id.clone(),
                lat,
                lng,
            })
            .await?;

        self.online = true;
        Ok(delivered)
    }

    /// Report a new position
    pub async fn report(&mut self, lat: f64, lng: f64) -> Result<usize> {
        self.connector
            .expect_ack(&ClientMessage::ReportPosition {
                vendor_id: self.vendor_id.clone(),
                lat,
                lng,
            })
            .await
    }

    /// Go offline; the connection stays open
    pub async fn offline(&mut self) -> Result<usize> {
        let delivered = self
            .connector
            .expect_ack(&ClientMessage::AnnounceOffline {
                vendor_id: self.vendor_id.clone(),
            })
            .await?;

        self.online = false;
        Ok(delivered)
    }

    /// Access the underlying connection
    pub fn connector(&mut self) -> &mut TrackerConnector {
        &mut self.connector
    }

    /// Close the connection; the server takes the vendor offline
    pub async fn disconnect(self) -> Result<()> {
        self.connector.shutdown().await
    }
}
