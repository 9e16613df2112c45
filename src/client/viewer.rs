//! Viewer client
//!
//! Subscribes to vendor events and runs proximity queries.

use tokio::net::ToSocketAddrs;

use crate::error::Result;
use crate::protocol::{ClientMessage, RegionRequest, ServerMessage};
use crate::registry::NearbyVendor;

use super::connector::{unexpected_reply, TrackerConnector};

/// Receives vendor events for a map view
///
/// # Example
/// ```no_run
/// use vendor_beacon::client::ViewerClient;
///
/// # async fn example() -> vendor_beacon::error::Result<()> {
/// let mut viewer = ViewerClient::connect("127.0.0.1:7878").await?;
/// viewer.subscribe_region(37.77, -122.42, 5.0).await?;
///
/// loop {
///     let event = viewer.next_event().await?;
///     println!("{:?}", event);
/// }
/// # }
/// ```
pub struct ViewerClient {
    connector: TrackerConnector,
}

impl ViewerClient {
    /// Connect to the server
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let connector = TrackerConnector::connect(addr).await?;
        Ok(Self { connector })
    }

    /// Subscribe to every vendor
    pub async fn subscribe_all(&mut self) -> Result<()> {
        self.subscribe(None).await
    }

    /// Subscribe to vendors within `radius_km` of a point
    pub async fn subscribe_region(&mut self, lat: f64, lng: f64, radius_km: f64) -> Result<()> {
        self.subscribe(Some(RegionRequest { lat, lng, radius_km })).await
    }

    /// Subscribe, replacing any previous subscription
    pub async fn subscribe(&mut self, region: Option<RegionRequest>) -> Result<()> {
        self.connector
            .expect_ack(&ClientMessage::Subscribe { region })
            .await?;
        Ok(())
    }

    /// Stop receiving events
    pub async fn unsubscribe(&mut self) -> Result<()> {
        self.connector.expect_ack(&ClientMessage::Unsubscribe).await?;
        Ok(())
    }

    /// Online vendors near a point, nearest first
    pub async fn find_nearby(
        &mut self,
        lat: f64,
        lng: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<NearbyVendor>> {
        let reply = self
            .connector
            .request(&ClientMessage::FindNearby { lat, lng, radius_km })
            .await?;

        match reply {
            ServerMessage::Nearby { results } => Ok(results),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Wait for the next vendor event
    pub async fn next_event(&mut self) -> Result<ServerMessage> {
        self.connector.next_event().await
    }

    /// Round-trip a ping
    pub async fn ping(&mut self) -> Result<()> {
        match self.connector.request(&ClientMessage::Ping).await? {
            ServerMessage::Pong => Ok(()),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Access the underlying connection
    pub fn connector(&mut self) -> &mut TrackerConnector {
        &mut self.connector
    }
}
