//! Full round trips over TCP against a live server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_test::assert_ok;

use vendor_beacon::client::{TrackerConnector, VendorPublisher, ViewerClient};
use vendor_beacon::protocol::{ClientMessage, ErrorKind, ServerMessage};
use vendor_beacon::server::handler::{AuthResult, TrackerHandler};
use vendor_beacon::session::SessionContext;
use vendor_beacon::{
    DefaultHandler, DisplayMeta, Error, Position, ServerConfig, TrackerServer, VendorId,
};

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn start<H: TrackerHandler>(handler: H) -> TestServer {
    start_with(ServerConfig::default(), handler).await
}

async fn start_with<H: TrackerHandler>(config: ServerConfig, handler: H) -> TestServer {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(TrackerServer::new(config, handler));
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        addr,
        shutdown: Some(tx),
    }
}

async fn next_event(viewer: &mut ViewerClient) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), viewer.next_event())
        .await
        .expect("event timed out")
        .unwrap()
}

fn rejected_kind(err: Error) -> ErrorKind {
    match err {
        Error::Rejected { kind, .. } => kind,
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_vendor_lifecycle_reaches_viewer() {
    let server = start(DefaultHandler).await;

    let mut viewer = assert_ok!(ViewerClient::connect(server.addr).await);
    assert_ok!(viewer.subscribe_region(37.77, -122.42, 5.0).await);

    let mut truck = assert_ok!(VendorPublisher::connect(server.addr, "T1").await);
    assert_eq!(assert_ok!(truck.announce(37.7749, -122.4194).await), 1);

    match next_event(&mut viewer).await {
        ServerMessage::VendorOnline { id, position, .. } => {
            assert_eq!(id.as_str(), "T1");
            assert_eq!(position, Position::new(37.7749, -122.4194).unwrap());
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(assert_ok!(truck.report(37.7755, -122.4190).await), 1);
    match next_event(&mut viewer).await {
        ServerMessage::VendorMoved { id, position } => {
            assert_eq!(id.as_str(), "T1");
            assert_eq!(position.lat(), 37.7755);
        }
        other => panic!("unexpected {:?}", other),
    }

    let mut searcher = assert_ok!(ViewerClient::connect(server.addr).await);
    let nearby = assert_ok!(searcher.find_nearby(37.7749, -122.4194, Some(1.0)).await);
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].vendor_id.as_str(), "T1");
    assert_eq!(nearby[0].distance_km, 0.1);

    // Dropping the connection takes the vendor offline
    assert_ok!(truck.disconnect().await);
    match next_event(&mut viewer).await {
        ServerMessage::VendorOffline { id } => assert_eq!(id.as_str(), "T1"),
        other => panic!("unexpected {:?}", other),
    }

    let nearby = assert_ok!(searcher.find_nearby(37.7749, -122.4194, None).await);
    assert!(nearby.is_empty());
}

#[tokio::test]
async fn test_region_filter_and_unsubscribe() {
    let server = start(DefaultHandler).await;

    let mut near = assert_ok!(ViewerClient::connect(server.addr).await);
    assert_ok!(near.subscribe_region(0.0, 0.0, 5.0).await);
    let mut everyone = assert_ok!(ViewerClient::connect(server.addr).await);
    assert_ok!(everyone.subscribe_all().await);

    let mut far = assert_ok!(VendorPublisher::connect(server.addr, "far").await);
    assert_eq!(assert_ok!(far.announce(1.0, 0.0).await), 1);
    assert!(matches!(
        next_event(&mut everyone).await,
        ServerMessage::VendorOnline { .. }
    ));

    let mut close = assert_ok!(VendorPublisher::connect(server.addr, "close").await);
    assert_eq!(assert_ok!(close.announce(0.01, 0.0).await), 2);
    for viewer in [&mut near, &mut everyone] {
        match next_event(viewer).await {
            ServerMessage::VendorOnline { id, .. } => assert_eq!(id.as_str(), "close"),
            other => panic!("unexpected {:?}", other),
        }
    }

    assert_ok!(everyone.unsubscribe().await);
    assert_eq!(assert_ok!(close.offline().await), 1);
    assert!(!close.is_online());

    assert_ok!(everyone.ping().await);
    assert_eq!(everyone.connector().pending_events(), 0);
}

#[tokio::test]
async fn test_rejections_are_reported() {
    let server = start(DefaultHandler).await;
    let mut truck = assert_ok!(VendorPublisher::connect(server.addr, "T1").await);

    let err = truck.report(1.0, 1.0).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::NotOnline);

    let err = truck.announce(91.0, 0.0).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::InvalidInput);

    assert_ok!(truck.announce(1.0, 1.0).await);

    // A connection speaks for a single vendor
    let connector = assert_ok!(TrackerConnector::connect(server.addr).await);
    let mut other = VendorPublisher::with_connector(connector, "T2");
    assert_ok!(other.announce(2.0, 2.0).await);
    let hijack = ClientMessage::AnnounceOnline {
        vendor_id: "T1".into(),
        lat: 2.0,
        lng: 2.0,
    };
    let err = other.connector().expect_ack(&hijack).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::InvalidInput);

    let mut viewer = assert_ok!(ViewerClient::connect(server.addr).await);
    let err = viewer.find_nearby(0.0, 0.0, Some(-1.0)).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_unbound_connection_cannot_touch_vendor() {
    let server = start(DefaultHandler).await;
    let mut truck = assert_ok!(VendorPublisher::connect(server.addr, "T1").await);
    assert_ok!(truck.announce(10.0, 10.0).await);

    let mut stranger = assert_ok!(TrackerConnector::connect(server.addr).await);
    let moved = ClientMessage::ReportPosition {
        vendor_id: "T1".into(),
        lat: 11.0,
        lng: 11.0,
    };
    let err = stranger.expect_ack(&moved).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::Unauthorized);

    let offline = ClientMessage::AnnounceOffline {
        vendor_id: "T1".into(),
    };
    let err = stranger.expect_ack(&offline).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::Unauthorized);

    let mut searcher = assert_ok!(ViewerClient::connect(server.addr).await);
    let nearby = assert_ok!(searcher.find_nearby(10.0, 10.0, Some(1.0)).await);
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].distance_km, 0.0);

    // The owner still reports normally
    assert_ok!(truck.report(10.001, 10.0).await);
}

#[tokio::test]
async fn test_quiet_viewer_outlives_idle_timeout() {
    let config = ServerConfig::default().idle_timeout(Duration::from_millis(200));
    let server = start_with(config, DefaultHandler).await;

    let mut viewer = assert_ok!(ViewerClient::connect(server.addr).await);
    assert_ok!(viewer.subscribe_region(0.0, 0.0, 5.0).await);
    let mut idler = assert_ok!(TrackerConnector::connect(server.addr).await);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let mut truck = assert_ok!(VendorPublisher::connect(server.addr, "T1").await);
    assert_eq!(assert_ok!(truck.announce(0.0, 0.0).await), 1);
    match next_event(&mut viewer).await {
        ServerMessage::VendorOnline { id, .. } => assert_eq!(id.as_str(), "T1"),
        other => panic!("unexpected {:?}", other),
    }
    assert_ok!(viewer.ping().await);

    // A connection without a subscription is still dropped
    assert!(idler.request(&ClientMessage::Ping).await.is_err());
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let server = start(DefaultHandler).await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half
        .write_all(b"this is not json\n{\"type\":\"ping\"}\n")
        .await
        .unwrap();

    let first = lines.next_line().await.unwrap().unwrap();
    let reply: ServerMessage = serde_json::from_str(&first).unwrap();
    assert!(matches!(
        reply,
        ServerMessage::Error {
            kind: ErrorKind::Protocol,
            ..
        }
    ));

    let second = lines.next_line().await.unwrap().unwrap();
    assert_eq!(second, r#"{"type":"pong"}"#);
}

struct Gatekeeper;

impl TrackerHandler for Gatekeeper {
    async fn on_vendor_online(
        &self,
        _ctx: &SessionContext,
        vendor_id: &VendorId,
        _position: Position,
    ) -> AuthResult {
        if vendor_id.as_str().starts_with("truck-") {
            AuthResult::Accept
        } else {
            AuthResult::Reject("unregistered vendor".into())
        }
    }

    async fn vendor_profile(&self, vendor_id: &VendorId) -> Option<DisplayMeta> {
        Some(DisplayMeta::named(format!("{} kitchen", vendor_id)))
    }
}

#[tokio::test]
async fn test_handler_authorizes_and_decorates() {
    let server = start(Gatekeeper).await;

    let mut viewer = assert_ok!(ViewerClient::connect(server.addr).await);
    assert_ok!(viewer.subscribe_all().await);

    let mut rogue = assert_ok!(VendorPublisher::connect(server.addr, "rogue").await);
    let err = rogue.announce(0.0, 0.0).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::Unauthorized);

    let mut truck = assert_ok!(VendorPublisher::connect(server.addr, "truck-7").await);
    assert_ok!(truck.announce(0.0, 0.0).await);

    match next_event(&mut viewer).await {
        ServerMessage::VendorOnline { id, display_meta, .. } => {
            assert_eq!(id.as_str(), "truck-7");
            assert_eq!(display_meta.name, "truck-7 kitchen");
        }
        other => panic!("unexpected {:?}", other),
    }

    let nearby = assert_ok!(viewer.find_nearby(0.0, 0.0, None).await);
    assert_eq!(nearby[0].meta.name, "truck-7 kitchen");
}
