//! Simple tracker server example
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:7878
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:7878
//!   cargo run --example simple_server 127.0.0.1:7879     # binds to 127.0.0.1:7879
//!
//! ## Talking to it by hand
//!
//! ```text
//! $ nc localhost 7878
//! {"type":"subscribe","region":{"lat":37.77,"lng":-122.42,"radius_km":5}}
//! {"type":"ack","op":"subscribe","delivered":0}
//! ```
//!
//! In another terminal:
//!
//! ```text
//! $ nc localhost 7878
//! {"type":"announce-online","vendor_id":"T1","lat":37.7749,"lng":-122.4194}
//! {"type":"report-position","vendor_id":"T1","lat":37.7755,"lng":-122.4190}
//! {"type":"find-nearby","lat":37.7749,"lng":-122.4194,"radius_km":1}
//! ```
//!
//! Or run `cargo run --example vendor_sim` to drive a few simulated trucks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use vendor_beacon::protocol::constants::DEFAULT_PORT;
use vendor_beacon::registry::SubscriptionFilter;
use vendor_beacon::server::handler::{AuthResult, TrackerHandler};
use vendor_beacon::session::SessionContext;
use vendor_beacon::{DisplayMeta, Position, ServerConfig, TrackerConfig, TrackerServer, VendorId};

/// Handler that logs lifecycle events and names vendors
struct MyHandler {
    vendors_seen: AtomicU64,
    viewers_seen: AtomicU64,
}

impl MyHandler {
    fn new() -> Self {
        Self {
            vendors_seen: AtomicU64::new(0),
            viewers_seen: AtomicU64::new(0),
        }
    }
}

impl TrackerHandler for MyHandler {
    async fn on_connection(&self, ctx: &SessionContext) -> bool {
        println!("[{}] New connection from {}", ctx.session_id, ctx.peer_addr);
        true
    }

    async fn on_vendor_online(
        &self,
        ctx: &SessionContext,
        vendor_id: &VendorId,
        position: Position,
    ) -> AuthResult {
        let total = self.vendors_seen.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "[{}] Vendor {} online at {} ({} announcements so far)",
            ctx.session_id, vendor_id, position, total
        );

        // Example: only allow registered vendors
        // if !vendor_id.as_str().starts_with("truck-") {
        //     return AuthResult::Reject("unregistered vendor".into());
        // }

        AuthResult::Accept
    }

    async fn on_subscribe(&self, ctx: &SessionContext, filter: &SubscriptionFilter) -> AuthResult {
        self.viewers_seen.fetch_add(1, Ordering::Relaxed);
        println!("[{}] Subscribe: {:?}", ctx.session_id, filter);
        AuthResult::Accept
    }

    async fn vendor_profile(&self, vendor_id: &VendorId) -> Option<DisplayMeta> {
        Some(DisplayMeta {
            name: format!("Truck {}", vendor_id),
            rating: Some(4.5),
            cuisine: Some("street food".into()),
        })
    }

    async fn on_disconnect(&self, ctx: &SessionContext) {
        println!(
            "[{}] Disconnected after {:?} ({} frames in, {} out)",
            ctx.session_id, ctx.stats.duration, ctx.stats.frames_received, ctx.stats.frames_sent
        );
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7878
/// - "localhost:7879" -> 127.0.0.1:7879
/// - "127.0.0.1" -> 127.0.0.1:7878
/// - "0.0.0.0:7878" -> 0.0.0.0:7878
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:7878)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vendor_beacon=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let tracker_config = TrackerConfig::default()
        .stale_vendor_timeout(Duration::from_secs(120))
        .cleanup_interval(Duration::from_secs(10));

    println!("Starting tracker on {}", config.bind_addr);

    let server = TrackerServer::with_tracker_config(config, MyHandler::new(), tracker_config);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let stats = server.tracker().stats();
    println!(
        "Applied {} updates, rejected {}, delivered {} events",
        stats.updates_applied, stats.updates_rejected, stats.deliveries
    );

    Ok(())
}
