//! Simulated vendors and a viewer
//!
//! Run with: cargo run --example vendor_sim [SERVER_ADDR] [TRUCKS]
//!
//! Start `simple_server` first. Each truck drives a small loop around
//! downtown San Francisco, reporting its position every second, while a
//! viewer subscribed to a 2 km region prints what it sees.

use std::time::Duration;

use vendor_beacon::client::{VendorPublisher, ViewerClient};
use vendor_beacon::protocol::ServerMessage;

const CENTER: (f64, f64) = (37.7749, -122.4194);

/// Position of truck `n` after `step` ticks on its loop
fn truck_position(n: usize, step: u64) -> (f64, f64) {
    let radius = 0.005 + 0.004 * n as f64;
    let angle = (step as f64 * 0.2) + n as f64;
    (
        CENTER.0 + radius * angle.sin(),
        CENTER.1 + radius * angle.cos(),
    )
}

async fn drive(addr: String, n: usize) -> vendor_beacon::Result<()> {
    let vendor_id = format!("truck-{}", n);
    let mut truck = VendorPublisher::connect(addr.as_str(), vendor_id.as_str()).await?;

    let (lat, lng) = truck_position(n, 0);
    truck.announce(lat, lng).await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    for step in 1..=30 {
        ticker.tick().await;
        let (lat, lng) = truck_position(n, step);
        let delivered = truck.report(lat, lng).await?;
        tracing::debug!(vendor = %vendor_id, step = step, delivered = delivered, "Reported");
    }

    truck.offline().await?;
    truck.disconnect().await
}

async fn watch(addr: String) -> vendor_beacon::Result<()> {
    let mut viewer = ViewerClient::connect(addr.as_str()).await?;
    viewer.subscribe_region(CENTER.0, CENTER.1, 2.0).await?;

    loop {
        match viewer.next_event().await? {
            ServerMessage::VendorOnline {
                id,
                position,
                display_meta,
            } => println!("+ {} ({}) at {}", id, display_meta.name, position),
            ServerMessage::VendorMoved { id, position } => println!("> {} at {}", id, position),
            ServerMessage::VendorOffline { id } => println!("- {}", id),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vendor_beacon=info".parse()?)
                .add_directive("vendor_sim=debug".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let addr = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1:7878".into());
    let trucks: usize = match args.get(2) {
        Some(n) => n.parse()?,
        None => 3,
    };

    let watcher = tokio::spawn(watch(addr.clone()));

    let mut drivers = Vec::with_capacity(trucks);
    for n in 0..trucks {
        drivers.push(tokio::spawn(drive(addr.clone(), n)));
    }

    for driver in drivers {
        if let Err(e) = driver.await? {
            eprintln!("Truck failed: {}", e);
        }
    }

    let mut searcher = ViewerClient::connect(addr.as_str()).await?;
    let nearby = searcher.find_nearby(CENTER.0, CENTER.1, Some(5.0)).await?;
    println!("Vendors still online near downtown: {}", nearby.len());

    watcher.abort();
    Ok(())
}
