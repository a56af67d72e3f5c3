//! XPUB subscription monitoring over the in-process fabric.
//!
//! A subscriber endpoint changes its subscriptions while a publish client
//! watches them and only publishes on channels someone listens to.
//!
//! Run this example:
//! ```bash
//! RUST_LOG=debug cargo run --example xpub_subscription_monitor
//! ```

use pubcontrol::inproc::{bind_sub, inproc_context};
use pubcontrol::prelude::*;
use std::time::Duration;
use tracing::{info, Level};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let subscriber = bind_sub("inproc://events")?;

    let options = ClientOptions::new("inproc://events-control")
        .with_pub_uri("inproc://events")
        .with_require_subscriptions(true);
    let client = PublishClient::new(options, Some(inproc_context()))?;
    info!("Client connected with {:?}", client.socket_type());

    let monitor = client.monitor_subscriptions(|event: &SubscriptionEvent| {
        info!(
            "subscription event: {} {}",
            event.kind(),
            String::from_utf8_lossy(event.channel())
        );
    })?;

    subscriber.subscribe("events.");
    subscriber.subscribe("events.");
    subscriber.subscribe("alerts.");
    std::thread::sleep(Duration::from_millis(100));

    for channel in ["events.login", "alerts.disk", "metrics.cpu"] {
        let known = monitor.subscriptions().iter().any(|prefix| channel.as_bytes().starts_with(prefix));
        if !known {
            info!("Skipping {} (no subscriber)", channel);
            continue;
        }
        let item = Item::new().with_format("http-stream", Value::from(channel));
        client.publish(channel, &item, false, None)?;
    }

    while let Some(frames) = subscriber.recv_timeout(Duration::from_millis(100)) {
        info!(
            "Received on {}: {} bytes",
            String::from_utf8_lossy(&frames[0]),
            frames[1].len()
        );
    }

    subscriber.unsubscribe("alerts.");
    std::thread::sleep(Duration::from_millis(100));
    info!("Still subscribed: {:?}", monitor.subscriptions());

    monitor.stop()?;
    Ok(())
}
