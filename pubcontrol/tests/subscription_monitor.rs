//! Subscription monitor behavior over the in-process fabric.

use bytes::Bytes;
use pubcontrol::inproc::{bind_sub, inproc_context, SubEndpoint};
use pubcontrol::prelude::*;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

type Events = mpsc::Receiver<(&'static str, Bytes)>;

fn xpub_client(name: &str) -> (SubEndpoint, PublishClient) {
    pubcontrol::dev_tracing::init_tracing();
    let uri = format!("inproc://{}", name);
    let sub = bind_sub(&uri).unwrap();
    let options = ClientOptions::new(format!("inproc://{}-control", name)).with_pub_uri(uri);
    let client = PublishClient::new(options, Some(inproc_context())).unwrap();
    (sub, client)
}

fn monitor(client: &PublishClient) -> (SubscriptionMonitor, Events) {
    let (tx, rx) = mpsc::channel();
    let monitor = client
        .monitor_subscriptions(move |event: &SubscriptionEvent| {
            let _ = tx.send((event.kind(), event.channel().clone()));
        })
        .unwrap();
    (monitor, rx)
}

fn next(events: &Events) -> (&'static str, Bytes) {
    events.recv_timeout(TIMEOUT).expect("expected a subscription event")
}

fn event(kind: &'static str, channel: &'static str) -> (&'static str, Bytes) {
    (kind, Bytes::from_static(channel.as_bytes()))
}

#[test]
fn test_subscribe_is_reported() {
    let (sub, client) = xpub_client("monitor-subscribe");
    let (monitor, events) = monitor(&client);
    assert!(monitor.is_running());

    sub.subscribe("news");
    assert_eq!(next(&events), event("sub", "news"));
    assert!(monitor.is_subscribed("news"));
    assert_eq!(monitor.subscriptions(), vec![Bytes::from_static(b"news")]);
}

#[test]
fn test_duplicate_subscribe_is_suppressed() {
    let (sub, client) = xpub_client("monitor-duplicate");
    let (_monitor, events) = monitor(&client);

    sub.subscribe("news");
    sub.subscribe("news");
    sub.subscribe("sports");

    assert_eq!(next(&events), event("sub", "news"));
    assert_eq!(next(&events), event("sub", "sports"));
    assert!(events.recv_timeout(QUIET).is_err());
}

#[test]
fn test_unsubscribe_without_subscribe_still_notifies() {
    let (sub, client) = xpub_client("monitor-unsub-unknown");
    let (monitor, events) = monitor(&client);

    sub.unsubscribe("ghost");
    assert_eq!(next(&events), event("unsub", "ghost"));
    assert!(!monitor.is_subscribed("ghost"));

    // Repeated unsubscribes are all reported
    sub.unsubscribe("ghost");
    assert_eq!(next(&events), event("unsub", "ghost"));
}

#[test]
fn test_events_keep_receive_order() {
    let (sub, client) = xpub_client("monitor-order");
    let (monitor, events) = monitor(&client);

    sub.subscribe("a");
    sub.unsubscribe("a");
    sub.subscribe("a");

    assert_eq!(next(&events), event("sub", "a"));
    assert_eq!(next(&events), event("unsub", "a"));
    assert_eq!(next(&events), event("sub", "a"));
    assert!(monitor.is_subscribed("a"));
}

#[test]
fn test_malformed_frames_are_ignored() {
    let (sub, client) = xpub_client("monitor-malformed");
    let (_monitor, events) = monitor(&client);

    sub.send_control(Bytes::new());
    sub.send_control(Bytes::from_static(b"\x02weird"));
    sub.send_control(Bytes::from_static(b"\x01news"));

    assert_eq!(next(&events), event("sub", "news"));
    assert!(events.recv_timeout(QUIET).is_err());
}

#[test]
fn test_binary_channel_is_reported_raw() {
    let (sub, client) = xpub_client("monitor-binary");
    let (monitor, events) = monitor(&client);

    sub.send_control(Bytes::from_static(b"\x01\xff\x00"));
    assert_eq!(next(&events), ("sub", Bytes::from_static(b"\xff\x00")));
    assert!(monitor.is_subscribed(b"\xff\x00"));
}

#[test]
fn test_existing_subscriptions_are_reported_on_connect() {
    pubcontrol::dev_tracing::init_tracing();
    let uri = "inproc://monitor-replay";
    let sub = bind_sub(uri).unwrap();
    sub.subscribe("early");

    let options = ClientOptions::new("inproc://monitor-replay-control").with_pub_uri(uri);
    let client = PublishClient::new(options, Some(inproc_context())).unwrap();
    let (_monitor, events) = monitor(&client);

    assert_eq!(next(&events), event("sub", "early"));
}

#[test]
fn test_client_close_ends_monitor() {
    let (_sub, client) = xpub_client("monitor-client-close");
    let (monitor, _events) = monitor(&client);
    assert!(monitor.is_running());

    client.close().unwrap();
    monitor.join().unwrap();
}

#[test]
fn test_stop_ends_monitor_and_client_reconnects() {
    let (sub, client) = xpub_client("monitor-stop");
    let (monitor, events) = monitor(&client);

    monitor.stop().unwrap();
    assert!(!client.is_connected());

    sub.subscribe("late");
    assert!(events.recv_timeout(QUIET).is_err());

    client
        .publish("late", &Item::new(), false, None)
        .unwrap();
    assert!(client.is_connected());
    let frames = sub.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(frames[0].as_ref(), b"late");
}

#[test]
fn test_new_monitor_after_reconnect() {
    let (sub, client) = xpub_client("monitor-reconnect");
    let (first, _first_events) = monitor(&client);
    client.close().unwrap();
    first.join().unwrap();

    client.connect().unwrap();
    let (second, events) = monitor(&client);
    sub.subscribe("again");
    assert_eq!(next(&events), event("sub", "again"));
    assert!(second.is_running());
}

#[test]
fn test_monitor_needs_xpub() {
    pubcontrol::dev_tracing::init_tracing();
    let options = ClientOptions::new("inproc://monitor-unconnected-control");
    let client = PublishClient::new(options, Some(inproc_context())).unwrap();

    // No transport configured: connect fails before any monitor starts
    let err = client
        .monitor_subscriptions(|_: &SubscriptionEvent| {})
        .unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_publish_while_monitoring() {
    let (sub, client) = xpub_client("monitor-concurrent");
    let client = Arc::new(client);
    let (_monitor, events) = monitor(&client);
    sub.subscribe("load");
    assert_eq!(next(&events), event("sub", "load"));

    let publisher = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            for i in 0..50i64 {
                let item = Item::new().with_format("n", Value::Int(i));
                client.publish("load", &item, false, None).unwrap();
            }
        })
    };
    for i in 0..20 {
        sub.subscribe(format!("extra-{}", i));
    }
    publisher.join().unwrap();

    for i in 0..20 {
        let (kind, channel) = next(&events);
        assert_eq!(kind, "sub");
        assert_eq!(channel, Bytes::from(format!("extra-{}", i)));
    }

    let mut received = 0;
    while sub.recv_timeout(QUIET).is_some() {
        received += 1;
    }
    assert_eq!(received, 50);
}
