//! PublishClient and PubController against plain libzmq consumers.

use bytes::Bytes;
use pubcontrol::prelude::*;
use pubcontrol::zmq::{global_context, zmq_context, ZmqTransport};
use pubcontrol::Context;
use std::sync::mpsc;
use std::time::Duration;

fn stream_item(content: &str) -> Item {
    let mut format = Dict::new();
    format.insert("content".into(), Value::from(content));
    Item::new().with_format("http-stream", Value::Dict(format))
}

#[test]
fn test_push_reaches_libzmq_pull() {
    pubcontrol::dev_tracing::init_tracing();
    let ctx = zmq::Context::new();
    let pull = ctx.socket(zmq::PULL).unwrap();
    pull.set_rcvtimeo(2000).unwrap();
    pull.bind("inproc://interop-client-push").unwrap();

    let options = ClientOptions::new("tcp://127.0.0.1:5563")
        .with_push_uri("inproc://interop-client-push");
    let client = PublishClient::new(options, Some(Context::new(ZmqTransport::new(ctx.clone()))))
        .unwrap();
    assert_eq!(client.socket_type(), Some(SocketType::Push));

    client.publish("test", &stream_item("hi"), false, None).unwrap();
    assert_eq!(
        pull.recv_bytes(0).unwrap(),
        b"51:7:channel,4:test,11:http-stream,15:7:content,2:hi,}}".to_vec()
    );
}

/// Bound XSUB peer on a fresh tcp port, as a downstream proxy would run it.
fn bound_xsub(ctx: &zmq::Context) -> (zmq::Socket, String) {
    let port = portpicker::pick_unused_port().expect("free port");
    let endpoint = format!("tcp://127.0.0.1:{}", port);
    let xsub = ctx.socket(zmq::XSUB).unwrap();
    xsub.set_rcvtimeo(5000).unwrap();
    xsub.bind(&endpoint).unwrap();
    (xsub, endpoint)
}

#[test]
fn test_xpub_monitor_sees_libzmq_subscriber() {
    pubcontrol::dev_tracing::init_tracing();
    let ctx = zmq::Context::new();
    let (xsub, endpoint) = bound_xsub(&ctx);

    let options = ClientOptions::new("tcp://127.0.0.1:5563").with_pub_uri(endpoint);
    let client = PublishClient::new(options, Some(Context::new(ZmqTransport::new(ctx.clone()))))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let monitor = client
        .monitor_subscriptions(move |event: &SubscriptionEvent| {
            let _ = tx.send((event.kind(), event.channel().clone()));
        })
        .unwrap();

    xsub.send(&b"\x01news"[..], 0).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ("sub", Bytes::from_static(b"news"))
    );
    assert!(monitor.is_subscribed("news"));

    client.publish("news", &stream_item("hi"), false, None).unwrap();
    let parts = xsub.recv_multipart(0).unwrap();
    assert_eq!(parts[0], b"news".to_vec());
    assert_eq!(
        parts[1],
        b"34:11:http-stream,15:7:content,2:hi,}}".to_vec()
    );

    xsub.send(&b"\x00news"[..], 0).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ("unsub", Bytes::from_static(b"news"))
    );
    assert!(!monitor.is_subscribed("news"));

    monitor.stop().unwrap();
    assert!(!client.is_connected());
}

#[test]
fn test_controller_over_libzmq() {
    pubcontrol::dev_tracing::init_tracing();
    let ctx = zmq::Context::new();
    let (xsub, endpoint) = bound_xsub(&ctx);

    let (tx, rx) = mpsc::channel();
    let controller = PubController::new(
        Some(Context::new(ZmqTransport::new(ctx.clone()))),
        move |event: &SubscriptionEvent| {
            let _ = tx.send((event.kind(), event.channel().clone()));
        },
    )
    .unwrap();
    controller.connect(&endpoint).unwrap();

    xsub.send(&b"\x01news"[..], 0).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ("sub", Bytes::from_static(b"news"))
    );

    controller.publish("news", "hello").unwrap();
    assert_eq!(
        xsub.recv_multipart(0).unwrap(),
        vec![b"news".to_vec(), b"hello".to_vec()]
    );

    controller.disconnect(&endpoint).unwrap();
    controller.stop().unwrap();
}

#[test]
fn test_default_context_is_global_libzmq() {
    let options = ClientOptions::new("tcp://127.0.0.1:5563");
    let client = PublishClient::new(options, None).unwrap();
    assert!(client.context().same_as(&zmq_context()));
    assert_eq!(client.context().name(), "libzmq");

    // The raw context stays usable for in-process peers
    assert!(global_context().socket(zmq::PULL).is_ok());
}
