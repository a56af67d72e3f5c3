//! Interop tests against plain libzmq peers.
//!
//! Each test binds a libzmq PULL or XSUB socket and drives it through the
//! pubcontrol socket wrapper. Subscribers are XSUB so subscription frames
//! are sent explicitly, the way a bound downstream proxy does.

use bytes::Bytes;
use pubcontrol_core::endpoint::Endpoint;
use pubcontrol_core::socket_type::SocketType;
use pubcontrol_core::transport::{PollState, Socket, Transport};
use pubcontrol_zmq::ZmqTransport;
use std::time::{Duration, Instant};

fn recv_control(socket: &mut Box<dyn Socket>, timeout: Duration) -> Option<Bytes> {
    let signal = socket.ready_signal().expect("xpub has a ready signal");
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(frame) = socket.try_recv().unwrap() {
            return Some(frame);
        }
        if signal.wait_readable(Duration::from_millis(50)) == PollState::Closed {
            return None;
        }
    }
    None
}

#[test]
fn test_push_to_libzmq_pull_inproc() {
    let ctx = zmq::Context::new();
    let pull = ctx.socket(zmq::PULL).unwrap();
    pull.set_rcvtimeo(2000).unwrap();
    pull.bind("inproc://interop-push").unwrap();

    let transport = ZmqTransport::new(ctx.clone());
    let mut push = transport.socket(SocketType::Push).unwrap();
    push.set_linger(None).unwrap();
    push.connect(&Endpoint::parse("inproc://interop-push").unwrap())
        .unwrap();

    push.send(Bytes::from_static(b"5:hello,")).unwrap();

    let frame = pull.recv_bytes(0).unwrap();
    assert_eq!(frame, b"5:hello,");
    assert!(!pull.get_rcvmore().unwrap());
}

#[test]
fn test_push_to_libzmq_pull_tcp() {
    let port = portpicker::pick_unused_port().expect("free port");
    let ctx = zmq::Context::new();
    let pull = ctx.socket(zmq::PULL).unwrap();
    pull.set_rcvtimeo(2000).unwrap();
    pull.bind(&format!("tcp://127.0.0.1:{}", port)).unwrap();

    let transport = ZmqTransport::new(ctx.clone());
    let mut push = transport.socket(SocketType::Push).unwrap();
    push.set_linger(None).unwrap();
    push.connect(&Endpoint::parse(&format!("tcp://127.0.0.1:{}", port)).unwrap())
        .unwrap();

    push.send(Bytes::from_static(b"0:~")).unwrap();
    assert_eq!(pull.recv_bytes(0).unwrap(), b"0:~");
}

#[test]
fn test_xpub_reports_libzmq_subscriptions() {
    let port = portpicker::pick_unused_port().expect("free port");
    let uri = format!("tcp://127.0.0.1:{}", port);
    let ctx = zmq::Context::new();
    let xsub = ctx.socket(zmq::XSUB).unwrap();
    xsub.set_rcvtimeo(2000).unwrap();
    xsub.bind(&uri).unwrap();

    let transport = ZmqTransport::new(ctx.clone());
    let mut xpub = transport.socket(SocketType::XPub).unwrap();
    xpub.set_linger(None).unwrap();
    xpub.set_recv_hwm(0).unwrap();
    xpub.connect(&Endpoint::parse(&uri).unwrap()).unwrap();

    xsub.send(&b"\x01news"[..], 0).unwrap();
    let frame = recv_control(&mut xpub, Duration::from_secs(5)).expect("subscribe frame");
    assert_eq!(frame.as_ref(), b"\x01news");

    xpub.send_multipart(vec![Bytes::from_static(b"news"), Bytes::from_static(b"0:}")])
        .unwrap();
    let parts = xsub.recv_multipart(0).unwrap();
    assert_eq!(parts, vec![b"news".to_vec(), b"0:}".to_vec()]);

    xsub.send(&b"\x00news"[..], 0).unwrap();
    let frame = recv_control(&mut xpub, Duration::from_secs(5)).expect("unsubscribe frame");
    assert_eq!(frame.as_ref(), b"\x00news");
}

#[test]
fn test_xpub_disconnect() {
    let port = portpicker::pick_unused_port().expect("free port");
    let endpoint = Endpoint::parse(&format!("tcp://127.0.0.1:{}", port)).unwrap();
    let ctx = zmq::Context::new();
    let xsub = ctx.socket(zmq::XSUB).unwrap();
    xsub.bind(&endpoint.to_string()).unwrap();

    let transport = ZmqTransport::new(ctx.clone());
    let mut xpub = transport.socket(SocketType::XPub).unwrap();
    xpub.set_linger(None).unwrap();
    xpub.connect(&endpoint).unwrap();

    xpub.disconnect(&endpoint).unwrap();
    // libzmq reports ENOENT for an endpoint that is no longer connected
    assert!(xpub.disconnect(&endpoint).unwrap_err().is_connection_error());
}

#[test]
fn test_close_wakes_ready_signal() {
    let ctx = zmq::Context::new();
    let transport = ZmqTransport::new(ctx);
    let mut xpub = transport.socket(SocketType::XPub).unwrap();
    let signal = xpub.ready_signal().unwrap();

    xpub.close().unwrap();
    assert_eq!(
        signal.wait_readable(Duration::from_millis(20)),
        PollState::Closed
    );
}
