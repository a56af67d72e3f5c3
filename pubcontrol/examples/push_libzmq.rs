//! Publish over PUSH to a libzmq PULL socket.
//!
//! Run this example:
//! ```bash
//! cargo run --example push_libzmq --features zmq
//! ```

use pubcontrol::prelude::*;
use pubcontrol::tnetstring;
use pubcontrol::zmq::global_context;
use tracing::{info, Level};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    // A consumer in the same process must share the global context
    let pull = global_context().socket(zmq::PULL)?;
    pull.bind("inproc://push-demo")?;

    let options = ClientOptions::new("tcp://127.0.0.1:5563").with_push_uri("inproc://push-demo");
    let client = PublishClient::new(options, None)?;

    for i in 0..3i64 {
        let item = Item::new()
            .with_id(i.to_string())
            .with_format("json-object", Value::Int(i));
        client.publish("demo", &item, false, None)?;
    }

    for _ in 0..3 {
        let raw = pull.recv_bytes(0)?;
        let value = tnetstring::decode(&raw.into())?;
        info!("Received {:?}", value);
    }

    client.close()?;
    Ok(())
}
