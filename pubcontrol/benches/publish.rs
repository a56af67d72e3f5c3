//! Publish path benchmarks
//!
//! Measures envelope export + tnetstring encoding + send under the client
//! lock, over the in-process fabric so the numbers exclude any network I/O.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pubcontrol::inproc::{bind_pull, bind_sub, inproc_context};
use pubcontrol::prelude::*;
use pubcontrol::tnetstring;

const PAYLOAD_SIZES: &[usize] = &[64, 1024, 16384];
const BATCH: usize = 1_000;

fn item(size: usize) -> Item {
    let mut format = Dict::new();
    format.insert("content".into(), Value::from(vec![b'x'; size].as_slice()));
    Item::new()
        .with_id("1")
        .with_format("http-stream", Value::Dict(format))
}

fn encode_envelope(c: &mut Criterion) {
    pubcontrol::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("encode/envelope");

    for &size in PAYLOAD_SIZES {
        let envelope = item(size).export(true, true);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &envelope, |b, env| {
            b.iter(|| tnetstring::encode_dict(black_box(env)).unwrap());
        });
    }
    group.finish();
}

fn publish_push(c: &mut Criterion) {
    pubcontrol::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("publish/push");

    for &size in PAYLOAD_SIZES {
        let endpoint = format!("inproc://bench-push-{}", size);
        let pull = bind_pull(&endpoint).unwrap();
        let client = PublishClient::new(
            ClientOptions::new("inproc://bench-control").with_push_uri(endpoint.as_str()),
            Some(inproc_context()),
        )
        .unwrap();
        let item = item(size);

        group.throughput(Throughput::Elements(BATCH as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &item, |b, item| {
            b.iter(|| {
                for _ in 0..BATCH {
                    client.publish("bench", black_box(item), false, None).unwrap();
                }
                while pull.try_recv().is_some() {}
            });
        });
    }
    group.finish();
}

fn publish_xpub(c: &mut Criterion) {
    pubcontrol::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("publish/xpub");

    for &size in PAYLOAD_SIZES {
        let endpoint = format!("inproc://bench-xpub-{}", size);
        let sub = bind_sub(&endpoint).unwrap();
        sub.subscribe("bench");
        let client = PublishClient::new(
            ClientOptions::new("inproc://bench-control").with_pub_uri(endpoint.as_str()),
            Some(inproc_context()),
        )
        .unwrap();
        let _monitor = client
            .monitor_subscriptions(|_: &SubscriptionEvent| {})
            .unwrap();
        let item = item(size);

        group.throughput(Throughput::Elements(BATCH as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &item, |b, item| {
            b.iter(|| {
                for _ in 0..BATCH {
                    client.publish("bench", black_box(item), false, None).unwrap();
                }
                while sub.try_recv().is_some() {}
            });
        });
    }
    group.finish();
}

criterion_group!(benches, encode_envelope, publish_push, publish_xpub);
criterion_main!(benches);
