//! Performance benchmarks for wire processing.
//!
//! These benchmarks measure the hot paths a connection exercises on every
//! frame:
//! - Envelope serialization
//! - Inbound frame classification
//! - Envelope encryption/decryption in cipher mode

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use protocol::{CommandRequest, EnvelopeCipher, InboundFrame, FIRST_COMMAND_INDEX};

fn payload_of(len: usize) -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Benchmark outbound envelope serialization.
fn bench_envelope_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_serialization");

    // Small request (typical control command)
    let small = CommandRequest::new("echo", FIRST_COMMAND_INDEX, json!({"msg": "hi"}));
    let small_len = small.to_json().unwrap().len();
    group.throughput(Throughput::Bytes(small_len as u64));
    group.bench_function("small_request", |b| {
        b.iter(|| black_box(&small).to_json().unwrap());
    });

    // Large request (bulk parameter blob)
    let large = CommandRequest::new(
        "configPush",
        FIRST_COMMAND_INDEX,
        json!({"blob": payload_of(4096)}),
    );
    let large_len = large.to_json().unwrap().len();
    group.throughput(Throughput::Bytes(large_len as u64));
    group.bench_function("large_request_4KB", |b| {
        b.iter(|| black_box(&large).to_json().unwrap());
    });

    group.finish();
}

/// Benchmark inbound frame classification.
fn bench_inbound_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("inbound_classification");

    let reply = json!({
        "index": 1042,
        "result": "success",
        "resultData": {"msg": "hi"},
    })
    .to_string();
    group.throughput(Throughput::Bytes(reply.len() as u64));
    group.bench_function("small_reply", |b| {
        b.iter(|| InboundFrame::classify(black_box(&reply)).unwrap());
    });

    let broadcast = json!({
        "command": "broadcast",
        "target": "telemetry",
        "samples": payload_of(4096),
    })
    .to_string();
    group.throughput(Throughput::Bytes(broadcast.len() as u64));
    group.bench_function("broadcast_4KB", |b| {
        b.iter(|| InboundFrame::classify(black_box(&broadcast)).unwrap());
    });

    group.finish();
}

/// Benchmark envelope encryption and decryption.
fn bench_envelope_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_cipher");
    let cipher = EnvelopeCipher::new("rack-7", "private key material");

    for (name, len) in [("small_64B", 64), ("medium_4KB", 4096), ("large_64KB", 65536)] {
        let plaintext = payload_of(len);
        let ciphertext = cipher.encrypt(&plaintext);

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("encrypt_{name}"), |b| {
            b.iter(|| cipher.encrypt(black_box(&plaintext)));
        });
        group.bench_function(format!("decrypt_{name}"), |b| {
            b.iter(|| cipher.decrypt(black_box(&ciphertext)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_envelope_serialization,
    bench_inbound_classification,
    bench_envelope_cipher,
);

criterion_main!(benches);
