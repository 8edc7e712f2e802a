// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end pub/sub across two participants over the in-process
//! transport: matched delivery, ordering, stateless broadcast, teardown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rtps_core::transport::mem::{MemHub, MemTransport};
use rtps_core::transport::Transport;
use rtps_core::{
    Endpoint, EngineConfig, Error, Participant, ReaderQos, Sample, WriterQos,
};

fn config() -> EngineConfig {
    EngineConfig {
        heartbeat_period: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

/// Poll `take()` until `expected` samples arrived or the deadline passes.
fn collect_samples(reader: &rtps_core::Reader, expected: usize) -> Vec<Sample> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut samples = Vec::new();
    while samples.len() < expected {
        samples.extend(reader.take());
        assert!(
            Instant::now() < deadline,
            "timed out with {}/{} samples",
            samples.len(),
            expected
        );
        std::thread::sleep(Duration::from_millis(2));
    }
    samples
}

#[test]
fn test_reliable_roundtrip_in_order() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_locator = sub_transport.local_locator();
    let pub_locator = pub_transport.local_locator();

    let publisher = Participant::new(config(), pub_transport);
    let subscriber = Participant::new(config(), sub_transport);

    let writer = publisher
        .create_writer("sensors/temp", &WriterQos::reliable(), vec![])
        .expect("writer");
    let reader = subscriber
        .create_reader("sensors/temp", &ReaderQos::reliable(), vec![])
        .expect("reader");

    // Discovery is external: wire the match both ways by hand.
    writer.match_reader(reader.guid(), sub_locator, true);
    reader.match_writer(writer.guid(), pub_locator);

    for payload in [&b"a"[..], b"bb", b"ccc"] {
        writer.write(payload).expect("write");
    }

    let samples = collect_samples(&reader, 3);
    let seqs: Vec<i64> = samples.iter().map(|s| s.change.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(samples[2].change.payload, b"ccc");
    assert!(samples.iter().all(|s| !s.preceded_by_gap));
    assert!(samples.iter().all(|s| !s.change.source_timestamp.is_invalid()));

    publisher.destroy();
    subscriber.destroy();
}

#[test]
fn test_best_effort_roundtrip() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_locator = sub_transport.local_locator();

    let publisher = Participant::new(config(), pub_transport);
    let subscriber = Participant::new(config(), sub_transport);

    let writer = publisher
        .create_writer("telemetry", &WriterQos::best_effort(), vec![])
        .expect("writer");
    let reader = subscriber
        .create_reader("telemetry", &ReaderQos::best_effort(), vec![])
        .expect("reader");

    writer.match_reader(reader.guid(), sub_locator, false);
    // Best-effort readers accept from any writer; no reverse match needed.

    writer.write(b"sample").expect("write");
    let samples = collect_samples(&reader, 1);
    assert_eq!(samples[0].change.payload, b"sample");

    publisher.destroy();
    subscriber.destroy();
}

#[test]
fn test_stateless_writer_fans_out_to_every_locator() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sink_a = MemTransport::attach(&hub);
    let sink_b = MemTransport::attach(&hub);
    let sink_c = MemTransport::attach(&hub);

    let publisher = Participant::new(config(), pub_transport);
    let writer = publisher
        .create_stateless_writer(
            "announcements",
            8,
            vec![
                sink_a.local_locator(),
                sink_b.local_locator(),
                sink_c.local_locator(),
            ],
        )
        .expect("stateless writer");

    writer.write(b"hello").expect("write");

    for sink in [&sink_a, &sink_b, &sink_c] {
        let mut buf = [0u8; 1024];
        let (len, _source) = sink.recv_blocking(&mut buf).expect("broadcast datagram");
        assert_eq!(&buf[0..4], b"RTPS");
        assert!(len > 20);
    }

    publisher.destroy();
}

#[test]
fn test_payload_bytes_survive_the_wire_unchanged() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_locator = sub_transport.local_locator();
    let pub_locator = pub_transport.local_locator();

    let publisher = Participant::new(config(), pub_transport);
    let subscriber = Participant::new(config(), sub_transport);

    let writer = publisher
        .create_writer("blobs", &WriterQos::reliable(), vec![])
        .expect("writer");
    let reader = subscriber
        .create_reader("blobs", &ReaderQos::reliable(), vec![])
        .expect("reader");
    writer.match_reader(reader.guid(), sub_locator, true);
    reader.match_writer(writer.guid(), pub_locator);

    fastrand::seed(7);
    let payloads: Vec<Vec<u8>> = (0..8)
        .map(|_| {
            let len = fastrand::usize(1..2048);
            (0..len).map(|_| fastrand::u8(..)).collect()
        })
        .collect();

    for payload in &payloads {
        writer.write(payload).expect("write");
    }

    let samples = collect_samples(&reader, payloads.len());
    for (sample, payload) in samples.iter().zip(&payloads) {
        assert_eq!(&sample.change.payload, payload);
    }

    publisher.destroy();
    subscriber.destroy();
}

#[test]
fn test_writers_number_sequences_independently() {
    let publisher = Participant::new(config(), Arc::new(MemTransport::new()));

    let w1 = publisher
        .create_writer("a", &WriterQos::reliable(), vec![])
        .expect("writer");
    let w2 = publisher
        .create_writer("b", &WriterQos::reliable(), vec![])
        .expect("writer");

    assert_eq!(w1.write(b"x").expect("write").sequence_number, 1);
    assert_eq!(w1.write(b"x").expect("write").sequence_number, 2);
    assert_eq!(w2.write(b"y").expect("write").sequence_number, 1);

    publisher.destroy();
}

#[test]
fn test_destroy_stops_endpoint_creation() {
    let participant = Participant::new(config(), Arc::new(MemTransport::new()));
    participant.destroy();

    assert!(matches!(
        participant.create_writer("t", &WriterQos::reliable(), vec![]),
        Err(Error::NotRunning)
    ));
    assert!(matches!(
        participant.create_reader("t", &ReaderQos::reliable(), vec![]),
        Err(Error::NotRunning)
    ));
}

#[test]
fn test_queued_sends_survive_teardown() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sink = MemTransport::attach(&hub);

    let publisher = Participant::new(config(), pub_transport);
    let writer = publisher
        .create_stateless_writer("announcements", 8, vec![sink.local_locator()])
        .expect("writer");

    writer.write(b"parting words").expect("write");
    publisher.destroy();

    let mut buf = [0u8; 1024];
    let (_len, _source) = sink
        .recv_blocking(&mut buf)
        .expect("drained before stop, not discarded");
    assert_eq!(&buf[0..4], b"RTPS");
}

#[test]
fn test_datagram_for_unknown_endpoint_is_routine() {
    let hub = MemHub::new();
    let pub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_transport = Arc::new(MemTransport::attach(&hub));
    let sub_locator = sub_transport.local_locator();

    let publisher = Participant::new(config(), pub_transport);
    let subscriber = Participant::new(config(), sub_transport);

    // No reader exists on the subscriber: traffic must be dropped quietly
    // and the contexts must stay alive.
    let writer = publisher
        .create_writer("t", &WriterQos::best_effort(), vec![])
        .expect("writer");
    let fake_reader = rtps_core::Guid::new([0x44; 12], [0, 0, 9, 0x04]);
    writer.match_reader(fake_reader, sub_locator, false);
    writer.write(b"niemand").expect("write");

    std::thread::sleep(Duration::from_millis(50));

    // The subscriber still works afterwards.
    let reader = subscriber
        .create_reader("t", &ReaderQos::best_effort(), vec![])
        .expect("reader");
    writer.match_reader(reader.guid(), sub_locator, false);
    writer.write(b"jemand").expect("write");
    let samples = collect_samples(&reader, 1);
    assert_eq!(samples[0].change.payload, b"jemand");

    publisher.destroy();
    subscriber.destroy();
}
