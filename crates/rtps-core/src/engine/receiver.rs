// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound message demultiplexer.
//!
//! Given one fully received datagram, decodes the header, then walks the
//! submessages in wire order, carrying interpretation state across them:
//! source GUID prefix (message header), destination prefix (INFO_DST),
//! and source timestamp (INFO_TS). Each submessage is dispatched to the
//! local endpoint named by its destination entity id; `ENTITYID_UNKNOWN`
//! fans out to every candidate endpoint.
//!
//! No reordering happens here: ordering across datagrams is the endpoint
//! state machines' job. Unresolvable destinations are silently dropped
//! (routine in multicast); malformed datagrams are dropped whole.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::cache::CacheChange;
use crate::core::types::{Guid, GuidPrefix, Locator, Time, ENTITYID_UNKNOWN, GUID_PREFIX_UNKNOWN, TIME_INVALID};
use crate::endpoint::EndpointRegistry;
use crate::protocol::codec::WireReader;
use crate::protocol::rtps::{
    AckNackSubmessage, DataSubmessage, GapSubmessage, HeartbeatSubmessage,
    InfoDestinationSubmessage, InfoTimestampSubmessage, MessageHeader, SubmessageHeader,
};
use crate::protocol::{
    SUBMESSAGE_ACKNACK, SUBMESSAGE_DATA, SUBMESSAGE_GAP, SUBMESSAGE_HEADER_SIZE,
    SUBMESSAGE_HEARTBEAT, SUBMESSAGE_INFO_DST, SUBMESSAGE_INFO_TS, SUBMESSAGE_PAD,
};
use crate::Result;

/// Receive-path counters. Relaxed atomics; consumers only need monotonic
/// snapshots.
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    pub messages_processed: AtomicU64,
    pub submessages_dispatched: AtomicU64,
    pub malformed_dropped: AtomicU64,
    pub unmatched_dropped: AtomicU64,
}

impl ReceiverMetrics {
    /// (processed, dispatched, malformed, unmatched).
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.messages_processed.load(Ordering::Relaxed),
            self.submessages_dispatched.load(Ordering::Relaxed),
            self.malformed_dropped.load(Ordering::Relaxed),
            self.unmatched_dropped.load(Ordering::Relaxed),
        )
    }
}

/// Demultiplexes decoded datagrams to local endpoints.
pub struct MessageReceiver {
    participant_prefix: GuidPrefix,
    registry: Arc<EndpointRegistry>,
    metrics: Arc<ReceiverMetrics>,

    // Per-message interpretation state, reset for every datagram.
    source_guid_prefix: GuidPrefix,
    source_version: (u8, u8),
    source_vendor_id: [u8; 2],
    dest_guid_prefix: GuidPrefix,
    timestamp: Option<Time>,
}

impl MessageReceiver {
    pub(crate) fn new(participant_prefix: GuidPrefix, registry: Arc<EndpointRegistry>) -> Self {
        Self {
            participant_prefix,
            registry,
            metrics: Arc::new(ReceiverMetrics::default()),
            source_guid_prefix: GUID_PREFIX_UNKNOWN,
            source_version: (0, 0),
            source_vendor_id: [0, 0],
            dest_guid_prefix: GUID_PREFIX_UNKNOWN,
            timestamp: None,
        }
    }

    pub fn metrics(&self) -> Arc<ReceiverMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one datagram. Never fails: malformed input is counted and
    /// dropped whole, with no partial application.
    pub fn process_message(&mut self, bytes: &[u8], source: &Locator) {
        match self.try_process(bytes) {
            Ok(()) => {
                self.metrics
                    .messages_processed
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[RECEIVER] Dropping malformed datagram ({} bytes) from {:?}",
                    bytes.len(),
                    source.to_socket_addr()
                );
            }
        }
    }

    fn reset(&mut self) {
        self.source_guid_prefix = GUID_PREFIX_UNKNOWN;
        self.source_version = (0, 0);
        self.source_vendor_id = [0, 0];
        self.dest_guid_prefix = self.participant_prefix;
        self.timestamp = None;
    }

    fn try_process(&mut self, bytes: &[u8]) -> Result<()> {
        let mut rdr = WireReader::new(bytes);
        let header = MessageHeader::decode(&mut rdr)?;

        if header.guid_prefix == self.participant_prefix {
            // Our own multicast loopback.
            log::trace!("[RECEIVER] Ignoring self-originated message");
            return Ok(());
        }

        self.reset();
        self.source_guid_prefix = header.guid_prefix;
        self.source_version = header.version;
        self.source_vendor_id = header.vendor_id;

        while rdr.remaining() > 0 {
            if rdr.remaining() < SUBMESSAGE_HEADER_SIZE {
                return Err(crate::Error::MalformedMessage);
            }

            let sub = SubmessageHeader::decode(&mut rdr)?;
            // Zero length: body extends to the end of the message and this
            // is the final submessage.
            let body_len = if sub.octets_to_next == 0 {
                rdr.remaining()
            } else {
                usize::from(sub.octets_to_next)
            };
            let mut body = rdr.sub_reader(body_len)?;

            match sub.id {
                SUBMESSAGE_DATA => self.handle_data(sub.flags, &mut body)?,
                SUBMESSAGE_GAP => self.handle_gap(sub.flags, &mut body)?,
                SUBMESSAGE_HEARTBEAT => self.handle_heartbeat(sub.flags, &mut body)?,
                SUBMESSAGE_ACKNACK => self.handle_acknack(sub.flags, &mut body)?,
                SUBMESSAGE_INFO_TS => {
                    let ts = InfoTimestampSubmessage::decode(sub.flags, &mut body)?;
                    self.timestamp = ts.timestamp;
                }
                SUBMESSAGE_INFO_DST => {
                    let dst = InfoDestinationSubmessage::decode(sub.flags, &mut body)?;
                    self.dest_guid_prefix = dst.guid_prefix;
                }
                SUBMESSAGE_PAD => {}
                unknown => {
                    // Forward compatibility: skip by declared length.
                    log::trace!(
                        "[RECEIVER] Skipping unknown submessage kind {:#04x} ({} bytes)",
                        unknown,
                        body_len
                    );
                }
            }

            if sub.octets_to_next == 0 {
                break;
            }
        }

        Ok(())
    }

    /// Whether the current destination context names this participant.
    fn addressed_to_us(&self) -> bool {
        self.dest_guid_prefix == self.participant_prefix
            || self.dest_guid_prefix == GUID_PREFIX_UNKNOWN
    }

    fn handle_data(&self, flags: u8, body: &mut WireReader<'_>) -> Result<()> {
        let data = DataSubmessage::decode(flags, body)?;
        if !self.addressed_to_us() {
            return Ok(());
        }

        let change = CacheChange {
            kind: data.change_kind(),
            writer_guid: Guid::new(self.source_guid_prefix, data.writer_id),
            sequence_number: data.writer_sn,
            source_timestamp: self.timestamp.unwrap_or(TIME_INVALID),
            payload: data.payload.unwrap_or_default(),
        };

        let mut dispatched = 0u64;
        if data.reader_id == ENTITYID_UNKNOWN {
            for entry in self.registry.readers.iter() {
                entry.value().process_data(change.clone());
                dispatched += 1;
            }
        } else if let Some(reader) = self.registry.readers.get(&data.reader_id) {
            reader.value().process_data(change);
            dispatched = 1;
        }

        self.account_dispatch(dispatched, "DATA");
        Ok(())
    }

    fn handle_gap(&self, flags: u8, body: &mut WireReader<'_>) -> Result<()> {
        let gap = GapSubmessage::decode(flags, body)?;
        if !self.addressed_to_us() {
            return Ok(());
        }

        let writer_guid = Guid::new(self.source_guid_prefix, gap.writer_id);
        let irrelevant = gap.irrelevant_sequences();

        let mut dispatched = 0u64;
        if gap.reader_id == ENTITYID_UNKNOWN {
            for entry in self.registry.readers.iter() {
                entry.value().process_gap(writer_guid, &irrelevant);
                dispatched += 1;
            }
        } else if let Some(reader) = self.registry.readers.get(&gap.reader_id) {
            reader.value().process_gap(writer_guid, &irrelevant);
            dispatched = 1;
        }

        self.account_dispatch(dispatched, "GAP");
        Ok(())
    }

    fn handle_heartbeat(&self, flags: u8, body: &mut WireReader<'_>) -> Result<()> {
        let hb = HeartbeatSubmessage::decode(flags, body)?;
        if !self.addressed_to_us() {
            return Ok(());
        }

        let writer_guid = Guid::new(self.source_guid_prefix, hb.writer_id);

        let mut dispatched = 0u64;
        if hb.reader_id == ENTITYID_UNKNOWN {
            for entry in self.registry.readers.iter() {
                entry.value().process_heartbeat(
                    writer_guid,
                    hb.first_sn,
                    hb.last_sn,
                    hb.count,
                    hb.final_flag,
                );
                dispatched += 1;
            }
        } else if let Some(reader) = self.registry.readers.get(&hb.reader_id) {
            reader.value().process_heartbeat(
                writer_guid,
                hb.first_sn,
                hb.last_sn,
                hb.count,
                hb.final_flag,
            );
            dispatched = 1;
        }

        self.account_dispatch(dispatched, "HEARTBEAT");
        Ok(())
    }

    fn handle_acknack(&self, flags: u8, body: &mut WireReader<'_>) -> Result<()> {
        let acknack = AckNackSubmessage::decode(flags, body)?;
        if !self.addressed_to_us() {
            return Ok(());
        }

        let reader_guid = Guid::new(self.source_guid_prefix, acknack.reader_id);

        let mut dispatched = 0u64;
        if acknack.writer_id == ENTITYID_UNKNOWN {
            for entry in self.registry.writers.iter() {
                entry.value().process_acknack(
                    reader_guid,
                    &acknack.reader_sn_state,
                    acknack.count,
                    acknack.final_flag,
                );
                dispatched += 1;
            }
        } else if let Some(writer) = self.registry.writers.get(&acknack.writer_id) {
            writer.value().process_acknack(
                reader_guid,
                &acknack.reader_sn_state,
                acknack.count,
                acknack.final_flag,
            );
            dispatched = 1;
        }

        self.account_dispatch(dispatched, "ACKNACK");
        Ok(())
    }

    fn account_dispatch(&self, dispatched: u64, kind: &str) {
        if dispatched == 0 {
            self.metrics.unmatched_dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!("[RECEIVER] No local endpoint for {} submessage", kind);
        } else {
            self.metrics
                .submessages_dispatched
                .fetch_add(dispatched, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderQos;
    use crate::core::types::ChangeKind;
    use crate::endpoint::Reader;
    use crate::engine::test_support::queue;
    use crate::protocol::builder::MessageBuilder;

    const REMOTE_PREFIX: GuidPrefix = [9; 12];
    const LOCAL_PREFIX: GuidPrefix = [1; 12];
    const READER_ID: [u8; 4] = [0, 0, 1, 0x04];
    const WRITER_ID: [u8; 4] = [0, 0, 1, 0x03];

    fn source() -> Locator {
        Locator::udpv4([127, 0, 0, 1], 7700)
    }

    fn setup() -> (MessageReceiver, Arc<Reader>, Arc<EndpointRegistry>) {
        let registry = Arc::new(EndpointRegistry::default());
        let (tx, _rx) = queue();
        let reader = Arc::new(
            Reader::new(
                Guid::new(LOCAL_PREFIX, READER_ID),
                "t",
                &ReaderQos::reliable(),
                vec![],
                tx,
            )
            .expect("reader"),
        );
        reader.match_writer(Guid::new(REMOTE_PREFIX, WRITER_ID), source());
        registry.readers.insert(READER_ID, Arc::clone(&reader));

        let receiver = MessageReceiver::new(LOCAL_PREFIX, Arc::clone(&registry));
        (receiver, reader, registry)
    }

    fn data_message(seq: i64) -> Vec<u8> {
        let data = DataSubmessage::new(
            READER_ID,
            WRITER_ID,
            seq,
            ChangeKind::Alive,
            vec![seq as u8],
        );
        MessageBuilder::new(REMOTE_PREFIX)
            .info_ts(Time::now())
            .data(&data)
            .build()
    }

    #[test]
    fn test_data_routed_to_reader() {
        let (mut receiver, reader, _registry) = setup();
        receiver.process_message(&data_message(1), &source());

        let samples = reader.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].change.sequence_number, 1);
        assert_eq!(
            samples[0].change.writer_guid,
            Guid::new(REMOTE_PREFIX, WRITER_ID)
        );
        assert!(!samples[0].change.source_timestamp.is_invalid());
        assert_eq!(receiver.metrics().snapshot().0, 1);
    }

    #[test]
    fn test_data_with_unknown_reader_id_fans_out() {
        let (mut receiver, reader, _registry) = setup();
        let data = DataSubmessage::new(
            ENTITYID_UNKNOWN,
            WRITER_ID,
            1,
            ChangeKind::Alive,
            vec![1],
        );
        let bytes = MessageBuilder::new(REMOTE_PREFIX).data(&data).build();
        receiver.process_message(&bytes, &source());

        assert_eq!(reader.take().len(), 1);
    }

    #[test]
    fn test_unknown_submessage_kind_is_skipped_not_fatal() {
        let (mut receiver, reader, _registry) = setup();

        // Hand-build: header + unknown submessage (valid length) + DATA.
        let mut bytes = MessageBuilder::new(REMOTE_PREFIX).build();
        bytes.extend_from_slice(&[0x42, 0x01, 0x04, 0x00]); // unknown id, len 4
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let data = DataSubmessage::new(READER_ID, WRITER_ID, 1, ChangeKind::Alive, vec![7]);
        let tail = MessageBuilder::new(REMOTE_PREFIX).data(&data).build();
        bytes.extend_from_slice(&tail[20..]); // skip the second header

        receiver.process_message(&bytes, &source());
        assert_eq!(reader.take().len(), 1, "DATA after unknown kind still lands");
        assert_eq!(receiver.metrics().snapshot().2, 0, "nothing malformed");
    }

    #[test]
    fn test_overrunning_submessage_length_drops_datagram() {
        let (mut receiver, reader, _registry) = setup();

        let mut bytes = data_message(1);
        // Claim a body longer than the datagram.
        let data_header = 20 + 12; // message header + INFO_TS
        bytes[data_header + 2..data_header + 4].copy_from_slice(&0x7FFFu16.to_le_bytes());

        receiver.process_message(&bytes, &source());
        assert!(reader.take().is_empty());
        assert_eq!(receiver.metrics().snapshot().2, 1);
    }

    #[test]
    fn test_info_dst_for_other_participant_suppresses_dispatch() {
        let (mut receiver, reader, _registry) = setup();

        let data = DataSubmessage::new(READER_ID, WRITER_ID, 1, ChangeKind::Alive, vec![1]);
        let bytes = MessageBuilder::new(REMOTE_PREFIX)
            .info_dst([0x55; 12]) // someone else
            .data(&data)
            .build();

        receiver.process_message(&bytes, &source());
        assert!(reader.take().is_empty());
    }

    #[test]
    fn test_info_dst_broadcast_reaches_us() {
        let (mut receiver, reader, _registry) = setup();

        let data = DataSubmessage::new(READER_ID, WRITER_ID, 1, ChangeKind::Alive, vec![1]);
        let bytes = MessageBuilder::new(REMOTE_PREFIX)
            .info_dst(GUID_PREFIX_UNKNOWN)
            .data(&data)
            .build();

        receiver.process_message(&bytes, &source());
        assert_eq!(reader.take().len(), 1);
    }

    #[test]
    fn test_self_originated_message_ignored() {
        let (mut receiver, reader, _registry) = setup();

        let data = DataSubmessage::new(READER_ID, WRITER_ID, 1, ChangeKind::Alive, vec![1]);
        let bytes = MessageBuilder::new(LOCAL_PREFIX).data(&data).build();

        receiver.process_message(&bytes, &source());
        assert!(reader.take().is_empty());
    }

    #[test]
    fn test_unmatched_destination_is_counted_not_fatal() {
        let (mut receiver, _reader, _registry) = setup();

        let data = DataSubmessage::new(
            [0, 0, 9, 0x04], // no such reader
            WRITER_ID,
            1,
            ChangeKind::Alive,
            vec![1],
        );
        let bytes = MessageBuilder::new(REMOTE_PREFIX).data(&data).build();
        receiver.process_message(&bytes, &source());

        let (processed, _, malformed, unmatched) = receiver.metrics().snapshot();
        assert_eq!(processed, 1);
        assert_eq!(malformed, 0);
        assert_eq!(unmatched, 1);
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let (mut receiver, _reader, _registry) = setup();
        receiver.process_message(b"RTP", &source());
        assert_eq!(receiver.metrics().snapshot().2, 1);
    }

    #[test]
    fn test_timestamp_context_applies_until_overridden() {
        let (mut receiver, reader, _registry) = setup();

        let ts = Time {
            seconds: 1000,
            fraction: 0,
        };
        let d1 = DataSubmessage::new(READER_ID, WRITER_ID, 1, ChangeKind::Alive, vec![1]);
        let d2 = DataSubmessage::new(READER_ID, WRITER_ID, 2, ChangeKind::Alive, vec![2]);
        let bytes = MessageBuilder::new(REMOTE_PREFIX)
            .info_ts(ts)
            .data(&d1)
            .data(&d2)
            .build();

        receiver.process_message(&bytes, &source());
        let samples = reader.take();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].change.source_timestamp, ts);
        assert_eq!(samples[1].change.source_timestamp, ts);
    }
}
