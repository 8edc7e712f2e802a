// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader endpoint.
//!
//! Accepts DATA/GAP/HEARTBEAT submessages routed by the message receiver.
//! Best-effort readers deliver on arrival and ignore the reliability
//! protocol entirely. Reliable readers buffer out-of-order arrivals,
//! track missing sequences per matched writer, answer heartbeats with
//! acknacks, and resolve GAPs into permanent losses.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::config::{ReaderQos, ReliabilityKind};
use crate::core::cache::{CacheChange, EvictionPolicy, HistoryCache};
use crate::core::types::{Guid, Locator, SequenceNumber};
use crate::engine::SendQueue;
use crate::protocol::builder::MessageBuilder;
use crate::protocol::rtps::{AckNackSubmessage, SequenceNumberSet, MAX_BITMAP_BITS};
use crate::reliability::{ReliableMetrics, WriterProxy};
use crate::{Error, Result};

use super::Endpoint;

/// One delivered change, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub change: CacheChange,
    /// A permanently-lost span immediately precedes this sample in the
    /// writer's sequence space (explicit gap notification).
    pub preceded_by_gap: bool,
}

struct ReaderInner {
    cache: HistoryCache,
    writers: BTreeMap<Guid, WriterProxy>,
    /// Highest sequence accepted per writer (best-effort path only).
    best_effort_high: BTreeMap<Guid, SequenceNumber>,
    delivered: VecDeque<Sample>,
}

/// Reader endpoint.
pub struct Reader {
    guid: Guid,
    topic: String,
    reliability: ReliabilityKind,
    ordered: bool,
    locators: Vec<Locator>,
    outbound: SendQueue,
    metrics: ReliableMetrics,
    inner: Mutex<ReaderInner>,
}

impl Reader {
    pub(crate) fn new(
        guid: Guid,
        topic: &str,
        qos: &ReaderQos,
        locators: Vec<Locator>,
        outbound: SendQueue,
    ) -> Result<Self> {
        if qos.history_depth == 0 {
            return Err(Error::InvalidQos("history depth must be >= 1"));
        }

        Ok(Self {
            guid,
            topic: topic.to_string(),
            reliability: qos.reliability,
            ordered: qos.ordered,
            locators,
            outbound,
            metrics: ReliableMetrics::new(),
            inner: Mutex::new(ReaderInner {
                cache: HistoryCache::new(qos.history_depth, EvictionPolicy::ForceEvict),
                writers: BTreeMap::new(),
                best_effort_high: BTreeMap::new(),
                delivered: VecDeque::new(),
            }),
        })
    }

    /// Accept one incoming change.
    ///
    /// Best-effort: deliver on arrival, no gap tracking. Reliable:
    /// out-of-order arrivals are stored and buffered; contiguous history
    /// is delivered when `ordered`, otherwise every accepted change is
    /// delivered immediately.
    pub fn process_data(&self, change: CacheChange) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match self.reliability {
            ReliabilityKind::BestEffort => {
                let high = inner
                    .best_effort_high
                    .entry(change.writer_guid)
                    .or_insert(0);
                if change.sequence_number <= *high {
                    log::trace!(
                        "[READER {}] best-effort drop stale seq={} from {}",
                        self.guid,
                        change.sequence_number,
                        change.writer_guid
                    );
                    return;
                }
                *high = change.sequence_number;

                if let Err(Error::DuplicateSequenceNumber) = inner.cache.add(change.clone()) {
                    return;
                }
                inner.delivered.push_back(Sample {
                    change,
                    preceded_by_gap: false,
                });
            }
            ReliabilityKind::Reliable => {
                let Some(proxy) = inner.writers.get_mut(&change.writer_guid) else {
                    log::trace!(
                        "[READER {}] DATA from unmatched writer {}",
                        self.guid,
                        change.writer_guid
                    );
                    return;
                };

                if !proxy.accept_data(change.sequence_number) {
                    log::trace!(
                        "[READER {}] duplicate/irrelevant seq={} from {}",
                        self.guid,
                        change.sequence_number,
                        change.writer_guid
                    );
                    return;
                }

                let writer_guid = change.writer_guid;
                if let Err(Error::DuplicateSequenceNumber) = inner.cache.add(change.clone()) {
                    return;
                }

                if self.ordered {
                    Self::drain_deliverable(
                        &mut inner.writers,
                        &inner.cache,
                        &mut inner.delivered,
                        writer_guid,
                    );
                } else {
                    inner.delivered.push_back(Sample {
                        change,
                        preceded_by_gap: false,
                    });
                }
            }
        }
    }

    /// Compare a heartbeat's available range against local state; emit an
    /// acknack for whatever is missing (reliable readers only).
    pub fn process_heartbeat(
        &self,
        writer_guid: Guid,
        first_sn: SequenceNumber,
        last_sn: SequenceNumber,
        count: u32,
        final_flag: bool,
    ) {
        if self.reliability != ReliabilityKind::Reliable {
            return;
        }

        let response = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let Some(proxy) = inner.writers.get_mut(&writer_guid) else {
                log::debug!(
                    "[READER {}] HEARTBEAT from unmatched writer {}",
                    self.guid,
                    writer_guid
                );
                return;
            };

            if !proxy.accept_heartbeat_count(count) {
                return;
            }

            let missing = proxy.update_from_heartbeat(first_sn, last_sn);
            let locator = proxy.locator;

            let sn_state = if missing.is_empty() {
                if final_flag {
                    None
                } else {
                    // Positive acknowledgment so the writer can advance its
                    // acknowledged floor.
                    Some(SequenceNumberSet::empty(proxy.highest_seen() + 1))
                }
            } else {
                let base = missing[0];
                let window: Vec<SequenceNumber> = missing
                    .iter()
                    .copied()
                    .take_while(|seq| seq - base < SequenceNumber::from(MAX_BITMAP_BITS))
                    .collect();
                SequenceNumberSet::from_sequences(base, &window)
            };

            let response = sn_state.map(|set| {
                let synced = set.is_empty();
                (set, proxy.next_acknack_count(), synced, locator)
            });

            // The lost set may have grown; newly contiguous history can
            // now be handed to the application.
            if self.ordered {
                Self::drain_deliverable(
                    &mut inner.writers,
                    &inner.cache,
                    &mut inner.delivered,
                    writer_guid,
                );
            }
            response
        };

        if let Some((sn_state, ack_count, synced, locator)) = response {
            let acknack = AckNackSubmessage::new(
                self.guid.entity_id,
                writer_guid.entity_id,
                sn_state,
                ack_count,
                synced,
            );
            let bytes = MessageBuilder::new(self.guid.prefix)
                .info_dst(writer_guid.prefix)
                .acknack(&acknack)
                .build();
            self.outbound.post(locator, bytes);
            self.metrics.record_acknacks(1);
        }
    }

    /// Mark sequences permanently unavailable: they leave the missing set
    /// and no future DATA is expected for them.
    pub fn process_gap(&self, writer_guid: Guid, irrelevant: &[SequenceNumber]) {
        if self.reliability != ReliabilityKind::Reliable {
            return;
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(proxy) = inner.writers.get_mut(&writer_guid) else {
            log::debug!(
                "[READER {}] GAP from unmatched writer {}",
                self.guid,
                writer_guid
            );
            return;
        };

        proxy.mark_lost(irrelevant.iter().copied());
        log::debug!(
            "[READER {}] writer {} declared {:?} unavailable",
            self.guid,
            writer_guid,
            irrelevant
        );

        if self.ordered {
            Self::drain_deliverable(
                &mut inner.writers,
                &inner.cache,
                &mut inner.delivered,
                writer_guid,
            );
        }
    }

    /// Drain newly available samples, in delivery order.
    pub fn take(&self) -> Vec<Sample> {
        self.inner.lock().delivered.drain(..).collect()
    }

    /// Discovery callback: a compatible remote writer appeared.
    pub fn match_writer(&self, remote_guid: Guid, locator: Locator) {
        let mut inner = self.inner.lock();
        inner
            .writers
            .insert(remote_guid, WriterProxy::new(remote_guid, locator));
        log::debug!("[READER {}] matched writer {}", self.guid, remote_guid);
    }

    /// Discovery callback: the remote writer went away.
    pub fn unmatch_writer(&self, remote_guid: Guid) {
        if self.inner.lock().writers.remove(&remote_guid).is_some() {
            log::debug!("[READER {}] unmatched writer {}", self.guid, remote_guid);
        }
    }

    pub fn matched_writers(&self) -> usize {
        self.inner.lock().writers.len()
    }

    /// Sequence numbers currently missing from one matched writer.
    pub fn missing_from(&self, writer_guid: Guid) -> Vec<SequenceNumber> {
        self.inner
            .lock()
            .writers
            .get(&writer_guid)
            .map(|p| p.missing().collect())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> &ReliableMetrics {
        &self.metrics
    }

    fn drain_deliverable(
        writers: &mut BTreeMap<Guid, WriterProxy>,
        cache: &HistoryCache,
        delivered: &mut VecDeque<Sample>,
        writer_guid: Guid,
    ) {
        let Some(proxy) = writers.get_mut(&writer_guid) else {
            return;
        };

        while let Some((seq, preceded_by_gap)) = proxy.pop_deliverable() {
            if let Some(change) = cache.get(writer_guid, seq) {
                delivered.push_back(Sample {
                    change: change.clone(),
                    preceded_by_gap,
                });
            } else {
                // Delivered earlier and since evicted from the bounded
                // cache; nothing to hand out twice.
                log::trace!(
                    "[READER] seq={} from {} no longer cached",
                    seq,
                    writer_guid
                );
            }
        }
    }
}

impl Endpoint for Reader {
    fn guid(&self) -> Guid {
        self.guid
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn reliability(&self) -> ReliabilityKind {
        self.reliability
    }

    fn unicast_locators(&self) -> Vec<Locator> {
        self.locators.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ChangeKind, Time, TIME_INVALID};
    use crate::engine::test_support::queue;
    use crate::protocol::codec::WireReader;
    use crate::protocol::rtps::{AckNackSubmessage, MessageHeader, SubmessageHeader};
    use crate::protocol::SUBMESSAGE_ACKNACK;

    fn reader_guid() -> Guid {
        Guid::new([2; 12], [0, 0, 1, 0x04])
    }

    fn writer_guid() -> Guid {
        Guid::new([1; 12], [0, 0, 1, 0x03])
    }

    fn locator() -> Locator {
        Locator::udpv4([127, 0, 0, 1], 7610)
    }

    fn change(seq: SequenceNumber) -> CacheChange {
        CacheChange::alive(writer_guid(), seq, Time::now(), vec![seq as u8])
    }

    fn make_reader(qos: &ReaderQos) -> (Reader, crossbeam::channel::Receiver<crate::engine::OutboundJob>) {
        let (tx, rx) = queue();
        let reader =
            Reader::new(reader_guid(), "sensors/temp", qos, vec![], tx).expect("create reader");
        (reader, rx)
    }

    fn decode_acknack(bytes: &[u8]) -> AckNackSubmessage {
        let mut rdr = WireReader::new(bytes);
        MessageHeader::decode(&mut rdr).expect("header");
        loop {
            let sub = SubmessageHeader::decode(&mut rdr).expect("submessage");
            let len = if sub.octets_to_next == 0 {
                rdr.remaining()
            } else {
                usize::from(sub.octets_to_next)
            };
            let mut body = rdr.sub_reader(len).expect("body");
            if sub.id == SUBMESSAGE_ACKNACK {
                return AckNackSubmessage::decode(sub.flags, &mut body).expect("acknack");
            }
        }
    }

    #[test]
    fn test_reliable_in_order_delivery() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(2));

        let samples = reader.take();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].change.sequence_number, 1);
        assert_eq!(samples[1].change.sequence_number, 2);
        assert!(!samples[0].preceded_by_gap);
        assert!(reader.take().is_empty(), "take drains");
    }

    #[test]
    fn test_reliable_ordered_buffers_out_of_order() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(3));

        // 3 is buffered: 2 is missing.
        let samples = reader.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(reader.missing_from(writer_guid()), vec![2]);

        reader.process_data(change(2));
        let samples = reader.take();
        let seqs: Vec<SequenceNumber> =
            samples.iter().map(|s| s.change.sequence_number).collect();
        assert_eq!(seqs, vec![2, 3]);
        assert!(reader.missing_from(writer_guid()).is_empty());
    }

    #[test]
    fn test_reliable_unordered_delivers_on_arrival() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable().unordered());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(3));

        let seqs: Vec<SequenceNumber> = reader
            .take()
            .iter()
            .map(|s| s.change.sequence_number)
            .collect();
        assert_eq!(seqs, vec![1, 3]);
        // The gap is still tracked for repair.
        assert_eq!(reader.missing_from(writer_guid()), vec![2]);
    }

    #[test]
    fn test_duplicate_data_ignored() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(1));
        assert_eq!(reader.take().len(), 1);
    }

    #[test]
    fn test_heartbeat_triggers_acknack_for_missing() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(3));
        reader.process_heartbeat(writer_guid(), 1, 3, 1, false);

        let jobs: Vec<_> = rx.try_iter().collect();
        assert_eq!(jobs.len(), 1);
        let acknack = decode_acknack(&jobs[0].bytes);
        let requested: Vec<SequenceNumber> = acknack.reader_sn_state.iter().collect();
        assert_eq!(requested, vec![2]);
        assert!(!acknack.final_flag);
        assert_eq!(reader.metrics().snapshot().1, 1);
    }

    #[test]
    fn test_heartbeat_announcing_more_extends_missing() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_heartbeat(writer_guid(), 1, 4, 1, false);

        let jobs: Vec<_> = rx.try_iter().collect();
        let acknack = decode_acknack(&jobs[0].bytes);
        let requested: Vec<SequenceNumber> = acknack.reader_sn_state.iter().collect();
        assert_eq!(requested, vec![2, 3, 4]);
    }

    #[test]
    fn test_heartbeat_when_synced_sends_positive_ack() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(2));
        reader.process_heartbeat(writer_guid(), 1, 2, 1, false);

        let jobs: Vec<_> = rx.try_iter().collect();
        assert_eq!(jobs.len(), 1);
        let acknack = decode_acknack(&jobs[0].bytes);
        assert!(acknack.reader_sn_state.is_empty());
        assert_eq!(acknack.acked_through(), 2);
        assert!(acknack.final_flag);
    }

    #[test]
    fn test_final_heartbeat_when_synced_needs_no_response() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_heartbeat(writer_guid(), 1, 1, 1, true);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_heartbeat_count_replay_ignored() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_heartbeat(writer_guid(), 1, 2, 5, false);
        assert_eq!(rx.try_iter().count(), 1);

        reader.process_heartbeat(writer_guid(), 1, 2, 5, false);
        assert_eq!(rx.try_iter().count(), 0, "no duplicate acknack");
    }

    #[test]
    fn test_best_effort_ignores_heartbeats() {
        let (reader, rx) = make_reader(&ReaderQos::best_effort());
        reader.process_heartbeat(writer_guid(), 1, 5, 1, false);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_best_effort_delivers_on_arrival_and_drops_stale() {
        let (reader, _rx) = make_reader(&ReaderQos::best_effort());

        // No match required.
        reader.process_data(change(2));
        reader.process_data(change(1)); // stale: already past 2
        reader.process_data(change(5));

        let seqs: Vec<SequenceNumber> = reader
            .take()
            .iter()
            .map(|s| s.change.sequence_number)
            .collect();
        assert_eq!(seqs, vec![2, 5]);
    }

    #[test]
    fn test_gap_resolves_missing_and_flags_delivery() {
        let (reader, rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        reader.process_data(change(1));
        reader.process_data(change(3));
        assert_eq!(reader.take().len(), 1);
        assert_eq!(reader.missing_from(writer_guid()), vec![2]);

        reader.process_gap(writer_guid(), &[2]);
        assert!(reader.missing_from(writer_guid()).is_empty());

        let samples = reader.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].change.sequence_number, 3);
        assert!(samples[0].preceded_by_gap, "explicit gap notification");

        // Missing no longer includes 2; a later heartbeat yields a
        // positive ack, not a request.
        reader.process_heartbeat(writer_guid(), 3, 3, 1, false);
        let jobs: Vec<_> = rx.try_iter().collect();
        let acknack = decode_acknack(&jobs[0].bytes);
        assert!(acknack.reader_sn_state.is_empty());
    }

    #[test]
    fn test_data_from_unmatched_writer_dropped_when_reliable() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.process_data(change(1));
        assert!(reader.take().is_empty());
    }

    #[test]
    fn test_disposed_change_is_delivered() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());

        let mut c = change(1);
        c.kind = ChangeKind::NotAliveDisposed;
        c.payload = Vec::new();
        c.source_timestamp = TIME_INVALID;
        reader.process_data(c);

        let samples = reader.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].change.kind, ChangeKind::NotAliveDisposed);
    }

    #[test]
    fn test_unmatch_writer_stops_acceptance() {
        let (reader, _rx) = make_reader(&ReaderQos::reliable());
        reader.match_writer(writer_guid(), locator());
        reader.unmatch_writer(writer_guid());
        assert_eq!(reader.matched_writers(), 0);

        reader.process_data(change(1));
        assert!(reader.take().is_empty());
    }
}
