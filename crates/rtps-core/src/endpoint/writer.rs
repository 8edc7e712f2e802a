// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer endpoints.
//!
//! A [`Writer`] owns a history cache and per-reader proxies: every write
//! appends to the cache and pushes DATA to each matched reader; reliable
//! readers additionally get periodic heartbeats and acknack-driven repair
//! (retransmit what the cache still holds, GAP what it evicted).
//!
//! A [`StatelessWriter`] keeps no per-reader state at all: it broadcasts
//! every write to a configured locator set and answers no acknacks.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{ReliabilityKind, WriterQos, MAX_DATAGRAM_SIZE};
use crate::core::cache::{CacheChange, HistoryCache};
use crate::core::types::{ChangeKind, Guid, Locator, SequenceNumber, Time, ENTITYID_UNKNOWN};
use crate::engine::SendQueue;
use crate::protocol::builder::MessageBuilder;
use crate::protocol::rtps::{
    DataSubmessage, GapSubmessage, HeartbeatSubmessage, SequenceNumberSet,
};
use crate::reliability::{HeartbeatTimer, ReaderLocator, ReaderProxy, ReliableMetrics};
use crate::{Error, Result};

use super::Endpoint;

/// Headroom for message header + submessage framing within one datagram.
const MESSAGE_OVERHEAD: usize = 96;

// ============================================================================
// Stateful Writer
// ============================================================================

struct WriterInner {
    cache: HistoryCache,
    next_seq: SequenceNumber,
    readers: BTreeMap<Guid, ReaderProxy>,
    heartbeat: HeartbeatTimer,
}

/// Writer with per-reader proxy bookkeeping.
pub struct Writer {
    guid: Guid,
    topic: String,
    reliability: ReliabilityKind,
    locators: Vec<Locator>,
    outbound: SendQueue,
    metrics: ReliableMetrics,
    inner: Mutex<WriterInner>,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("guid", &self.guid)
            .field("topic", &self.topic)
            .field("reliability", &self.reliability)
            .field("locators", &self.locators)
            .finish_non_exhaustive()
    }
}

impl Writer {
    pub(crate) fn new(
        guid: Guid,
        topic: &str,
        qos: &WriterQos,
        locators: Vec<Locator>,
        outbound: SendQueue,
        heartbeat_period: Duration,
    ) -> Result<Self> {
        if qos.history_depth == 0 {
            return Err(Error::InvalidQos("history depth must be >= 1"));
        }

        Ok(Self {
            guid,
            topic: topic.to_string(),
            reliability: qos.reliability,
            locators,
            outbound,
            metrics: ReliableMetrics::new(),
            inner: Mutex::new(WriterInner {
                cache: HistoryCache::new(qos.history_depth, qos.eviction),
                next_seq: 1,
                readers: BTreeMap::new(),
                heartbeat: HeartbeatTimer::new(heartbeat_period),
            }),
        })
    }

    /// Append an ALIVE change and push it to every matched reader.
    pub fn write(&self, payload: &[u8]) -> Result<CacheChange> {
        self.write_with_kind(payload, ChangeKind::Alive)
    }

    /// Append a change of the given kind and push it to every matched
    /// reader.
    ///
    /// Sequence numbers are writer-local, start at 1, and are never
    /// reused. Under the `RefuseWrite` eviction policy this fails with
    /// [`Error::HistoryFull`] while the oldest cached change is
    /// unacknowledged by a matched reliable reader.
    pub fn write_with_kind(&self, payload: &[u8], kind: ChangeKind) -> Result<CacheChange> {
        if payload.len() > MAX_DATAGRAM_SIZE - MESSAGE_OVERHEAD {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let (change, destinations) = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            let change = CacheChange {
                kind,
                writer_guid: self.guid,
                sequence_number: seq,
                source_timestamp: Time::now(),
                payload: payload.to_vec(),
            };

            let floor = acked_floor(&inner.readers);
            inner.cache.add_with_floor(change.clone(), floor)?;
            inner.next_seq += 1;

            let destinations: Vec<(Guid, Locator)> = inner
                .readers
                .values()
                .map(|p| (p.remote_guid, p.locator))
                .collect();
            (change, destinations)
        };

        for (remote, locator) in destinations {
            self.send_data_to(&change, remote, locator);
        }

        log::trace!(
            "[WRITER {}] wrote seq={} ({} bytes)",
            self.guid,
            change.sequence_number,
            change.payload.len()
        );
        Ok(change)
    }

    /// Handle an ACKNACK from a matched reader: advance its acknowledgment
    /// floor, retransmit requested changes still cached, and GAP the ones
    /// already evicted.
    pub fn process_acknack(
        &self,
        reader_guid: Guid,
        sn_state: &SequenceNumberSet,
        count: u32,
        _final_flag: bool,
    ) {
        let (resend, unavailable, remote, locator) = {
            let mut inner = self.inner.lock();
            let next_seq = inner.next_seq;
            let Some(proxy) = inner.readers.get_mut(&reader_guid) else {
                log::warn!(
                    "[WRITER {}] ACKNACK from unmatched reader {}",
                    self.guid,
                    reader_guid
                );
                return;
            };

            if !proxy.accept_acknack_count(count) {
                log::debug!(
                    "[WRITER {}] stale ACKNACK count {} from {}",
                    self.guid,
                    count,
                    reader_guid
                );
                return;
            }

            proxy.acknowledge_through(sn_state.base() - 1);
            let remote = proxy.remote_guid;
            let locator = proxy.locator;

            let mut resend: Vec<CacheChange> = Vec::new();
            let mut unavailable: Vec<SequenceNumber> = Vec::new();
            for seq in sn_state.iter() {
                if seq >= next_seq {
                    // Requested ahead of anything written; ignore.
                    continue;
                }
                match inner.cache.get(self.guid, seq) {
                    Some(change) => resend.push(change.clone()),
                    None => unavailable.push(seq),
                }
            }
            (resend, unavailable, remote, locator)
        };

        for change in &resend {
            self.send_data_to(change, remote, locator);
            self.metrics.record_retransmits(1);
        }

        if !unavailable.is_empty() {
            log::debug!(
                "[WRITER {}] GAP for evicted seqs {:?} to {}",
                self.guid,
                unavailable,
                reader_guid
            );
            for gap in
                GapSubmessage::from_sequences(remote.entity_id, self.guid.entity_id, &unavailable)
            {
                let bytes = MessageBuilder::new(self.guid.prefix)
                    .info_dst(remote.prefix)
                    .gap(&gap)
                    .build();
                self.outbound.post(locator, bytes);
                self.metrics.record_gaps(1);
            }
        }
    }

    /// Periodic heartbeat to every matched reliable reader, driven by the
    /// send context clock. Fires even without new data; that is what
    /// elicits acknacks after loss.
    pub fn heartbeat_tick(&self) {
        if self.reliability != ReliabilityKind::Reliable {
            return;
        }

        let now = Instant::now();
        let (heartbeat, destinations) = {
            let mut inner = self.inner.lock();
            if !inner.heartbeat.due(now) {
                return;
            }

            let destinations: Vec<(Guid, Locator)> = inner
                .readers
                .values()
                .filter(|p| p.reliable)
                .map(|p| (p.remote_guid, p.locator))
                .collect();
            if destinations.is_empty() {
                return;
            }

            let count = inner.heartbeat.fire(now);
            let first = inner.cache.min_seq(self.guid).unwrap_or(inner.next_seq);
            let last = inner.next_seq - 1;
            (
                HeartbeatSubmessage::new(
                    ENTITYID_UNKNOWN,
                    self.guid.entity_id,
                    first,
                    last,
                    count,
                    last < first,
                ),
                destinations,
            )
        };

        for (remote, locator) in destinations {
            let hb = HeartbeatSubmessage {
                reader_id: remote.entity_id,
                ..heartbeat
            };
            let bytes = MessageBuilder::new(self.guid.prefix)
                .info_dst(remote.prefix)
                .heartbeat(&hb)
                .build();
            self.outbound.post(locator, bytes);
            self.metrics.record_heartbeats(1);
        }
    }

    /// Discovery callback: a compatible remote reader appeared.
    pub fn match_reader(&self, remote_guid: Guid, locator: Locator, reliable: bool) {
        let mut inner = self.inner.lock();
        let reliable = reliable && self.reliability == ReliabilityKind::Reliable;
        inner
            .readers
            .insert(remote_guid, ReaderProxy::new(remote_guid, locator, reliable));
        log::debug!(
            "[WRITER {}] matched reader {} (reliable={})",
            self.guid,
            remote_guid,
            reliable
        );
    }

    /// Discovery callback: the remote reader went away.
    pub fn unmatch_reader(&self, remote_guid: Guid) {
        if self.inner.lock().readers.remove(&remote_guid).is_some() {
            log::debug!("[WRITER {}] unmatched reader {}", self.guid, remote_guid);
        }
    }

    pub fn matched_readers(&self) -> usize {
        self.inner.lock().readers.len()
    }

    /// Sequence range currently held in history: (min, max).
    pub fn cached_range(&self) -> Option<(SequenceNumber, SequenceNumber)> {
        let inner = self.inner.lock();
        Some((
            inner.cache.min_seq(self.guid)?,
            inner.cache.max_seq(self.guid)?,
        ))
    }

    pub fn metrics(&self) -> &ReliableMetrics {
        &self.metrics
    }

    fn send_data_to(&self, change: &CacheChange, remote: Guid, locator: Locator) {
        let data = DataSubmessage::new(
            remote.entity_id,
            self.guid.entity_id,
            change.sequence_number,
            change.kind,
            change.payload.clone(),
        );
        let bytes = MessageBuilder::new(self.guid.prefix)
            .info_dst(remote.prefix)
            .info_ts(change.source_timestamp)
            .data(&data)
            .build();
        self.outbound.post(locator, bytes);
    }
}

impl Endpoint for Writer {
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

/// Lowest acknowledgment floor across matched reliable readers; writers
/// without reliable matches may evict freely.
fn acked_floor(readers: &BTreeMap<Guid, ReaderProxy>) -> SequenceNumber {
    readers
        .values()
        .filter(|p| p.reliable)
        .map(ReaderProxy::highest_acked)
        .min()
        .unwrap_or(SequenceNumber::MAX)
}

// ============================================================================
// Stateless Writer
// ============================================================================

struct StatelessWriterInner {
    cache: HistoryCache,
    next_seq: SequenceNumber,
    reader_locators: Vec<ReaderLocator>,
}

/// Best-effort writer without per-reader bookkeeping.
///
/// Every write is broadcast unconditionally to the configured locators
/// (multicast-style fan-out, e.g. discovery traffic). Acknacks are
/// dropped: there is no proxy state to repair from.
pub struct StatelessWriter {
    guid: Guid,
    topic: String,
    locators: Vec<Locator>,
    outbound: SendQueue,
    inner: Mutex<StatelessWriterInner>,
}

impl StatelessWriter {
    pub(crate) fn new(
        guid: Guid,
        topic: &str,
        history_depth: usize,
        reader_locators: Vec<Locator>,
        outbound: SendQueue,
    ) -> Result<Self> {
        if history_depth == 0 {
            return Err(Error::InvalidQos("history depth must be >= 1"));
        }

        Ok(Self {
            guid,
            topic: topic.to_string(),
            locators: Vec::new(),
            outbound,
            inner: Mutex::new(StatelessWriterInner {
                cache: HistoryCache::new(history_depth, crate::core::cache::EvictionPolicy::ForceEvict),
                next_seq: 1,
                reader_locators: reader_locators.into_iter().map(ReaderLocator::new).collect(),
            }),
        })
    }

    /// Append a change and broadcast one DATA submessage per configured
    /// locator, regardless of any matched-reader state (there is none).
    pub fn write(&self, payload: &[u8]) -> Result<CacheChange> {
        if payload.len() > MAX_DATAGRAM_SIZE - MESSAGE_OVERHEAD {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let (change, targets) = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            let change = CacheChange::alive(self.guid, seq, Time::now(), payload.to_vec());
            inner.cache.add(change.clone())?;
            inner.next_seq += 1;
            let targets: Vec<Locator> =
                inner.reader_locators.iter().map(|rl| rl.locator).collect();
            (change, targets)
        };

        let data = DataSubmessage::new(
            ENTITYID_UNKNOWN,
            self.guid.entity_id,
            change.sequence_number,
            change.kind,
            change.payload.clone(),
        );
        let bytes = MessageBuilder::new(self.guid.prefix)
            .info_ts(change.source_timestamp)
            .data(&data)
            .build();

        for locator in targets {
            self.outbound.post(locator, bytes.clone());
        }

        Ok(change)
    }

    /// Stateless writers answer no acknacks.
    pub fn process_acknack(
        &self,
        reader_guid: Guid,
        _sn_state: &SequenceNumberSet,
        _count: u32,
        _final_flag: bool,
    ) {
        log::debug!(
            "[WRITER {}] stateless writer dropping ACKNACK from {}",
            self.guid,
            reader_guid
        );
    }

    /// Add a broadcast destination.
    pub fn reader_locator_add(&self, locator: Locator) {
        let mut inner = self.inner.lock();
        if inner.reader_locators.iter().all(|rl| rl.locator != locator) {
            inner.reader_locators.push(ReaderLocator::new(locator));
        }
    }

    /// Remove a broadcast destination. Idempotent.
    pub fn reader_locator_remove(&self, locator: &Locator) {
        self.inner
            .lock()
            .reader_locators
            .retain(|rl| rl.locator != *locator);
    }

    pub fn reader_locator_count(&self) -> usize {
        self.inner.lock().reader_locators.len()
    }
}

impl Endpoint for StatelessWriter {
    fn guid(&self) -> Guid {
        self.guid
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn reliability(&self) -> ReliabilityKind {
        ReliabilityKind::BestEffort
    }

    fn unicast_locators(&self) -> Vec<Locator> {
        self.locators.clone()
    }
}
