// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant: process-wide lifecycle anchor.
//!
//! Owns the GUID prefix, the endpoint registry, the transport, and the
//! send/listen execution contexts. Endpoints are created and destroyed
//! through it; teardown stops both contexts and joins them before the
//! endpoint tables are cleared, so no endpoint lock can still be taken by
//! an in-flight dispatch.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{EngineConfig, ReaderQos, WriterQos};
use crate::core::types::{
    generate_guid_prefix, EntityId, Guid, GuidPrefix, Locator, ENTITY_KIND_READER,
    ENTITY_KIND_WRITER,
};
use crate::engine::{listener, sender, ListenContext, MessageReceiver, ReceiverMetrics, SendContext, SendQueue};
use crate::transport::Transport;
use crate::{Error, Result};

use super::{AnyWriter, EndpointRegistry, Reader, StatelessWriter, Writer};

/// Process-wide registry owning all local endpoints.
pub struct Participant {
    guid_prefix: GuidPrefix,
    config: EngineConfig,
    registry: Arc<EndpointRegistry>,
    outbound: SendQueue,
    receiver_metrics: Arc<ReceiverMetrics>,
    entity_counter: AtomicU32,
    destroyed: AtomicBool,
    send_ctx: Mutex<Option<SendContext>>,
    listen_ctx: Mutex<Option<ListenContext>>,
}

impl Participant {
    /// Create a participant and start its send/listen contexts.
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Arc<Self> {
        let guid_prefix = generate_guid_prefix();
        let registry = Arc::new(EndpointRegistry::default());

        let (tx, rx) = crossbeam::channel::unbounded();
        let outbound = SendQueue::new(tx);

        let send_ctx = sender::start(
            rx,
            Arc::clone(&transport),
            Arc::clone(&registry),
            config.heartbeat_period,
        );

        let receiver = MessageReceiver::new(guid_prefix, Arc::clone(&registry));
        let receiver_metrics = receiver.metrics();
        let listen_ctx = listener::start(Arc::clone(&transport), receiver, &config);

        log::debug!(
            "[PARTICIPANT {:02x?}] started (hb period {:?})",
            guid_prefix,
            config.heartbeat_period
        );

        Arc::new(Self {
            guid_prefix,
            config,
            registry,
            outbound,
            receiver_metrics,
            entity_counter: AtomicU32::new(0),
            destroyed: AtomicBool::new(false),
            send_ctx: Mutex::new(Some(send_ctx)),
            listen_ctx: Mutex::new(Some(listen_ctx)),
        })
    }

    pub fn guid_prefix(&self) -> GuidPrefix {
        self.guid_prefix
    }

    /// Receive-path counters of this participant's listen context.
    pub fn receiver_metrics(&self) -> &ReceiverMetrics {
        &self.receiver_metrics
    }

    /// Create a stateful writer on `topic`.
    pub fn create_writer(
        &self,
        topic: &str,
        qos: &WriterQos,
        unicast_locators: Vec<Locator>,
    ) -> Result<Arc<Writer>> {
        self.ensure_running()?;
        let entity_id = self.next_entity_id(ENTITY_KIND_WRITER)?;
        let writer = Arc::new(Writer::new(
            Guid::new(self.guid_prefix, entity_id),
            topic,
            qos,
            unicast_locators,
            self.outbound.clone(),
            self.config.heartbeat_period,
        )?);

        self.registry
            .writers
            .insert(entity_id, AnyWriter::Stateful(Arc::clone(&writer)));
        Ok(writer)
    }

    /// Create a stateless (broadcast-only) writer on `topic`.
    pub fn create_stateless_writer(
        &self,
        topic: &str,
        history_depth: usize,
        reader_locators: Vec<Locator>,
    ) -> Result<Arc<StatelessWriter>> {
        self.ensure_running()?;
        let entity_id = self.next_entity_id(ENTITY_KIND_WRITER)?;
        let writer = Arc::new(StatelessWriter::new(
            Guid::new(self.guid_prefix, entity_id),
            topic,
            history_depth,
            reader_locators,
            self.outbound.clone(),
        )?);

        self.registry
            .writers
            .insert(entity_id, AnyWriter::Stateless(Arc::clone(&writer)));
        Ok(writer)
    }

    /// Create a reader on `topic`.
    pub fn create_reader(
        &self,
        topic: &str,
        qos: &ReaderQos,
        unicast_locators: Vec<Locator>,
    ) -> Result<Arc<Reader>> {
        self.ensure_running()?;
        let entity_id = self.next_entity_id(ENTITY_KIND_READER)?;
        let reader = Arc::new(Reader::new(
            Guid::new(self.guid_prefix, entity_id),
            topic,
            qos,
            unicast_locators,
            self.outbound.clone(),
        )?);

        self.registry
            .readers
            .insert(entity_id, Arc::clone(&reader));
        Ok(reader)
    }

    /// Remove one endpoint from the routing tables. Returns whether
    /// anything was removed.
    pub fn destroy_endpoint(&self, entity_id: EntityId) -> bool {
        self.registry.readers.remove(&entity_id).is_some()
            || self.registry.writers.remove(&entity_id).is_some()
    }

    /// Tear down: stop both contexts, join them, then drop all endpoints.
    ///
    /// Idempotent. The send context drains already-queued jobs before
    /// exiting; the listen context stops at its next receive timeout.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(ctx) = self.listen_ctx.lock().take() {
            ctx.stop();
        }
        if let Some(ctx) = self.send_ctx.lock().take() {
            ctx.stop();
        }

        self.registry.clear();
        log::debug!("[PARTICIPANT {:02x?}] destroyed", self.guid_prefix);
    }

    fn ensure_running(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }
        Ok(())
    }

    /// Allocate the next entity id: 3-octet key + kind octet.
    fn next_entity_id(&self, kind: u8) -> Result<EntityId> {
        let n = self.entity_counter.fetch_add(1, Ordering::Relaxed);
        if n > 0x00FF_FFFE {
            return Err(Error::InvalidEntityId);
        }
        let key = (n + 1).to_be_bytes();
        Ok([key[1], key[2], key[3], kind])
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.destroy();
    }
}
