// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send context: one long-lived thread draining the outbound work queue.
//!
//! Serialization happened at enqueue time; this thread only moves bytes
//! to the transport. Its receive timeout doubles as the clock driving
//! writer heartbeat ticks, so heartbeats fire even when no application
//! write happens. The send context never blocks on the listen context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};

use crate::endpoint::EndpointRegistry;
use crate::transport::Transport;

use super::OutboundJob;

/// Handle to the send thread. Stopping drains queued jobs, then joins.
pub struct SendContext {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SendContext {
    /// Signal the thread to stop, let it drain the queue, and join.
    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[SEND] Send thread panicked");
            }
        }
    }
}

impl Drop for SendContext {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the send context.
pub(crate) fn start(
    rx: Receiver<OutboundJob>,
    transport: Arc<dyn Transport>,
    registry: Arc<EndpointRegistry>,
    heartbeat_period: Duration,
) -> SendContext {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_flag);

    // Wake often enough that no heartbeat deadline slips by much.
    let tick = (heartbeat_period / 4).max(Duration::from_millis(1));

    let handle = thread::spawn(move || {
        send_loop(&rx, transport.as_ref(), &registry, &stop, tick);
    });

    SendContext {
        stop_flag,
        handle: Some(handle),
    }
}

fn send_loop(
    rx: &Receiver<OutboundJob>,
    transport: &dyn Transport,
    registry: &EndpointRegistry,
    stop: &AtomicBool,
    tick: Duration,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            // Drain already-queued work, then exit.
            while let Ok(job) = rx.try_recv() {
                send_one(transport, &job);
            }
            break;
        }

        match rx.recv_timeout(tick) {
            Ok(job) => send_one(transport, &job),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // Timer-driven reliability: each tick lets due writers heartbeat.
        for entry in registry.writers.iter() {
            entry.value().heartbeat_tick();
        }
    }

    log::debug!("[SEND] Send context stopped");
}

fn send_one(transport: &dyn Transport, job: &OutboundJob) {
    if let Err(e) = transport.send(&job.locator, &job.bytes) {
        // Individual send failures never stop the context.
        log::warn!(
            "[SEND] send of {} bytes to {:?} failed: {}",
            job.bytes.len(),
            job.locator.to_socket_addr(),
            e
        );
    }
}
