// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport.
//!
//! Several transports attached to one [`MemHub`] exchange datagrams
//! through channels: same interface as UDP, no sockets, deterministic
//! delivery. Used by the test suites and usable for intra-process
//! pub/sub.

use std::io;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;

use crate::config::RECEIVE_TIMEOUT_MS;
use crate::core::types::Locator;

use super::Transport;

type Datagram = (Vec<u8>, Locator);

/// Shared switchboard: locator -> inbox.
#[derive(Default)]
pub struct MemHub {
    inboxes: DashMap<Locator, Sender<Datagram>>,
}

impl MemHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// One attached endpoint of a [`MemHub`].
pub struct MemTransport {
    hub: Arc<MemHub>,
    local: Locator,
    rx: Receiver<Datagram>,
}

impl MemTransport {
    /// Standalone transport on a private hub (pure loopback).
    pub fn new() -> Self {
        Self::attach(&MemHub::new())
    }

    /// Attach to a hub under a fresh synthetic locator.
    pub fn attach(hub: &Arc<MemHub>) -> Self {
        static NEXT_PORT: AtomicU16 = AtomicU16::new(1);
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        Self::attach_at(hub, Locator::udpv4([127, 0, 0, 1], port))
    }

    /// Attach to a hub under an explicit locator.
    pub fn attach_at(hub: &Arc<MemHub>, local: Locator) -> Self {
        let (tx, rx) = unbounded();
        hub.inboxes.insert(local, tx);
        Self {
            hub: Arc::clone(hub),
            local,
            rx,
        }
    }

    /// Receive with a generous timeout (test helper).
    pub fn recv_blocking(&self, buf: &mut [u8]) -> io::Result<(usize, Locator)> {
        self.recv_with_timeout(buf, Duration::from_secs(2))
    }

    fn recv_with_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<(usize, Locator)> {
        match self.rx.recv_timeout(timeout) {
            Ok((bytes, source)) => {
                if bytes.len() > buf.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "datagram exceeds receive buffer",
                    ));
                }
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok((bytes.len(), source))
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Err(
                io::Error::new(io::ErrorKind::TimedOut, "no datagram available"),
            ),
        }
    }
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemTransport {
    fn drop(&mut self) {
        self.hub.inboxes.remove(&self.local);
    }
}

impl Transport for MemTransport {
    fn send(&self, locator: &Locator, bytes: &[u8]) -> io::Result<usize> {
        match self.hub.inboxes.get(locator) {
            Some(tx) => {
                // A closed inbox is a peer that went away; datagram
                // semantics allow the loss.
                let _ = tx.send((bytes.to_vec(), self.local));
                Ok(bytes.len())
            }
            None => Ok(bytes.len()),
        }
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Locator)> {
        self.recv_with_timeout(buf, Duration::from_millis(RECEIVE_TIMEOUT_MS))
    }

    fn local_locator(&self) -> Locator {
        self.local
    }
}
