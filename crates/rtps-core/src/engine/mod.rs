// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrency substrate: the outbound work queue, the send context that
//! drains it, the listen context that feeds the message receiver, and the
//! receiver itself.
//!
//! The two contexts are independent failure domains: listen never blocks
//! on send, send never blocks on listen.

pub mod listener;
pub mod receiver;
pub mod sender;

pub use listener::ListenContext;
pub use receiver::{MessageReceiver, ReceiverMetrics};
pub use sender::SendContext;

use crate::core::types::Locator;

/// One outbound datagram: where to send and the fully serialized bytes.
#[derive(Debug)]
pub struct OutboundJob {
    pub locator: Locator,
    pub bytes: Vec<u8>,
}

/// Producer handle to the send context's work queue.
///
/// Posts never block: the queue is unbounded and the send context is the
/// only consumer. Endpoints may post while holding their own lock.
#[derive(Clone)]
pub struct SendQueue {
    tx: crossbeam::channel::Sender<OutboundJob>,
}

impl SendQueue {
    pub(crate) fn new(tx: crossbeam::channel::Sender<OutboundJob>) -> Self {
        Self { tx }
    }

    /// Enqueue one datagram for the send context.
    pub fn post(&self, locator: Locator, bytes: Vec<u8>) {
        let len = bytes.len();
        if self.tx.send(OutboundJob { locator, bytes }).is_err() {
            log::debug!("[SEND] Queue closed, dropping {} bytes", len);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crossbeam::channel::Receiver;

    /// Queue + drain handle for endpoint unit tests.
    pub fn queue() -> (SendQueue, Receiver<OutboundJob>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (SendQueue::new(tx), rx)
    }
}
