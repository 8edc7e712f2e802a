// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listen context: one long-lived thread blocking on datagram arrival.
//!
//! Each datagram is fed synchronously to the message receiver on this
//! thread; decode-and-dispatch is fast and non-blocking, so no further
//! worker pool exists. Transports surface a periodic timeout from `recv`
//! so the stop flag is observed promptly. The listen context never blocks
//! on the send context.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::transport::Transport;

use super::MessageReceiver;

/// Handle to the listen thread. Stopping joins at the next receive
/// timeout.
pub struct ListenContext {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ListenContext {
    /// Signal the thread to stop and join it.
    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[LISTEN] Listen thread panicked");
            }
        }
    }
}

impl Drop for ListenContext {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the listen context.
pub(crate) fn start(
    transport: Arc<dyn Transport>,
    receiver: MessageReceiver,
    config: &EngineConfig,
) -> ListenContext {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_flag);
    let max_datagram = config.max_datagram;

    let handle = thread::spawn(move || {
        listen_loop(transport.as_ref(), receiver, &stop, max_datagram);
    });

    ListenContext {
        stop_flag,
        handle: Some(handle),
    }
}

fn listen_loop(
    transport: &dyn Transport,
    mut receiver: MessageReceiver,
    stop: &AtomicBool,
    max_datagram: usize,
) {
    let mut buf = vec![0u8; max_datagram];

    while !stop.load(Ordering::Relaxed) {
        match transport.recv(&mut buf) {
            Ok((len, source)) => receiver.process_message(&buf[..len], &source),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                // Transient transport faults must not kill the context.
                log::warn!("[LISTEN] receive error: {}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    log::debug!("[LISTEN] Listen context stopped");
}
