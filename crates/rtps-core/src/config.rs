// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global engine configuration - single source of truth.
//!
//! Centralizes runtime tunables and per-endpoint QoS handed to the core by
//! the (external) QoS layer. Reliability kind and history depth are fixed at
//! endpoint creation time and immutable thereafter.

use std::time::Duration;

use crate::core::cache::EvictionPolicy;

/// Default heartbeat period in milliseconds.
///
/// Heartbeats are the liveliness/retransmission trigger for reliable
/// writers: they are sent on this fixed interval even without new data.
pub const DEFAULT_HEARTBEAT_PERIOD_MS: u64 = 100;

/// Default per-endpoint history depth (maximum cached changes).
pub const DEFAULT_HISTORY_DEPTH: usize = 64;

/// Receive timeout for the listen context.
///
/// Short enough that the stop flag is observed promptly on teardown.
pub const RECEIVE_TIMEOUT_MS: u64 = 100;

/// Maximum UDP datagram payload (IPv4, no jumbograms).
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Reliability kind of an endpoint (immutable after creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityKind {
    /// No retransmission; losses are silent.
    BestEffort,
    /// Every change is eventually delivered or explicitly reported as
    /// permanently unavailable via GAP.
    Reliable,
}

/// Participant-wide engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Heartbeat period for reliable writers.
    pub heartbeat_period: Duration,
    /// Blocking-receive timeout of the listen context.
    pub receive_timeout: Duration,
    /// Receive buffer size for inbound datagrams.
    pub max_datagram: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_period: Duration::from_millis(DEFAULT_HEARTBEAT_PERIOD_MS),
            receive_timeout: Duration::from_millis(RECEIVE_TIMEOUT_MS),
            max_datagram: MAX_DATAGRAM_SIZE,
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment overrides.
    ///
    /// Recognized variables:
    /// - `RTPS_HB_PERIOD_MS`: heartbeat period in milliseconds
    /// - `RTPS_RECV_TIMEOUT_MS`: listen-context receive timeout
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_env_u64("RTPS_HB_PERIOD_MS") {
            config.heartbeat_period = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = read_env_u64("RTPS_RECV_TIMEOUT_MS") {
            config.receive_timeout = Duration::from_millis(ms.max(1));
        }

        config
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("[CONFIG] Ignoring {}={:?} (not a number)", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}

/// Writer-side QoS, fixed at creation time.
#[derive(Debug, Clone)]
pub struct WriterQos {
    pub reliability: ReliabilityKind,
    /// Maximum changes retained in the writer history.
    pub history_depth: usize,
    /// What happens when the history is full of unacknowledged changes.
    pub eviction: EvictionPolicy,
}

impl Default for WriterQos {
    fn default() -> Self {
        Self {
            reliability: ReliabilityKind::Reliable,
            history_depth: DEFAULT_HISTORY_DEPTH,
            eviction: EvictionPolicy::ForceEvict,
        }
    }
}

impl WriterQos {
    pub fn best_effort() -> Self {
        Self {
            reliability: ReliabilityKind::BestEffort,
            ..Self::default()
        }
    }

    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }
}

/// Reader-side QoS, fixed at creation time.
#[derive(Debug, Clone)]
pub struct ReaderQos {
    pub reliability: ReliabilityKind,
    /// Deliver to the application only in contiguous sequence order.
    /// When false, every accepted change is delivered on arrival.
    pub ordered: bool,
    pub history_depth: usize,
}

impl Default for ReaderQos {
    fn default() -> Self {
        Self {
            reliability: ReliabilityKind::Reliable,
            ordered: true,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl ReaderQos {
    pub fn best_effort() -> Self {
        Self {
            reliability: ReliabilityKind::BestEffort,
            ordered: false,
            ..Self::default()
        }
    }

    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }
}
