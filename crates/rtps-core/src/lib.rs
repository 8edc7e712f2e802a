// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rtps-core - Real-time publish/subscribe protocol engine
//!
//! A brokerless, history-aware data distribution engine for unreliable
//! datagram transports. Delivery guarantees range from best-effort to
//! fully reliable, ordered, history-bounded delivery, negotiated per
//! endpoint through heartbeat/acknack/gap exchange.
//!
//! Discovery, QoS negotiation, and configuration loading live outside
//! this crate: collaborators hand the engine locators, endpoint matches,
//! and reliability/history parameters, and get back serialized datagrams
//! and decoded samples.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rtps_core::{EngineConfig, Participant, ReaderQos, WriterQos};
//! use rtps_core::transport::UdpTransport;
//!
//! fn main() -> rtps_core::Result<()> {
//!     let transport = Arc::new(UdpTransport::bind("0.0.0.0:7410".parse().unwrap())?);
//!     let participant = Participant::new(EngineConfig::default(), transport);
//!
//!     let writer = participant.create_writer("sensors/temp", &WriterQos::reliable(), vec![])?;
//!     // Discovery (external) matches endpoints:
//!     // writer.match_reader(remote_guid, remote_locator, true);
//!     writer.write(b"21.5")?;
//!
//!     participant.destroy();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |        Participant -> Writer/StatelessWriter/Reader                |
//! +--------------------------------------------------------------------+
//! |                        Protocol Engine                             |
//! |  History Cache | Reader/Writer Proxies | Heartbeat/AckNack/Gap     |
//! +--------------------------------------------------------------------+
//! |                        Wire Codec                                  |
//! |  Message Header | Submessages | SequenceNumberSet | ParameterList  |
//! +--------------------------------------------------------------------+
//! |                        Concurrency Substrate                       |
//! |  Send context (queue drain + timers) | Listen context (demux)      |
//! +--------------------------------------------------------------------+
//! |                        Transport (abstract)                        |
//! |            UDP | in-process loopback | user-provided               |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Participant`] | Lifecycle anchor; owns endpoints and both contexts |
//! | [`Writer`] | Stateful writer with per-reader reliability bookkeeping |
//! | [`StatelessWriter`] | Broadcast-only writer without proxy state |
//! | [`Reader`] | Accepts data, tracks gaps, emits acknacks |
//! | [`HistoryCache`] | Bounded per-endpoint change store |
//! | [`transport::Transport`] | Datagram transport consumed by the engine |

/// Participant-wide configuration and per-endpoint QoS.
pub mod config;
/// Core value types: identities, locators, timestamps, history cache.
pub mod core;
/// Endpoints (writers, readers) and the owning participant.
pub mod endpoint;
/// Send/listen contexts, outbound queue, and the message receiver.
pub mod engine;
/// Wire protocol: constants, codec primitives, submessage codecs.
pub mod protocol;
/// Reliability bookkeeping: proxies, heartbeat cadence, counters.
pub mod reliability;
/// Transport abstraction plus UDP and in-process implementations.
pub mod transport;

mod error;

pub use crate::core::cache::{CacheChange, EvictionPolicy, HistoryCache};
pub use crate::core::types::{
    ChangeKind, EntityId, Guid, GuidPrefix, Locator, SequenceNumber, Time,
};
pub use config::{EngineConfig, ReaderQos, ReliabilityKind, WriterQos};
pub use endpoint::{Endpoint, Participant, Reader, Sample, StatelessWriter, Writer};
pub use error::{Error, Result};
