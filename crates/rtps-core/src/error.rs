// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the protocol engine.
//!
//! Only endpoint-creation-time misconfiguration is surfaced as a hard failure
//! to the caller. Nothing on the steady-state send/listen path propagates an
//! error that would stop either execution context: malformed datagrams are
//! dropped whole, duplicates and unmatched destinations are routine.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by rtps-core operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Codec Errors
    // ========================================================================
    /// Buffer underrun/overrun or inconsistent length field while decoding.
    /// The whole datagram is dropped; the sender's heartbeat/retransmission
    /// logic is the recovery path, not the receiver.
    MalformedMessage,
    /// Serialized payload does not fit a single datagram (no fragmentation).
    PayloadTooLarge(usize),

    // ========================================================================
    // History Errors
    // ========================================================================
    /// A change with the same (writer GUID, sequence number) is already
    /// cached. Idempotent re-delivery is expected on unreliable transports;
    /// callers ignore this silently.
    DuplicateSequenceNumber,
    /// Writer history is full of unacknowledged changes and the eviction
    /// policy is `RefuseWrite`.
    HistoryFull,

    // ========================================================================
    // Configuration Errors (creation-time hard failures)
    // ========================================================================
    /// QoS parameters are invalid (e.g. zero history depth).
    InvalidQos(&'static str),
    /// Entity identifier space exhausted or malformed.
    InvalidEntityId,

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Outbound queue rejected a send job.
    SendFailed(&'static str),
    /// Operation attempted on a participant that has been destroyed.
    NotRunning,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedMessage => write!(f, "malformed message"),
            Error::PayloadTooLarge(len) => {
                write!(f, "payload of {} bytes exceeds datagram capacity", len)
            }
            Error::DuplicateSequenceNumber => write!(f, "duplicate sequence number"),
            Error::HistoryFull => write!(f, "history full of unacknowledged changes"),
            Error::InvalidQos(msg) => write!(f, "invalid QoS: {}", msg),
            Error::InvalidEntityId => write!(f, "invalid entity id"),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::SendFailed(msg) => write!(f, "send failed: {}", msg),
            Error::NotRunning => write!(f, "participant is not running"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}
