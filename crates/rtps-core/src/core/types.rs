// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity and wire-value types shared by the whole engine.
//!
//! All identity types are fixed-width, value-comparable, and cheap to copy.
//! Routing keys throughout the engine are built from these.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// GUID prefix length (12 bytes).
pub const GUID_PREFIX_LEN: usize = 12;
/// Entity ID length (4 bytes).
pub const ENTITY_ID_LEN: usize = 4;

/// Process-unique prefix identifying a participant.
pub type GuidPrefix = [u8; GUID_PREFIX_LEN];

/// Identifies one endpoint within a participant.
pub type EntityId = [u8; ENTITY_ID_LEN];

/// All-zero prefix (unknown participant).
pub const GUID_PREFIX_UNKNOWN: GuidPrefix = [0; GUID_PREFIX_LEN];

/// Unknown entity; in a submessage it means "any matching endpoint".
pub const ENTITYID_UNKNOWN: EntityId = [0x00, 0x00, 0x00, 0x00];

/// Built-in participant entity.
pub const ENTITYID_PARTICIPANT: EntityId = [0x00, 0x00, 0x01, 0xC1];

/// Entity kind octet: user-defined writer (no key).
pub const ENTITY_KIND_WRITER: u8 = 0x03;
/// Entity kind octet: user-defined reader (no key).
pub const ENTITY_KIND_READER: u8 = 0x04;

/// Vendor identifier carried in every message header.
pub const VENDOR_ID: [u8; 2] = [0x01, 0xA7];

/// Global unique identifier: the addressing key for all routing.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Guid {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl Guid {
    /// Create GUID from separate prefix and entity ID.
    pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// Create GUID from raw bytes (16 bytes total).
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; GUID_PREFIX_LEN];
        let mut entity_id = [0u8; ENTITY_ID_LEN];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self { prefix, entity_id }
    }

    /// Convert GUID to a 16-byte array.
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix);
        bytes[12..16].copy_from_slice(&self.entity_id);
        bytes
    }

    /// All-zero GUID (invalid/placeholder).
    pub fn zero() -> Self {
        Self {
            prefix: GUID_PREFIX_UNKNOWN,
            entity_id: ENTITYID_UNKNOWN,
        }
    }

    /// Check if GUID is zero (invalid).
    pub fn is_zero(&self) -> bool {
        self.prefix.iter().all(|&b| b == 0) && self.entity_id.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.prefix.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        for byte in &self.entity_id {
            write!(f, ".{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Generate a process-unique GUID prefix.
///
/// Layout: vendor id (2) + pid (4) + boot nanos (4) + in-process counter (2).
/// Two participants in the same process get distinct prefixes via the
/// counter; distinct hosts are distinguished by pid + time entropy.
pub fn generate_guid_prefix() -> GuidPrefix {
    static COUNTER: AtomicU16 = AtomicU16::new(0);

    let mut prefix = [0u8; GUID_PREFIX_LEN];
    prefix[0..2].copy_from_slice(&VENDOR_ID);
    prefix[2..6].copy_from_slice(&std::process::id().to_be_bytes());

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    prefix[6..10].copy_from_slice(&nanos.to_be_bytes());

    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    prefix[10..12].copy_from_slice(&count.to_be_bytes());

    prefix
}

// ============================================================================
// Sequence Numbers
// ============================================================================

/// Strictly increasing per writer, starts at 1.
///
/// On the wire a sequence number is split into `{ high: i32, low: u32 }`.
pub type SequenceNumber = i64;

/// Wire constant `{ high: -1, low: 0 }` marking an unknown sequence number.
pub const SEQUENCE_NUMBER_UNKNOWN: SequenceNumber = (-1i64) << 32;

/// Split a sequence number into its wire (high, low) halves.
#[inline]
pub fn sequence_number_parts(sn: SequenceNumber) -> (i32, u32) {
    ((sn >> 32) as i32, sn as u32)
}

/// Rebuild a sequence number from its wire (high, low) halves.
#[inline]
pub fn sequence_number_from_parts(high: i32, low: u32) -> SequenceNumber {
    (i64::from(high) << 32) | i64::from(low)
}

// ============================================================================
// Locator
// ============================================================================

/// Invalid transport kind.
pub const LOCATOR_KIND_INVALID: i32 = -1;
/// UDP over IPv4.
pub const LOCATOR_KIND_UDPV4: i32 = 1;
/// UDP over IPv6.
pub const LOCATOR_KIND_UDPV6: i32 = 2;
/// Port marker for an invalid locator.
pub const LOCATOR_PORT_INVALID: u32 = 0;

/// Transport address used for routing decisions.
///
/// Opaque to the protocol engine beyond equality/ordering; only the
/// transport layer interprets kind/address/port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    /// IPv4 addresses occupy the last 4 bytes (RTPS layout).
    pub address: [u8; 16],
}

impl Locator {
    /// Invalid/placeholder locator.
    pub fn invalid() -> Self {
        Self {
            kind: LOCATOR_KIND_INVALID,
            port: LOCATOR_PORT_INVALID,
            address: [0; 16],
        }
    }

    /// Build a UDPv4 locator from octets and port.
    pub fn udpv4(octets: [u8; 4], port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&octets);
        Self {
            kind: LOCATOR_KIND_UDPV4,
            port: u32::from(port),
            address,
        }
    }

    /// Build a locator from a socket address.
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(ip) => Self::udpv4(ip.octets(), addr.port()),
            IpAddr::V6(ip) => Self {
                kind: LOCATOR_KIND_UDPV6,
                port: u32::from(addr.port()),
                address: ip.octets(),
            },
        }
    }

    /// Resolve back to a socket address, if the kind allows it.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        match self.kind {
            LOCATOR_KIND_UDPV4 => {
                let ip = Ipv4Addr::new(
                    self.address[12],
                    self.address[13],
                    self.address[14],
                    self.address[15],
                );
                Some(SocketAddr::new(IpAddr::V4(ip), port))
            }
            LOCATOR_KIND_UDPV6 => {
                let ip = std::net::Ipv6Addr::from(self.address);
                Some(SocketAddr::new(IpAddr::V6(ip), port))
            }
            _ => None,
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// NTP-style timestamp: seconds + 2^-32 fraction.
///
/// Attached to submessages for informational ordering only; never
/// protocol-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    pub seconds: i32,
    pub fraction: u32,
}

/// Wire constant marking "no timestamp".
pub const TIME_INVALID: Time = Time {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
};

/// Zero timestamp.
pub const TIME_ZERO: Time = Time {
    seconds: 0,
    fraction: 0,
};

impl Time {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| {
                log::debug!("[TIME] System time before UNIX epoch, using zero");
                std::time::Duration::from_secs(0)
            });

        let seconds = i32::try_from(duration.as_secs()).unwrap_or(i32::MAX);
        let fraction = ((u64::from(duration.subsec_nanos()) << 32) / 1_000_000_000) as u32;

        Self { seconds, fraction }
    }

    /// Whether this is the `TIME_INVALID` marker.
    pub fn is_invalid(&self) -> bool {
        *self == TIME_INVALID
    }

    /// Convert to nanoseconds since the UNIX epoch.
    pub fn as_nanos(&self) -> u64 {
        if self.is_invalid() || self.seconds < 0 {
            return 0;
        }
        let from_secs = (self.seconds as u64) * 1_000_000_000;
        let from_fraction = (u64::from(self.fraction) * 1_000_000_000) >> 32;
        from_secs + from_fraction
    }
}

// ============================================================================
// Change Kind
// ============================================================================

/// Lifecycle kind of a cache change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeKind {
    /// A live sample with payload.
    #[default]
    Alive,
    /// The instance was disposed by the writer.
    NotAliveDisposed,
    /// The writer unregistered the instance.
    NotAliveUnregistered,
}
