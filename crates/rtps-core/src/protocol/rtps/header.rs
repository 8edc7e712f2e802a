// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message header and submessage header codecs.

use crate::core::types::{GuidPrefix, VENDOR_ID};
use crate::protocol::codec::{WireReader, WireWriter};
use crate::protocol::{
    Endianness, MESSAGE_HEADER_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION_MAJOR,
    PROTOCOL_VERSION_MINOR,
};
use crate::{Error, Result};

/// Message header: magic (4) + version (2) + vendor (2) + GUID prefix (12).
///
/// Header fields are octet arrays; the endianness flag of each submessage
/// does not apply here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: (u8, u8),
    pub vendor_id: [u8; 2],
    pub guid_prefix: GuidPrefix,
}

impl MessageHeader {
    /// Header announcing the local participant.
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            version: (PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR),
            vendor_id: VENDOR_ID,
            guid_prefix,
        }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        w.write_bytes(PROTOCOL_MAGIC);
        w.write_u8(self.version.0);
        w.write_u8(self.version.1);
        w.write_bytes(&self.vendor_id);
        w.write_bytes(&self.guid_prefix);
    }

    /// Decode and validate the leading header of a datagram.
    ///
    /// A bad magic or a protocol major version newer than ours fails with
    /// [`Error::MalformedMessage`]; the caller drops the datagram.
    pub fn decode(rdr: &mut WireReader<'_>) -> Result<Self> {
        if rdr.remaining() < MESSAGE_HEADER_SIZE {
            return Err(Error::MalformedMessage);
        }

        let magic = rdr.read_bytes(4)?;
        if magic != PROTOCOL_MAGIC {
            return Err(Error::MalformedMessage);
        }

        let major = rdr.read_u8()?;
        let minor = rdr.read_u8()?;
        if major > PROTOCOL_VERSION_MAJOR {
            log::debug!("[HEADER] Unsupported protocol version {}.{}", major, minor);
            return Err(Error::MalformedMessage);
        }

        let mut vendor_id = [0u8; 2];
        vendor_id.copy_from_slice(rdr.read_bytes(2)?);
        let guid_prefix = rdr.read_guid_prefix()?;

        Ok(Self {
            version: (major, minor),
            vendor_id,
            guid_prefix,
        })
    }
}

/// Submessage header: id (1) + flags (1) + octetsToNextHeader (2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmessageHeader {
    pub id: u8,
    pub flags: u8,
    /// Body length in octets; 0 on the final submessage means the body
    /// extends to the end of the message.
    pub octets_to_next: u16,
}

impl SubmessageHeader {
    /// Decode the next submessage header, switching the reader to the
    /// endianness declared in the flags octet.
    pub fn decode(rdr: &mut WireReader<'_>) -> Result<Self> {
        let id = rdr.read_u8()?;
        let flags = rdr.read_u8()?;
        rdr.set_endianness(Endianness::from_flags(flags));
        let octets_to_next = rdr.read_u16()?;

        Ok(Self {
            id,
            flags,
            octets_to_next,
        })
    }

    pub fn endianness(&self) -> Endianness {
        Endianness::from_flags(self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = MessageHeader::new([7; 12]);
        let mut w = WireWriter::new(Endianness::Little);
        header.encode(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), MESSAGE_HEADER_SIZE);

        let mut rdr = WireReader::new(&bytes);
        let decoded = MessageHeader::decode(&mut rdr).expect("decode");
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = vec![0u8; MESSAGE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"JUNK");
        let mut rdr = WireReader::new(&bytes);
        assert!(matches!(
            MessageHeader::decode(&mut rdr),
            Err(Error::MalformedMessage)
        ));
    }

    #[test]
    fn test_header_rejects_future_major_version() {
        let header = MessageHeader::new([1; 12]);
        let mut w = WireWriter::new(Endianness::Little);
        header.encode(&mut w);
        let mut bytes = w.into_bytes();
        bytes[4] = PROTOCOL_VERSION_MAJOR + 1;

        let mut rdr = WireReader::new(&bytes);
        assert!(MessageHeader::decode(&mut rdr).is_err());
    }

    #[test]
    fn test_submessage_header_sets_endianness() {
        // flags without bit0 => big-endian length field
        let bytes = [0x07u8, 0x00, 0x00, 0x1C];
        let mut rdr = WireReader::new(&bytes);
        let sub = SubmessageHeader::decode(&mut rdr).expect("decode");
        assert_eq!(sub.id, 0x07);
        assert_eq!(sub.endianness(), Endianness::Big);
        assert_eq!(sub.octets_to_next, 28);
    }
}
