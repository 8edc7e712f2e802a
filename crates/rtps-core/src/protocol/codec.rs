// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked, endianness-aware buffer cursors.
//!
//! Every decode failure is a [`Error::MalformedMessage`]; the caller drops
//! the whole datagram, never applying a partial message.

use crate::core::types::{
    sequence_number_from_parts, sequence_number_parts, EntityId, GuidPrefix, SequenceNumber,
    ENTITY_ID_LEN, GUID_PREFIX_LEN,
};
use crate::protocol::Endianness;
use crate::{Error, Result};

/// Read cursor over one received buffer.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            endianness: Endianness::Little,
        }
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Switch byte order (set per submessage from its flags octet).
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Advance without interpreting.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::MalformedMessage);
        }
        self.pos += n;
        Ok(())
    }

    /// Take `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::MalformedMessage);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Split off a sub-reader over the next `n` bytes (one submessage body).
    pub fn sub_reader(&mut self, n: usize) -> Result<WireReader<'a>> {
        let slice = self.read_bytes(n)?;
        Ok(WireReader {
            buf: slice,
            pos: 0,
            endianness: self.endianness,
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes: [u8; 2] = self.read_bytes(2)?.try_into().expect("2 bytes");
        Ok(match self.endianness {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().expect("4 bytes");
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a sequence number (wire: high i32 + low u32).
    pub fn read_sequence_number(&mut self) -> Result<SequenceNumber> {
        let high = self.read_i32()?;
        let low = self.read_u32()?;
        Ok(sequence_number_from_parts(high, low))
    }

    /// Read an entity id (endianness-independent octet array).
    pub fn read_entity_id(&mut self) -> Result<EntityId> {
        let bytes: EntityId = self.read_bytes(ENTITY_ID_LEN)?.try_into().expect("4 bytes");
        Ok(bytes)
    }

    /// Read a GUID prefix (endianness-independent octet array).
    pub fn read_guid_prefix(&mut self) -> Result<GuidPrefix> {
        let bytes: GuidPrefix = self
            .read_bytes(GUID_PREFIX_LEN)?
            .try_into()
            .expect("12 bytes");
        Ok(bytes)
    }
}

/// Append-only write cursor building one outbound buffer.
pub struct WireWriter {
    buf: Vec<u8>,
    endianness: Endianness,
}

impl WireWriter {
    pub fn new(endianness: Endianness) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            endianness,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        match self.endianness {
            Endianness::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        match self.endianness {
            Endianness::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_sequence_number(&mut self, sn: SequenceNumber) {
        let (high, low) = sequence_number_parts(sn);
        self.write_i32(high);
        self.write_u32(low);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Patch a previously written u16 in place (submessage length backfill).
    pub fn patch_u16(&mut self, pos: usize, value: u16) {
        let bytes = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        self.buf[pos..pos + 2].copy_from_slice(&bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
