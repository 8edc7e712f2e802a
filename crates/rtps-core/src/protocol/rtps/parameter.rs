// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter list codec.
//!
//! A sequence of `{pid (2), length (2), value}` triples terminated by
//! `PID_SENTINEL`. Values are padded to 4-byte alignment. Unknown pids are
//! carried as opaque bytes; a decoder must tolerate them by skipping
//! `length` bytes.

use crate::core::types::ChangeKind;
use crate::protocol::codec::{WireReader, WireWriter};
use crate::{Error, Result};

/// Terminates a parameter list.
pub const PID_SENTINEL: u16 = 0x0001;
/// Padding parameter (ignored).
pub const PID_PAD: u16 = 0x0000;
/// Status info: dispose/unregister flags for the enclosing DATA.
pub const PID_STATUS_INFO: u16 = 0x0071;

const STATUS_INFO_DISPOSED: u8 = 0x01;
const STATUS_INFO_UNREGISTERED: u8 = 0x02;

/// One `{pid, value}` entry; the value is opaque to the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub pid: u16,
    pub value: Vec<u8>,
}

/// Sentinel-terminated list of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterList {
    pub parameters: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Append a parameter.
    pub fn push(&mut self, pid: u16, value: Vec<u8>) {
        self.parameters.push(Parameter { pid, value });
    }

    /// First value for a pid.
    pub fn find(&self, pid: u16) -> Option<&[u8]> {
        self.parameters
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| p.value.as_slice())
    }

    /// Build a list carrying only the status-info parameter for `kind`.
    ///
    /// `Alive` needs no parameter; callers skip the list entirely.
    pub fn for_change_kind(kind: ChangeKind) -> Option<Self> {
        let flags = match kind {
            ChangeKind::Alive => return None,
            ChangeKind::NotAliveDisposed => STATUS_INFO_DISPOSED,
            ChangeKind::NotAliveUnregistered => STATUS_INFO_UNREGISTERED,
        };

        let mut list = Self::new();
        list.push(PID_STATUS_INFO, vec![0, 0, 0, flags]);
        Some(list)
    }

    /// Change kind declared by the status-info parameter, `Alive` if absent.
    pub fn change_kind(&self) -> ChangeKind {
        let Some(value) = self.find(PID_STATUS_INFO) else {
            return ChangeKind::Alive;
        };
        let Some(&flags) = value.get(3) else {
            return ChangeKind::Alive;
        };

        if flags & STATUS_INFO_DISPOSED != 0 {
            ChangeKind::NotAliveDisposed
        } else if flags & STATUS_INFO_UNREGISTERED != 0 {
            ChangeKind::NotAliveUnregistered
        } else {
            ChangeKind::Alive
        }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        for param in &self.parameters {
            let padded = param.value.len().div_ceil(4) * 4;
            w.write_u16(param.pid);
            w.write_u16(padded as u16);
            w.write_bytes(&param.value);
            for _ in param.value.len()..padded {
                w.write_u8(0);
            }
        }
        w.write_u16(PID_SENTINEL);
        w.write_u16(0);
    }

    /// Decode up to and including the sentinel.
    ///
    /// A length field overrunning the remaining buffer fails with
    /// [`Error::MalformedMessage`].
    pub fn decode(rdr: &mut WireReader<'_>) -> Result<Self> {
        let mut list = Self::new();

        loop {
            let pid = rdr.read_u16()?;
            let length = usize::from(rdr.read_u16()?);

            if pid == PID_SENTINEL {
                return Ok(list);
            }

            let value = rdr.read_bytes(length)?;
            if pid != PID_PAD {
                list.push(pid, value.to_vec());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Endianness;

    fn roundtrip(list: &ParameterList) -> ParameterList {
        let mut w = WireWriter::new(Endianness::Little);
        list.encode(&mut w);
        let bytes = w.into_bytes();
        let mut rdr = WireReader::new(&bytes);
        ParameterList::decode(&mut rdr).expect("decode")
    }

    #[test]
    fn test_empty_list_roundtrip() {
        let list = ParameterList::new();
        assert_eq!(roundtrip(&list), list);
    }

    #[test]
    fn test_status_info_roundtrip() {
        for kind in [ChangeKind::NotAliveDisposed, ChangeKind::NotAliveUnregistered] {
            let list = ParameterList::for_change_kind(kind).expect("non-alive");
            assert_eq!(roundtrip(&list).change_kind(), kind);
        }
        assert!(ParameterList::for_change_kind(ChangeKind::Alive).is_none());
    }

    #[test]
    fn test_unknown_pid_is_carried() {
        let mut list = ParameterList::new();
        list.push(0x7FDE, vec![1, 2, 3, 4]);
        let decoded = roundtrip(&list);
        assert_eq!(decoded.find(0x7FDE), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(decoded.change_kind(), ChangeKind::Alive);
    }

    #[test]
    fn test_value_padding_to_four() {
        let mut list = ParameterList::new();
        list.push(0x7FDE, vec![0xAA]);

        let mut w = WireWriter::new(Endianness::Little);
        list.encode(&mut w);
        let bytes = w.into_bytes();
        // pid(2) + len(2) + padded value(4) + sentinel(4)
        assert_eq!(bytes.len(), 12);

        let mut rdr = WireReader::new(&bytes);
        let decoded = ParameterList::decode(&mut rdr).expect("decode");
        assert_eq!(decoded.find(0x7FDE), Some(&[0xAA, 0, 0, 0][..]));
    }

    #[test]
    fn test_missing_sentinel_is_malformed() {
        let mut w = WireWriter::new(Endianness::Little);
        w.write_u16(0x7FDE);
        w.write_u16(4);
        w.write_u32(0);
        // no sentinel
        let bytes = w.into_bytes();

        let mut rdr = WireReader::new(&bytes);
        assert!(matches!(
            ParameterList::decode(&mut rdr),
            Err(Error::MalformedMessage)
        ));
    }

    #[test]
    fn test_overrunning_length_is_malformed() {
        let mut w = WireWriter::new(Endianness::Little);
        w.write_u16(0x7FDE);
        w.write_u16(64); // promises more than the buffer holds
        w.write_u32(0);
        let bytes = w.into_bytes();

        let mut rdr = WireReader::new(&bytes);
        assert!(ParameterList::decode(&mut rdr).is_err());
    }
}
