// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ACKNACK submessage codec.
//!
//! A reader acknowledges everything below `readerSNState.base()` and
//! requests retransmission of every sequence number set in the bitmap.
//! An empty set is a pure positive acknowledgment. The Final flag means
//! the reader is synchronized and expects nothing further.

use crate::core::types::{EntityId, SequenceNumber};
use crate::protocol::codec::{WireReader, WireWriter};
use crate::protocol::rtps::{begin_submessage, finish_submessage, SequenceNumberSet};
use crate::protocol::{FLAG_FINAL, SUBMESSAGE_ACKNACK};
use crate::{Error, Result};

/// ACKNACK submessage: acknowledgment plus retransmission requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckNackSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub reader_sn_state: SequenceNumberSet,
    /// Monotonic acknack counter (replay suppression).
    pub count: u32,
    /// Reader is synchronized.
    pub final_flag: bool,
}

impl AckNackSubmessage {
    pub fn new(
        reader_id: EntityId,
        writer_id: EntityId,
        reader_sn_state: SequenceNumberSet,
        count: u32,
        final_flag: bool,
    ) -> Self {
        Self {
            reader_id,
            writer_id,
            reader_sn_state,
            count,
            final_flag,
        }
    }

    /// Highest sequence number acknowledged by this acknack.
    pub fn acked_through(&self) -> SequenceNumber {
        self.reader_sn_state.base() - 1
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let extra_flags = if self.final_flag { FLAG_FINAL } else { 0 };
        let len_pos = begin_submessage(w, SUBMESSAGE_ACKNACK, extra_flags);
        w.write_bytes(&self.reader_id);
        w.write_bytes(&self.writer_id);
        self.reader_sn_state.encode(w);
        w.write_u32(self.count);
        finish_submessage(w, len_pos);
    }

    pub fn decode(flags: u8, body: &mut WireReader<'_>) -> Result<Self> {
        let reader_id = body.read_entity_id()?;
        let writer_id = body.read_entity_id()?;
        let reader_sn_state = SequenceNumberSet::decode(body)?;
        let count = body.read_u32()?;

        if reader_sn_state.base() <= 0 {
            return Err(Error::MalformedMessage);
        }

        Ok(Self {
            reader_id,
            writer_id,
            reader_sn_state,
            count,
            final_flag: flags & FLAG_FINAL != 0,
        })
    }
}
