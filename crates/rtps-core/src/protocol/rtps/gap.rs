// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GAP submessage codec.
//!
//! A writer uses GAP to declare sequence numbers it will never send to a
//! reader: the contiguous range `[gapStart, gapList.base)` plus every bit
//! set in `gapList`.

use crate::core::types::{EntityId, SequenceNumber};
use crate::protocol::codec::{WireReader, WireWriter};
use crate::protocol::rtps::{begin_submessage, finish_submessage, SequenceNumberSet};
use crate::protocol::SUBMESSAGE_GAP;
use crate::{Error, Result};

/// GAP submessage: irrelevant sequence numbers for one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    /// First irrelevant sequence number (inclusive).
    pub gap_start: SequenceNumber,
    /// Additional irrelevant sequences at and beyond `gap_list.base()`;
    /// everything in `[gap_start, gap_list.base())` is irrelevant too.
    pub gap_list: SequenceNumberSet,
}

impl GapSubmessage {
    pub fn new(
        reader_id: EntityId,
        writer_id: EntityId,
        gap_start: SequenceNumber,
        gap_list: SequenceNumberSet,
    ) -> Self {
        Self {
            reader_id,
            writer_id,
            gap_start,
            gap_list,
        }
    }

    /// Build GAP submessages covering `sequences` (sorted, unique, > 0).
    ///
    /// Each submessage covers a leading contiguous run plus up to 256
    /// bitmap positions; sequences beyond the window spill into further
    /// submessages.
    pub fn from_sequences(
        reader_id: EntityId,
        writer_id: EntityId,
        sequences: &[SequenceNumber],
    ) -> Vec<Self> {
        let mut gaps = Vec::new();
        let mut i = 0;

        while i < sequences.len() {
            let start = sequences[i];
            let mut j = i + 1;
            while j < sequences.len() && sequences[j] == sequences[j - 1] + 1 {
                j += 1;
            }

            let mut gap_list = SequenceNumberSet::empty(sequences[j - 1] + 1);
            while j < sequences.len() && gap_list.insert(sequences[j]) {
                j += 1;
            }

            gaps.push(Self::new(reader_id, writer_id, start, gap_list));
            i = j;
        }

        gaps
    }

    /// Expand into explicit irrelevant sequence numbers, in order.
    pub fn irrelevant_sequences(&self) -> Vec<SequenceNumber> {
        let mut seqs: Vec<SequenceNumber> = (self.gap_start..self.gap_list.base()).collect();
        seqs.extend(self.gap_list.iter());
        seqs
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let len_pos = begin_submessage(w, SUBMESSAGE_GAP, 0);
        w.write_bytes(&self.reader_id);
        w.write_bytes(&self.writer_id);
        w.write_sequence_number(self.gap_start);
        self.gap_list.encode(w);
        finish_submessage(w, len_pos);
    }

    pub fn decode(_flags: u8, body: &mut WireReader<'_>) -> Result<Self> {
        let reader_id = body.read_entity_id()?;
        let writer_id = body.read_entity_id()?;
        let gap_start = body.read_sequence_number()?;
        let gap_list = SequenceNumberSet::decode(body)?;

        if gap_start <= 0 || gap_list.base() < gap_start {
            return Err(Error::MalformedMessage);
        }

        Ok(Self {
            reader_id,
            writer_id,
            gap_start,
            gap_list,
        })
    }
}
