// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DATA submessage codec.
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     DATA      |     flags     |      octetsToNextHeader       |
//! +---------------+---------------+-------------------------------+
//! |           extraFlags          |      octetsToInlineQos        |
//! +-------------------------------+-------------------------------+
//! |                           readerId                            |
//! +---------------------------------------------------------------+
//! |                           writerId                            |
//! +---------------------------------------------------------------+
//! |                                                               |
//! +                    writerSN (SequenceNumber)                  +
//! |                                                               |
//! +---------------------------------------------------------------+
//! |                 inlineQos (ParameterList, if Q)               |
//! +---------------------------------------------------------------+
//! |                 serializedPayload (if D)                      |
//! +---------------------------------------------------------------+
//! ```

use crate::core::types::{ChangeKind, EntityId, SequenceNumber};
use crate::protocol::codec::{WireReader, WireWriter};
use crate::protocol::rtps::{begin_submessage, finish_submessage, ParameterList};
use crate::protocol::{
    FLAG_DATA_INLINE_QOS, FLAG_DATA_KEY, FLAG_DATA_PAYLOAD, SUBMESSAGE_DATA,
};
use crate::{Error, Result};

/// Octets from after octetsToInlineQos to the inline QoS: readerId (4) +
/// writerId (4) + writerSN (8).
const OCTETS_TO_INLINE_QOS: u16 = 16;

/// DATA submessage: one change from a writer to matching readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSubmessage {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub writer_sn: SequenceNumber,
    pub inline_qos: Option<ParameterList>,
    pub payload: Option<Vec<u8>>,
}

impl DataSubmessage {
    /// Build a DATA submessage for a change of the given kind.
    ///
    /// Non-ALIVE kinds ride as the status-info inline QoS parameter.
    pub fn new(
        reader_id: EntityId,
        writer_id: EntityId,
        writer_sn: SequenceNumber,
        kind: ChangeKind,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            reader_id,
            writer_id,
            writer_sn,
            inline_qos: ParameterList::for_change_kind(kind),
            payload: if payload.is_empty() && kind != ChangeKind::Alive {
                None
            } else {
                Some(payload)
            },
        }
    }

    /// Change kind declared by the inline QoS, `Alive` if absent.
    pub fn change_kind(&self) -> ChangeKind {
        self.inline_qos
            .as_ref()
            .map_or(ChangeKind::Alive, ParameterList::change_kind)
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let mut flags = 0u8;
        if self.inline_qos.is_some() {
            flags |= FLAG_DATA_INLINE_QOS;
        }
        if self.payload.is_some() {
            flags |= FLAG_DATA_PAYLOAD;
        }

        let len_pos = begin_submessage(w, SUBMESSAGE_DATA, flags);
        w.write_u16(0); // extraFlags
        w.write_u16(OCTETS_TO_INLINE_QOS);
        w.write_bytes(&self.reader_id);
        w.write_bytes(&self.writer_id);
        w.write_sequence_number(self.writer_sn);

        if let Some(qos) = &self.inline_qos {
            qos.encode(w);
        }
        if let Some(payload) = &self.payload {
            w.write_bytes(payload);
        }

        finish_submessage(w, len_pos);
    }

    /// Decode a DATA body. The reader covers exactly the body and already
    /// carries the submessage endianness.
    pub fn decode(flags: u8, body: &mut WireReader<'_>) -> Result<Self> {
        if flags & FLAG_DATA_KEY != 0 && flags & FLAG_DATA_PAYLOAD != 0 {
            log::debug!("[DATA] Both data and key flags set, dropping");
            return Err(Error::MalformedMessage);
        }

        body.skip(2)?; // extraFlags
        let octets_to_inline_qos = body.read_u16()?;
        if octets_to_inline_qos < OCTETS_TO_INLINE_QOS {
            return Err(Error::MalformedMessage);
        }

        let reader_id = body.read_entity_id()?;
        let writer_id = body.read_entity_id()?;
        let writer_sn = body.read_sequence_number()?;
        if writer_sn <= 0 {
            return Err(Error::MalformedMessage);
        }

        // Future minor versions may put extra fields before the inline QoS.
        body.skip(usize::from(octets_to_inline_qos - OCTETS_TO_INLINE_QOS))?;

        let inline_qos = if flags & FLAG_DATA_INLINE_QOS != 0 {
            Some(ParameterList::decode(body)?)
        } else {
            None
        };

        let payload = if flags & FLAG_DATA_PAYLOAD != 0 {
            Some(body.read_bytes(body.remaining())?.to_vec())
        } else {
            if flags & FLAG_DATA_KEY != 0 {
                // Serialized keys are not interpreted by this engine.
                body.skip(body.remaining())?;
            }
            None
        };

        Ok(Self {
            reader_id,
            writer_id,
            writer_sn,
            inline_qos,
            payload,
        })
    }
}
