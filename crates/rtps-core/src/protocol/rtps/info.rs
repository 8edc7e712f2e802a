// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! INFO_TS and INFO_DST submessage codecs.
//!
//! Both mutate the receiver's per-message interpretation state: INFO_TS
//! sets the source timestamp applied to subsequent DATA submessages,
//! INFO_DST retargets the destination participant.

use crate::core::types::{GuidPrefix, Time};
use crate::protocol::codec::{WireReader, WireWriter};
use crate::protocol::rtps::{begin_submessage, finish_submessage};
use crate::protocol::{FLAG_INFO_TS_INVALIDATE, SUBMESSAGE_INFO_DST, SUBMESSAGE_INFO_TS};
use crate::Result;

/// INFO_TS submessage: source timestamp for subsequent DATA.
///
/// `None` encodes the Invalidate flag: subsequent DATA carries no
/// timestamp until the next INFO_TS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoTimestampSubmessage {
    pub timestamp: Option<Time>,
}

impl InfoTimestampSubmessage {
    pub fn new(timestamp: Time) -> Self {
        Self {
            timestamp: Some(timestamp),
        }
    }

    pub fn invalidate() -> Self {
        Self { timestamp: None }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let extra_flags = if self.timestamp.is_none() {
            FLAG_INFO_TS_INVALIDATE
        } else {
            0
        };
        let len_pos = begin_submessage(w, SUBMESSAGE_INFO_TS, extra_flags);
        if let Some(ts) = self.timestamp {
            w.write_i32(ts.seconds);
            w.write_u32(ts.fraction);
        }
        finish_submessage(w, len_pos);
    }

    pub fn decode(flags: u8, body: &mut WireReader<'_>) -> Result<Self> {
        if flags & FLAG_INFO_TS_INVALIDATE != 0 {
            return Ok(Self::invalidate());
        }

        let seconds = body.read_i32()?;
        let fraction = body.read_u32()?;
        Ok(Self::new(Time { seconds, fraction }))
    }
}

/// INFO_DST submessage: destination GUID prefix for subsequent
/// submessages. All zeros readdresses to every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoDestinationSubmessage {
    pub guid_prefix: GuidPrefix,
}

impl InfoDestinationSubmessage {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self { guid_prefix }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        let len_pos = begin_submessage(w, SUBMESSAGE_INFO_DST, 0);
        w.write_bytes(&self.guid_prefix);
        finish_submessage(w, len_pos);
    }

    pub fn decode(_flags: u8, body: &mut WireReader<'_>) -> Result<Self> {
        let guid_prefix = body.read_guid_prefix()?;
        Ok(Self { guid_prefix })
    }
}
