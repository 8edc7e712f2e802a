// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound message assembly.
//!
//! One datagram = one message header followed by submessages in wire
//! order. The engine always emits little-endian; decode accepts both.

use crate::core::types::{GuidPrefix, Time};
use crate::protocol::codec::WireWriter;
use crate::protocol::rtps::{
    AckNackSubmessage, DataSubmessage, GapSubmessage, HeartbeatSubmessage,
    InfoDestinationSubmessage, InfoTimestampSubmessage, MessageHeader,
};
use crate::protocol::Endianness;

/// Builds one outbound message for a participant.
pub struct MessageBuilder {
    w: WireWriter,
}

impl MessageBuilder {
    /// Start a message announcing `guid_prefix` as the source.
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self::with_endianness(guid_prefix, Endianness::Little)
    }

    pub fn with_endianness(guid_prefix: GuidPrefix, endianness: Endianness) -> Self {
        let mut w = WireWriter::new(endianness);
        MessageHeader::new(guid_prefix).encode(&mut w);
        Self { w }
    }

    /// Source timestamp applied to subsequent DATA submessages.
    pub fn info_ts(mut self, timestamp: Time) -> Self {
        InfoTimestampSubmessage::new(timestamp).encode(&mut self.w);
        self
    }

    /// Retarget subsequent submessages to one destination participant.
    pub fn info_dst(mut self, guid_prefix: GuidPrefix) -> Self {
        InfoDestinationSubmessage::new(guid_prefix).encode(&mut self.w);
        self
    }

    pub fn data(mut self, data: &DataSubmessage) -> Self {
        data.encode(&mut self.w);
        self
    }

    pub fn gap(mut self, gap: &GapSubmessage) -> Self {
        gap.encode(&mut self.w);
        self
    }

    pub fn heartbeat(mut self, heartbeat: &HeartbeatSubmessage) -> Self {
        heartbeat.encode(&mut self.w);
        self
    }

    pub fn acknack(mut self, acknack: &AckNackSubmessage) -> Self {
        acknack.encode(&mut self.w);
        self
    }

    /// Finish and take the datagram bytes.
    pub fn build(self) -> Vec<u8> {
        self.w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ChangeKind, ENTITYID_UNKNOWN};
    use crate::protocol::{MESSAGE_HEADER_SIZE, SUBMESSAGE_DATA, SUBMESSAGE_INFO_TS};

    #[test]
    fn test_builder_layout() {
        let data = DataSubmessage::new(
            ENTITYID_UNKNOWN,
            [0, 0, 1, 0x03],
            1,
            ChangeKind::Alive,
            b"abc".to_vec(),
        );
        let bytes = MessageBuilder::new([3; 12])
            .info_ts(Time::now())
            .data(&data)
            .build();

        assert_eq!(&bytes[0..4], b"RTPS");
        assert_eq!(bytes[MESSAGE_HEADER_SIZE], SUBMESSAGE_INFO_TS);
        // INFO_TS: header (4) + body (8)
        assert_eq!(bytes[MESSAGE_HEADER_SIZE + 12], SUBMESSAGE_DATA);
    }
}
