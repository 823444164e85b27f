//! Version-2 packet header codec and classification.
//!
//! A packet header is one 32-bit word:
//!
//! ```text
//! [31:28] version = 0x2    [27:24] reserved
//! [23:8]  packet id (16-bit sequence number)
//! [7:4]   byte-order qualifier = 0xF
//! [3:0]   packet type
//! ```
//!
//! Version-1 traffic has no packet headers; a datagram body is a bare
//! transaction stream.

/// Packet type nibble: control packet (transaction stream follows).
pub const PACKET_TYPE_CONTROL: u32 = 0x0;
/// Packet type nibble: status/introspection request.
pub const PACKET_TYPE_STATUS: u32 = 0x1;
/// Packet type nibble: resend request for a previously sent reply.
pub const PACKET_TYPE_RESEND: u32 = 0x2;

const BYTE_ORDER_QUALIFIER: u32 = 0xF;

/// Classification of a packet-level header word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Control,
    Status,
    Resend,
    Unknown,
}

impl PacketKind {
    /// Classify a packet header word.
    ///
    /// A word whose version or byte-order-qualifier nibble does not match the
    /// version-2 layout is `Unknown`, as is any unassigned packet type.
    pub fn classify(word: u32) -> Self {
        if (word >> 28) != 0x2 || ((word >> 4) & 0xF) != BYTE_ORDER_QUALIFIER {
            return PacketKind::Unknown;
        }
        match word & 0xF {
            PACKET_TYPE_CONTROL => PacketKind::Control,
            PACKET_TYPE_STATUS => PacketKind::Status,
            PACKET_TYPE_RESEND => PacketKind::Resend,
            _ => PacketKind::Unknown,
        }
    }
}

/// Encode a packet header word.
pub fn encode(packet_id: u16, packet_type: u32) -> u32 {
    (0x2 << 28)
        | ((packet_id as u32) << 8)
        | (BYTE_ORDER_QUALIFIER << 4)
        | (packet_type & 0xF)
}

/// Extract the 16-bit packet sequence number from a header word.
pub fn packet_id(word: u32) -> u16 {
    ((word >> 8) & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_packet_types() {
        assert_eq!(PacketKind::classify(0x2000_00F0), PacketKind::Control);
        assert_eq!(PacketKind::classify(0x2000_00F1), PacketKind::Status);
        assert_eq!(PacketKind::classify(0x2000_00F2), PacketKind::Resend);
        assert_eq!(PacketKind::classify(0x2000_00F7), PacketKind::Unknown);
        // wrong version nibble
        assert_eq!(PacketKind::classify(0x1000_00F0), PacketKind::Unknown);
        // wrong byte-order qualifier
        assert_eq!(PacketKind::classify(0x2000_0000), PacketKind::Unknown);
    }

    #[test]
    fn encode_carries_sequence_number() {
        let word = encode(0xBEEF, PACKET_TYPE_CONTROL);
        assert_eq!(word, 0x20BE_EFF0);
        assert_eq!(packet_id(word), 0xBEEF);
        assert_eq!(PacketKind::classify(word), PacketKind::Control);
    }

    #[test]
    fn initial_header_is_control_with_id_zero() {
        assert_eq!(encode(0, PACKET_TYPE_CONTROL), 0x2000_00F0);
    }
}
