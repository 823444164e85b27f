//! IPbus wire protocol: transaction headers, packet headers and classification.
//!
//! Two major protocol versions are supported. The version is fixed when a
//! responder or client is constructed and is never renegotiated per packet:
//!
//! - **Version 1** (IPbus 1.3): transactions are sent back-to-back with no
//!   packet-level framing. Write replies echo a word count of zero and
//!   read-modify-write replies carry the *post*-modification register value.
//! - **Version 2** (IPbus 2.0): every packet starts with a packet header
//!   carrying a 16-bit sequence number and a packet type (control, status,
//!   resend). Write replies echo the true word count and read-modify-write
//!   replies carry the *pre*-modification register value.

pub mod header;
pub mod packet;

pub use header::{expected_header, reply_word_count, TransactionHeader, TransactionType};
pub use packet::{PacketKind, PACKET_TYPE_CONTROL, PACKET_TYPE_RESEND, PACKET_TYPE_STATUS};

/// IPbus protocol major version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    /// IPbus 1.3.
    V1,
    /// IPbus 2.0.
    V2,
}

impl Version {
    /// The major version number as it appears in the top nibble of headers.
    pub fn major(self) -> u32 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }

    /// Parse a major version number (1 or 2).
    pub fn from_major(major: u32) -> Option<Self> {
        match major {
            1 => Some(Version::V1),
            2 => Some(Version::V2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.major())
    }
}
