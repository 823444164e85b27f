//! Transaction header codec.
//!
//! A transaction header is one 32-bit word packing the protocol version,
//! transaction id, word count, type code and info code. The two supported
//! versions use different field widths:
//!
//! ```text
//! version 2:  [31:28]=0x2  [27:16]=id (12)  [15:8]=words (8)  [7:4]=type (4)  [3:0]=info (4)
//! version 1:  [31:28]=0x1  [27:17]=id (11)  [16:8]=words (9)  [7:3]=type (5)  [2:0]=info (3)
//! ```
//!
//! Under version 2 an outbound request carries info code `0xF` and a
//! successful reply carries `0x0`; under version 1 both are `0x0`. Non-zero
//! reply info codes signal errors.

use super::Version;

/// Info code carried by version-2 request headers.
pub const V2_REQUEST_INFO: u32 = 0xF;

/// Info code of a successful reply header (both versions).
pub const SUCCESS_INFO: u32 = 0x0;

/// Reply info code used for transactions of unrecognized type.
pub const UNKNOWN_TYPE_INFO: u32 = 0x1;

/// Transaction type code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionType {
    /// Block read from ascending addresses.
    Read,
    /// Block write to ascending addresses.
    Write,
    /// Repeated read of a single address (FIFO-style port).
    NonIncrementingRead,
    /// Repeated write of a single address (FIFO-style port).
    NonIncrementingWrite,
    /// `value = (value & and_term) | or_term`.
    ReadModifyWriteBits,
    /// `value += addend`.
    ReadModifyWriteSum,
    /// Version-1 byte-order probe; body-less, answered with a bare header.
    ByteOrder,
    /// Anything else; carries the raw type field.
    Unknown(u32),
}

impl TransactionType {
    /// Decode a raw type field for the given protocol version.
    pub fn from_field(version: Version, field: u32) -> Self {
        match field {
            0x0 => TransactionType::Read,
            0x1 => TransactionType::Write,
            0x2 => TransactionType::NonIncrementingRead,
            0x3 => TransactionType::NonIncrementingWrite,
            0x4 => TransactionType::ReadModifyWriteBits,
            0x5 => TransactionType::ReadModifyWriteSum,
            0x1F if version == Version::V1 => TransactionType::ByteOrder,
            other => TransactionType::Unknown(other),
        }
    }

    /// The raw type field value. Masked to the version's field width when packed.
    pub fn field(self) -> u32 {
        match self {
            TransactionType::Read => 0x0,
            TransactionType::Write => 0x1,
            TransactionType::NonIncrementingRead => 0x2,
            TransactionType::NonIncrementingWrite => 0x3,
            TransactionType::ReadModifyWriteBits => 0x4,
            TransactionType::ReadModifyWriteSum => 0x5,
            TransactionType::ByteOrder => 0x1F,
            TransactionType::Unknown(raw) => raw,
        }
    }
}

/// A decoded transaction header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionHeader {
    pub type_code: TransactionType,
    pub word_count: u32,
    pub transaction_id: u32,
    pub info_code: u32,
}

impl TransactionHeader {
    /// Decode a header word under the given protocol version.
    pub fn decode(version: Version, word: u32) -> Self {
        match version {
            Version::V2 => TransactionHeader {
                type_code: TransactionType::from_field(version, (word >> 4) & 0xF),
                word_count: (word >> 8) & 0xFF,
                transaction_id: (word >> 16) & 0xFFF,
                info_code: word & 0xF,
            },
            Version::V1 => TransactionHeader {
                type_code: TransactionType::from_field(version, (word >> 3) & 0x1F),
                word_count: (word >> 8) & 0x1FF,
                transaction_id: (word >> 17) & 0x7FF,
                info_code: word & 0x7,
            },
        }
    }

    /// Encode this header under the given protocol version.
    pub fn encode(&self, version: Version) -> u32 {
        expected_header(
            version,
            self.type_code,
            self.word_count,
            self.transaction_id,
            self.info_code,
        )
    }
}

/// Build the reply header word a correctly behaving device must send for a
/// request of the given type and transaction id.
///
/// Pure bit arithmetic; the caller supplies the (version-policy-adjusted)
/// word count, see [`reply_word_count`].
pub fn expected_header(
    version: Version,
    type_code: TransactionType,
    word_count: u32,
    transaction_id: u32,
    info_code: u32,
) -> u32 {
    match version {
        Version::V2 => {
            (version.major() << 28)
                | ((transaction_id & 0xFFF) << 16)
                | ((word_count & 0xFF) << 8)
                | ((type_code.field() & 0xF) << 4)
                | (info_code & 0xF)
        }
        Version::V1 => {
            (version.major() << 28)
                | ((transaction_id & 0x7FF) << 17)
                | ((word_count & 0x1FF) << 8)
                | ((type_code.field() & 0x1F) << 3)
                | (info_code & 0x7)
        }
    }
}

/// The word count a reply header carries for a request declaring
/// `request_count` words.
///
/// Reads echo the request count under both versions. Version 1 write replies
/// echo zero where version 2 echoes the true count. Read-modify-write replies
/// always carry one. Byte-order and unrecognized types carry zero.
pub fn reply_word_count(
    version: Version,
    type_code: TransactionType,
    request_count: u32,
) -> u32 {
    match type_code {
        TransactionType::Read | TransactionType::NonIncrementingRead => request_count,
        TransactionType::Write | TransactionType::NonIncrementingWrite => match version {
            Version::V1 => 0,
            Version::V2 => request_count,
        },
        TransactionType::ReadModifyWriteBits | TransactionType::ReadModifyWriteSum => 1,
        TransactionType::ByteOrder | TransactionType::Unknown(_) => 0,
    }
}
