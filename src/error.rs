//! Crate-level error types.
//!
//! The responder itself never surfaces protocol errors to the transport:
//! unknown transaction types get error-coded reply headers and bad addresses
//! wrap. These errors belong to the client side, where a reply can be
//! missing, short or mismatched.

/// Crate-level error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An I/O error from the underlying socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived before the socket timeout elapsed.
    #[error("timed out waiting for reply")]
    Timeout,

    /// The reply ended before all queued transactions were answered.
    #[error("short reply: needed {needed} more word(s) at offset {offset}")]
    ShortReply { offset: usize, needed: usize },

    /// A reply header did not match the header the request called for.
    #[error("unexpected reply header: expected {expected:#010x}, got {actual:#010x}")]
    UnexpectedReply { expected: u32, actual: u32 },
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;
