//! Software emulation of IPbus hardware for testing register-access clients.
//!
//! IPbus is a simple request/reply protocol for reading and writing 32-bit
//! registers on network-attached hardware. This crate implements a "dummy
//! hardware" device: a packet responder backed by an in-memory register file
//! that behaves bit-for-bit like a real device, so a hardware-access client
//! (and its packet dispatch logic) can be validated without hardware on the
//! bench.
//!
//! Both IPbus major versions are emulated, including their deliberate
//! wire-level asymmetries: version 1 write replies echo a word count of zero
//! and read-modify-write replies return the post-modification value, where
//! version 2 echoes the true count and returns the pre-modification value.
//! Version 2 adds packet-level framing with status introspection and
//! resend-from-history recovery, which the responder backs with bounded
//! history buffers.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ipbus_dummy::{ControlClient, DummyConfig, DummyServer, TransactionReply, Version};
//!
//! // Start a version-2 device on an ephemeral port
//! let server = DummyServer::new(DummyConfig::new(Version::V2))?;
//! let handle = server.spawn();
//!
//! // Issue a block write and read it back in one packet
//! let mut client = ControlClient::connect(handle.addr, Version::V2, Duration::from_secs(1))?;
//! client.queue_write(0x10, &[1, 2, 3, 4]);
//! client.queue_read(0x10, 4);
//! let replies = client.dispatch()?;
//! assert_eq!(replies[1], TransactionReply::Read(vec![1, 2, 3, 4]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
mod error;
pub mod history;
pub mod memory;
pub mod protocol;
pub mod responder;
pub mod server;

// Crate-level error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{
    expected_header, PacketKind, TransactionHeader, TransactionType, Version,
};

// Device emulation
pub use config::DummyConfig;
pub use memory::{RegisterFile, ADDRESS_MASK};
pub use responder::{DummyHardware, ReplyDelay, BUFFER_SIZE, REPLY_HISTORY_DEPTH};
pub use server::{DummyServer, ServerHandle};

// Client side
pub use client::{ControlClient, StatusReport, TransactionReply};
