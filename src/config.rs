//! Configuration for the dummy hardware and its UDP front-end.

use std::net::SocketAddr;
use std::time::Duration;

use crate::memory::ADDRESS_MASK;
use crate::protocol::Version;

/// Static dummy-hardware configuration (set at construction time).
#[derive(Clone, Debug)]
pub struct DummyConfig {
    /// IPbus major version the device speaks.
    pub version: Version,
    /// Artificial delay applied to the first reply only, modeling device
    /// warm-up. `None` replies immediately from the start.
    pub reply_delay: Option<Duration>,
    /// Address mask of the emulated register file (`size = mask + 1`).
    pub address_mask: u32,
    /// Address the UDP front-end binds to.
    pub bind_address: SocketAddr,
    /// Socket read timeout of the UDP front-end; bounds how long a stop
    /// request waits for the server loop to notice it.
    pub read_timeout: Duration,
}

impl DummyConfig {
    /// Configuration for the given protocol version.
    ///
    /// Binds to `127.0.0.1:0` by default (ephemeral port for testing).
    pub fn new(version: Version) -> Self {
        DummyConfig {
            version,
            reply_delay: None,
            address_mask: ADDRESS_MASK,
            bind_address: "127.0.0.1:0".parse().unwrap(),
            read_timeout: Duration::from_millis(100),
        }
    }

    /// Delay the first reply by `delay`, then reply immediately forever after.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// Shrink (or grow) the emulated address space. Mask must be `2^n - 1`.
    pub fn with_address_mask(mut self, mask: u32) -> Self {
        self.address_mask = mask;
        self
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the socket read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
