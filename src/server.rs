//! UDP front-end exposing a [`DummyHardware`] responder on the network.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::DummyConfig;
use crate::responder::{DummyHardware, BUFFER_SIZE};

/// A UDP server owning one dummy-hardware responder.
///
/// One datagram is fully analyzed and replied to before the next is read;
/// the responder needs no internal locking.
pub struct DummyServer {
    socket: UdpSocket,
    responder: DummyHardware,
    running: Arc<AtomicBool>,
}

impl DummyServer {
    /// Bind the server socket and build the responder per `config`.
    pub fn new(config: DummyConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.bind_address)?;
        socket.set_read_timeout(Some(config.read_timeout))?;

        log::info!(
            "dummy hardware (IPbus v{}) listening on {}",
            config.version,
            socket.local_addr()?
        );

        Ok(DummyServer {
            socket,
            responder: DummyHardware::from_config(&config),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// The server's local address.
    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Get a handle to control the running flag.
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Start the server in a background thread and return a handle.
    pub fn spawn(self) -> ServerHandle {
        let addr = self.addr();
        let running = self.running_handle();

        let handle = thread::spawn(move || {
            self.run();
        });

        ServerHandle {
            addr,
            running,
            handle: Some(handle),
        }
    }

    /// Run the server loop (blocking).
    pub fn run(mut self) {
        let mut buf = [0u8; BUFFER_SIZE * 4];

        while self.running.load(Ordering::SeqCst) {
            let (len, src) = match self.socket.recv_from(&mut buf) {
                Ok(result) => result,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    log::error!("socket error: {}", e);
                    break;
                }
            };

            if len < 4 {
                continue;
            }

            let receive = self.responder.receive_mut();
            for (slot, chunk) in receive.iter_mut().zip(buf[..len].chunks_exact(4)) {
                *slot = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }

            self.responder.analyze_received_and_create_reply(len);

            let reply = self.responder.reply();
            if reply.is_empty() {
                log::debug!("no reply content for packet from {}", src);
                continue;
            }

            let mut out = Vec::with_capacity(reply.len() * 4);
            for word in reply {
                out.extend_from_slice(&word.to_le_bytes());
            }
            if let Err(e) = self.socket.send_to(&out, src) {
                log::error!("failed to send reply to {}: {}", src, e);
            }
        }

        log::info!("dummy hardware stopped");
    }
}

/// Handle for controlling a spawned server.
pub struct ServerHandle {
    /// The server's local address.
    pub addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop the server. The loop exits after its next read timeout.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
