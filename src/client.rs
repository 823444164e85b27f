//! A minimal blocking IPbus client.
//!
//! This is the host side used by the stress harness and the end-to-end
//! tests: transactions are queued into a single control packet, then
//! [`dispatch`](ControlClient::dispatch) sends the packet and blocks until
//! the reply arrives or the socket timeout elapses. Every reply header is
//! validated against the header a correct device must produce, in the order
//! the transactions were declared.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::header::{SUCCESS_INFO, V2_REQUEST_INFO};
use crate::protocol::packet::{self, PACKET_TYPE_CONTROL, PACKET_TYPE_RESEND, PACKET_TYPE_STATUS};
use crate::protocol::{expected_header, reply_word_count, TransactionType, Version};

const MAX_DATAGRAM: usize = 2048;

/// One queued transaction, retained for reply validation.
struct Queued {
    type_code: TransactionType,
    word_count: u32,
    transaction_id: u32,
}

/// The validated outcome of one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionReply {
    /// Write acknowledged.
    Write,
    /// Read data, in address order.
    Read(Vec<u32>),
    /// Read-modify-write result (post-value under v1, pre-value under v2).
    ReadModifyWrite(u32),
}

/// Parsed status-packet reply (protocol version 2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    /// Echo of the status packet header.
    pub header: u32,
    /// Device buffer size in bytes.
    pub buffer_size_bytes: u32,
    /// Depth of the device's resend history.
    pub reply_history_depth: u32,
    /// The last control header the device saw, with its sequence number
    /// incremented: the id it expects next.
    pub next_expected_header: u32,
    /// Last 16 packet classification events, oldest first.
    pub traffic: [u8; 16],
    /// Last 4 control-packet headers received by the device, oldest first.
    pub received_headers: [u32; 4],
    /// Last 4 reply headers sent by the device, oldest first.
    pub sent_headers: [u32; 4],
}

/// A blocking IPbus client bound to one target device.
pub struct ControlClient {
    socket: UdpSocket,
    version: Version,
    next_packet_id: u16,
    next_transaction_id: u32,
    request: Vec<u32>,
    queued: Vec<Queued>,
    last_sequence: Option<u16>,
}

impl ControlClient {
    /// Connect to a device at `target` speaking `version`, with a hard reply
    /// timeout.
    pub fn connect(target: SocketAddr, version: Version, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(target)?;
        socket.set_read_timeout(Some(timeout))?;
        Ok(ControlClient {
            socket,
            version,
            next_packet_id: 1,
            next_transaction_id: 0,
            request: Vec::new(),
            queued: Vec::new(),
            last_sequence: None,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sequence number used by the most recent dispatch, if any. Version 2
    /// only; used to issue resend requests.
    pub fn last_sequence(&self) -> Option<u16> {
        self.last_sequence
    }

    fn allocate_transaction_id(&mut self) -> u32 {
        let mask = match self.version {
            Version::V1 => 0x7FF,
            Version::V2 => 0xFFF,
        };
        let id = self.next_transaction_id & mask;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    fn request_info(&self) -> u32 {
        match self.version {
            Version::V1 => SUCCESS_INFO,
            Version::V2 => V2_REQUEST_INFO,
        }
    }

    fn queue(&mut self, type_code: TransactionType, word_count: u32, body: &[u32]) {
        let transaction_id = self.allocate_transaction_id();
        let header = expected_header(
            self.version,
            type_code,
            word_count,
            transaction_id,
            self.request_info(),
        );
        self.request.push(header);
        self.request.extend_from_slice(body);
        self.queued.push(Queued {
            type_code,
            word_count,
            transaction_id,
        });
    }

    /// Queue a block write to ascending addresses starting at `address`.
    pub fn queue_write(&mut self, address: u32, data: &[u32]) {
        let mut body = Vec::with_capacity(1 + data.len());
        body.push(address);
        body.extend_from_slice(data);
        self.queue(TransactionType::Write, data.len() as u32, &body);
    }

    /// Queue a non-incrementing write: every word goes to `address`.
    pub fn queue_ni_write(&mut self, address: u32, data: &[u32]) {
        let mut body = Vec::with_capacity(1 + data.len());
        body.push(address);
        body.extend_from_slice(data);
        self.queue(TransactionType::NonIncrementingWrite, data.len() as u32, &body);
    }

    /// Queue a block read of `count` words from ascending addresses.
    pub fn queue_read(&mut self, address: u32, count: u32) {
        self.queue(TransactionType::Read, count, &[address]);
    }

    /// Queue a non-incrementing read: `count` reads of `address`.
    pub fn queue_ni_read(&mut self, address: u32, count: u32) {
        self.queue(TransactionType::NonIncrementingRead, count, &[address]);
    }

    /// Queue `value = (value & and_term) | or_term` at `address`.
    pub fn queue_rmw_bits(&mut self, address: u32, and_term: u32, or_term: u32) {
        self.queue(TransactionType::ReadModifyWriteBits, 1, &[address, and_term, or_term]);
    }

    /// Queue `value += addend` at `address`.
    pub fn queue_rmw_sum(&mut self, address: u32, addend: u32) {
        self.queue(TransactionType::ReadModifyWriteSum, 1, &[address, addend]);
    }

    /// Send the queued transactions as one control packet and block until the
    /// reply arrives (or the timeout elapses), validating every reply header
    /// against the request in declared order.
    ///
    /// The queue is cleared whether or not dispatch succeeds.
    pub fn dispatch(&mut self) -> Result<Vec<TransactionReply>> {
        let request = std::mem::take(&mut self.request);
        let queued = std::mem::take(&mut self.queued);

        let mut packet = Vec::with_capacity(1 + request.len());
        if self.version == Version::V2 {
            let sequence = self.next_packet_id;
            self.next_packet_id = self.next_packet_id.wrapping_add(1);
            self.last_sequence = Some(sequence);
            packet.push(packet::encode(sequence, PACKET_TYPE_CONTROL));
        }
        packet.extend_from_slice(&request);

        self.send_words(&packet)?;
        let reply = self.recv_words()?;

        let mut pos = 0;
        if self.version == Version::V2 {
            // the device echoes the control packet header verbatim
            let actual = *reply.first().ok_or(Error::ShortReply { offset: 0, needed: 1 })?;
            if actual != packet[0] {
                return Err(Error::UnexpectedReply {
                    expected: packet[0],
                    actual,
                });
            }
            pos = 1;
        }

        let mut replies = Vec::with_capacity(queued.len());
        for entry in &queued {
            let expected = expected_header(
                self.version,
                entry.type_code,
                reply_word_count(self.version, entry.type_code, entry.word_count),
                entry.transaction_id,
                SUCCESS_INFO,
            );
            let actual = *reply
                .get(pos)
                .ok_or(Error::ShortReply { offset: pos, needed: 1 })?;
            pos += 1;
            if actual != expected {
                return Err(Error::UnexpectedReply { expected, actual });
            }

            match entry.type_code {
                TransactionType::Read | TransactionType::NonIncrementingRead => {
                    let count = entry.word_count as usize;
                    let data = reply.get(pos..pos + count).ok_or_else(|| Error::ShortReply {
                        offset: pos,
                        needed: count - (reply.len() - pos),
                    })?;
                    pos += count;
                    replies.push(TransactionReply::Read(data.to_vec()));
                }
                TransactionType::ReadModifyWriteBits | TransactionType::ReadModifyWriteSum => {
                    let value = *reply
                        .get(pos)
                        .ok_or(Error::ShortReply { offset: pos, needed: 1 })?;
                    pos += 1;
                    replies.push(TransactionReply::ReadModifyWrite(value));
                }
                _ => replies.push(TransactionReply::Write),
            }
        }

        Ok(replies)
    }

    /// Ask the device to resend its reply for `sequence` (version 2 only).
    ///
    /// Returns the replayed reply words. The device sends nothing when it no
    /// longer holds that sequence, which surfaces here as an empty result.
    pub fn try_resend(&mut self, sequence: u16) -> Result<Vec<u32>> {
        self.send_words(&[packet::encode(sequence, PACKET_TYPE_RESEND)])?;
        match self.recv_words() {
            Ok(words) => Ok(words),
            Err(Error::Timeout) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Request and parse the device's status report (version 2 only).
    pub fn request_status(&mut self) -> Result<StatusReport> {
        let sequence = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        let header = packet::encode(sequence, PACKET_TYPE_STATUS);
        self.send_words(&[header])?;
        let reply = self.recv_words()?;

        if reply.len() < 16 {
            return Err(Error::ShortReply {
                offset: reply.len(),
                needed: 16 - reply.len(),
            });
        }
        if reply[0] != header {
            return Err(Error::UnexpectedReply {
                expected: header,
                actual: reply[0],
            });
        }

        let mut traffic = [0u8; 16];
        for (i, word) in reply[4..8].iter().enumerate() {
            traffic[i * 4..(i + 1) * 4].copy_from_slice(&word.to_be_bytes());
        }
        let mut received_headers = [0u32; 4];
        received_headers.copy_from_slice(&reply[8..12]);
        let mut sent_headers = [0u32; 4];
        sent_headers.copy_from_slice(&reply[12..16]);

        Ok(StatusReport {
            header: reply[0],
            buffer_size_bytes: reply[1],
            reply_history_depth: reply[2],
            next_expected_header: reply[3],
            traffic,
            received_headers,
            sent_headers,
        })
    }

    fn send_words(&self, words: &[u32]) -> Result<()> {
        let mut bytes = Vec::with_capacity(words.len() * 4);
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.socket.send(&bytes)?;
        Ok(())
    }

    fn recv_words(&self) -> Result<Vec<u32>> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let len = match self.socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(Error::Timeout)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(buf[..len]
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}
