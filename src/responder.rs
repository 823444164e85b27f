//! The dummy hardware itself: a packet responder that emulates an IPbus
//! device against a memory-backed register file.
//!
//! One responder owns all of its state and processes one packet at a time;
//! there is no internal locking. Feed a packet into the receive buffer, call
//! [`DummyHardware::analyze_received_and_create_reply`], then read the reply
//! buffer. The responder also keeps the bounded histories that back the
//! status and resend introspection packets of protocol version 2.

use std::thread;
use std::time::Duration;

use crate::config::DummyConfig;
use crate::history::{BoundedRing, ReplyHistory};
use crate::memory::RegisterFile;
use crate::protocol::header::{SUCCESS_INFO, UNKNOWN_TYPE_INFO};
use crate::protocol::packet::{self, PacketKind};
use crate::protocol::{expected_header, reply_word_count, TransactionHeader, TransactionType, Version};

/// Receive/reply buffer capacity, in 32-bit words.
pub const BUFFER_SIZE: usize = 500;

/// How many reply packets are retained for resend requests.
pub const REPLY_HISTORY_DEPTH: usize = 5;

/// How many packet-classification events the traffic history retains.
pub const TRAFFIC_HISTORY_DEPTH: usize = 16;

/// Depth of the received/sent control-header rings.
pub const HEADER_HISTORY_DEPTH: usize = 4;

/// Traffic-history event code: control packet seen.
pub const TRAFFIC_CONTROL: u8 = 2;
/// Traffic-history event code: status packet seen.
pub const TRAFFIC_STATUS: u8 = 3;
/// Traffic-history event code: resend packet seen.
pub const TRAFFIC_RESEND: u8 = 4;
/// Traffic-history event code: unclassifiable packet seen.
pub const TRAFFIC_UNKNOWN: u8 = 5;

// Packet header the responder assumes before it has seen any: control, id 0.
const INITIAL_PACKET_HEADER: u32 = 0x2000_00F0;

/// One-shot artificial reply delay, modeling a device that is slow to answer
/// its very first request after power-up.
///
/// The pending state is consumed by the first packet analyzed and never
/// returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyDelay {
    Pending(Duration),
    Consumed,
}

impl ReplyDelay {
    /// Take the delay if it is still pending, transitioning to `Consumed`.
    pub fn take(&mut self) -> Option<Duration> {
        match *self {
            ReplyDelay::Pending(delay) => {
                *self = ReplyDelay::Consumed;
                Some(delay)
            }
            ReplyDelay::Consumed => None,
        }
    }
}

/// A software IPbus device.
pub struct DummyHardware {
    version: Version,
    memory: RegisterFile,
    reply_delay: ReplyDelay,
    receive: Vec<u32>,
    reply: Vec<u32>,
    reply_history: ReplyHistory,
    /// Header of the packet currently (or most recently) analyzed.
    packet_header: u32,
    /// Most recent control packet header, fed into status replies.
    last_control_header: u32,
    traffic_history: BoundedRing<u8>,
    received_headers: BoundedRing<u32>,
    sent_headers: BoundedRing<u32>,
}

impl DummyHardware {
    /// A device speaking the given protocol version, with a full-size
    /// register file and no reply delay.
    pub fn new(version: Version) -> Self {
        DummyHardware {
            version,
            memory: RegisterFile::new(),
            reply_delay: ReplyDelay::Consumed,
            receive: vec![0; BUFFER_SIZE],
            reply: Vec::with_capacity(BUFFER_SIZE),
            reply_history: ReplyHistory::new(REPLY_HISTORY_DEPTH),
            packet_header: INITIAL_PACKET_HEADER,
            last_control_header: INITIAL_PACKET_HEADER,
            traffic_history: BoundedRing::new(TRAFFIC_HISTORY_DEPTH, 0),
            received_headers: BoundedRing::new(HEADER_HISTORY_DEPTH, 0),
            sent_headers: BoundedRing::new(HEADER_HISTORY_DEPTH, 0),
        }
    }

    /// A device configured per `config` (version, reply delay, address mask).
    pub fn from_config(config: &DummyConfig) -> Self {
        let mut hw = DummyHardware::new(config.version);
        hw.memory = RegisterFile::with_mask(config.address_mask);
        if let Some(delay) = config.reply_delay {
            hw.reply_delay = ReplyDelay::Pending(delay);
        }
        hw
    }

    /// Delay the first reply by `delay`.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = ReplyDelay::Pending(delay);
        self
    }

    /// Use a register file with a custom address mask.
    pub fn with_address_mask(mut self, mask: u32) -> Self {
        self.memory = RegisterFile::with_mask(mask);
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The inbound packet buffer; the transport writes received words here
    /// before calling [`analyze_received_and_create_reply`](Self::analyze_received_and_create_reply).
    pub fn receive_mut(&mut self) -> &mut [u32] {
        &mut self.receive
    }

    /// The reply produced by the last analysis. Empty when the packet called
    /// for no reply (unknown packet, resend miss).
    pub fn reply(&self) -> &[u32] {
        &self.reply
    }

    /// Direct access to the emulated register file.
    pub fn memory(&self) -> &RegisterFile {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut RegisterFile {
        &mut self.memory
    }

    /// Analyze `byte_count` bytes of the receive buffer and assemble the
    /// reply packet.
    ///
    /// Clears the previous reply, walks the packet through the classification
    /// state machine, applies the one-shot reply delay if still pending, and
    /// finally records the finished reply in the resend history under the
    /// packet's 16-bit sequence number.
    pub fn analyze_received_and_create_reply(&mut self, byte_count: usize) {
        self.reply.clear();
        let word_count = (byte_count / 4).min(self.receive.len());
        log::debug!("analyzing {} received words", word_count);

        let receive = std::mem::take(&mut self.receive);
        self.process_packet(&receive[..word_count]);
        self.receive = receive;

        if let Some(delay) = self.reply_delay.take() {
            log::info!("delaying first reply by {:?}", delay);
            thread::sleep(delay);
            log::info!("now replying");
        }

        let sequence = packet::packet_id(self.packet_header);
        self.reply_history.insert(sequence, self.reply.clone());
    }

    // ---------------------------------------------------------------------
    //  Packet state machine
    // ---------------------------------------------------------------------

    fn process_packet(&mut self, words: &[u32]) {
        if words.is_empty() {
            return;
        }
        match self.version {
            // Version 1 has no packet framing: the datagram body is a bare
            // transaction stream, implicitly a control packet.
            Version::V1 => self.run_transactions(words),
            Version::V2 => {
                let header = words[0];
                self.packet_header = header;
                match PacketKind::classify(header) {
                    PacketKind::Control => {
                        self.reply.push(header);
                        self.last_control_header = header;
                        self.traffic_history.push(TRAFFIC_CONTROL);
                        self.run_transactions(&words[1..]);
                    }
                    PacketKind::Status => self.status_packet(header),
                    PacketKind::Resend => self.resend_packet(header),
                    PacketKind::Unknown => {
                        log::debug!("unclassifiable packet header {:#010x}", header);
                        self.traffic_history.push(TRAFFIC_UNKNOWN);
                    }
                }
            }
        }
    }

    fn status_packet(&mut self, header: u32) {
        self.reply.push(header);
        self.reply.push((BUFFER_SIZE * 4) as u32);
        self.reply.push(REPLY_HISTORY_DEPTH as u32);

        // The last control header with its 16-bit sequence number bumped by
        // one: the id the device expects from the next control packet.
        let next_id = (self.last_control_header >> 8).wrapping_add(1);
        self.reply
            .push((self.last_control_header & 0xFF00_00FF) | ((next_id << 8) & 0x00FF_FF00));

        // Last 16 traffic events packed 4 per word, oldest in the most
        // significant byte.
        let events = self.traffic_history.to_vec();
        for chunk in events.chunks(4) {
            let mut word = 0u32;
            for &event in chunk {
                word = (word << 8) | u32::from(event);
            }
            self.reply.push(word);
        }

        let received = self.received_headers.to_vec();
        self.reply.extend_from_slice(&received);
        let sent = self.sent_headers.to_vec();
        self.reply.extend_from_slice(&sent);

        self.traffic_history.push(TRAFFIC_STATUS);
    }

    fn resend_packet(&mut self, header: u32) {
        let sequence = packet::packet_id(header);
        if let Some(stored) = self.reply_history.get(sequence) {
            log::debug!("resending reply for sequence {}", sequence);
            let stored = stored.to_vec();
            self.reply.clear();
            self.reply.extend_from_slice(&stored);
        } else {
            log::debug!("no stored reply for sequence {}", sequence);
        }
        self.traffic_history.push(TRAFFIC_RESEND);
    }

    // ---------------------------------------------------------------------
    //  Transaction executor
    // ---------------------------------------------------------------------

    /// Execute every transaction in `words`, in declared order.
    ///
    /// The walker frames each transaction from its header before dispatching;
    /// a body shorter than its header declares cannot be framed, so the
    /// remainder of the packet is dropped at the truncation point.
    fn run_transactions(&mut self, words: &[u32]) {
        let mut pos = 0;
        while pos < words.len() {
            let header = TransactionHeader::decode(self.version, words[pos]);
            pos += 1;

            match header.type_code {
                TransactionType::Read | TransactionType::NonIncrementingRead => {
                    let Some(&address) = words.get(pos) else {
                        log::warn!("truncated read transaction; dropping packet remainder");
                        return;
                    };
                    pos += 1;
                    let incrementing = header.type_code == TransactionType::Read;
                    self.read(&header, address, incrementing);
                }
                TransactionType::Write | TransactionType::NonIncrementingWrite => {
                    let body_len = 1 + header.word_count as usize;
                    let Some(body) = words.get(pos..pos + body_len) else {
                        log::warn!("truncated write transaction; dropping packet remainder");
                        return;
                    };
                    pos += body_len;
                    let incrementing = header.type_code == TransactionType::Write;
                    self.write(&header, body[0], &body[1..], incrementing);
                }
                TransactionType::ReadModifyWriteBits => {
                    let Some(args) = words.get(pos..pos + 3) else {
                        log::warn!("truncated rmw-bits transaction; dropping packet remainder");
                        return;
                    };
                    pos += 3;
                    self.rmw_bits(&header, args[0], args[1], args[2]);
                }
                TransactionType::ReadModifyWriteSum => {
                    let Some(args) = words.get(pos..pos + 2) else {
                        log::warn!("truncated rmw-sum transaction; dropping packet remainder");
                        return;
                    };
                    pos += 2;
                    self.rmw_sum(&header, args[0], args[1]);
                }
                TransactionType::ByteOrder => self.byte_order(&header),
                TransactionType::Unknown(_) => {
                    log::error!(
                        "{:#010x} is an unknown transaction header; returning error code",
                        header.encode(self.version)
                    );
                    self.unknown_type(&header);
                }
            }
        }
    }

    /// Record the request/reply header pair and append the reply header.
    fn emit_header(&mut self, expected: u32) {
        self.received_headers.push(self.packet_header);
        self.reply.push(expected);
        self.sent_headers.push(expected);
    }

    fn expected(&self, header: &TransactionHeader, info_code: u32) -> u32 {
        let count = reply_word_count(self.version, header.type_code, header.word_count);
        expected_header(
            self.version,
            header.type_code,
            count,
            header.transaction_id,
            info_code,
        )
    }

    fn read(&mut self, header: &TransactionHeader, address: u32, incrementing: bool) {
        self.emit_header(self.expected(header, SUCCESS_INFO));
        let mut addr = address;
        for _ in 0..header.word_count {
            self.reply.push(self.memory.read(addr));
            if incrementing {
                addr = addr.wrapping_add(1);
            }
        }
    }

    fn write(&mut self, header: &TransactionHeader, address: u32, body: &[u32], incrementing: bool) {
        let mut addr = address;
        for &word in body {
            self.memory.write(addr, word);
            if incrementing {
                addr = addr.wrapping_add(1);
            }
        }
        self.emit_header(self.expected(header, SUCCESS_INFO));
    }

    fn rmw_bits(&mut self, header: &TransactionHeader, address: u32, and_term: u32, or_term: u32) {
        self.emit_header(self.expected(header, SUCCESS_INFO));
        let value = self.memory.rmw_bits(address, and_term, or_term, self.version);
        self.reply.push(value);
    }

    fn rmw_sum(&mut self, header: &TransactionHeader, address: u32, addend: u32) {
        self.emit_header(self.expected(header, SUCCESS_INFO));
        let value = self.memory.rmw_sum(address, addend, self.version);
        self.reply.push(value);
    }

    fn byte_order(&mut self, header: &TransactionHeader) {
        self.emit_header(self.expected(header, SUCCESS_INFO));
    }

    fn unknown_type(&mut self, header: &TransactionHeader) {
        self.emit_header(self.expected(header, UNKNOWN_TYPE_INFO));
    }
}
