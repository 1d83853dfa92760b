// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A deterministic, allocation-free RapidIO Serial Physical-Layer link
//! stack: a [`Stack`] turns a bidirectional stream of 4-byte [`Symbol`]s into
//! reliable, in-order delivery of RapidIO packets and back.
//!
//! The receiver ([`rx`]) and transmitter ([`tx`]) finite-state machines are
//! each independently testable, but a caller drives them together through
//! [`Stack`], which owns both FSMs, the inbound/outbound [`Queue`]s, the
//! shared [`Stats`] counters and the diagnostic [`Log`], and is responsible
//! for the one piece of wiring that doesn't belong to either FSM alone:
//! dispatching an inbound control symbol to whichever side it targets, and
//! forwarding a peer's advertised buffer status from the receiver's status
//! bookkeeping to the transmitter's send throttle.
//!
//! No heap allocation, no threads, no I/O: every byte of state lives in a
//! `Stack` instance or the caller-supplied backing buffers it borrows.

#![cfg_attr(not(test), no_std)]

use static_assertions::const_assert;

pub mod control;
pub mod diag;
pub mod error;
pub mod packet;
pub mod queue;
pub mod rx;
pub mod stats;
pub mod symbol;
pub mod tx;

pub use control::stype0;
pub use diag::Event;
pub use error::PacketNotAcceptedCause;
pub use packet::{Packet, PacketError, MAX_PACKET_WORDS};
pub use queue::{Queue, QueueFull};
pub use rx::{RxState, N_STATUS_RX};
pub use stats::Stats;
pub use symbol::{ControlWord, Symbol};
pub use tx::{TxState, N_STATUS_TX};

use diag::Ringbuf;
use rx::Receiver;
use tx::Transmitter;

/// AckIds cycle through this many values ("ackId arithmetic is modulo
/// 32").
pub const ACK_ID_MODULUS: u8 = 32;

/// A real link partner must accept at least as many status symbols on the
/// wire as our receiver needs to see before declaring link-up, or the two
/// thresholds this crate picks would never both clear at once.
const_assert!(N_STATUS_RX as u16 <= N_STATUS_TX);

/// Depth of the diagnostic event log carried by every [`Stack`]. Shared by
/// both FSMs; 32 entries is enough recent history for a post-mortem without
/// unbounded growth.
pub type Log = Ringbuf<32>;

/// Error returned by [`Stack::open`] when a caller-supplied backing buffer is
/// too small to hold even one packet slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpenError {
    InboundBufferTooSmall,
    OutboundBufferTooSmall,
}

/// The whole RapidIO serial physical-layer link stack for one port.
///
/// Owns both FSMs, the inbound and outbound packet queues, the shared
/// counters, and the clock fields `portTime`/`portTimeout`.
/// Not `Sync`; the single-threaded cooperative contract means
/// a caller sharing one `Stack` across contexts must serialize access
/// itself.
pub struct Stack<'a> {
    rx: Receiver,
    tx: Transmitter,
    inbound: Queue<'a>,
    outbound: Queue<'a>,
    stats: Stats,
    log: Log,
    time: u32,
    timeout: u32,
}

impl<'a> Stack<'a> {
    /// Opens a stack over caller-owned backing storage. Capacities in packet
    /// slots are `buffer.len() / (MAX_PACKET_WORDS + 1)`; each direction
    /// needs at least one slot. `portTimeout` defaults to `u32::MAX` (no
    /// timeout) until [`Self::port_set_timeout`] is called.
    pub fn open(
        inbound_buffer: &'a mut [u32],
        outbound_buffer: &'a mut [u32],
    ) -> Result<Self, OpenError> {
        let inbound =
            Queue::new(inbound_buffer).ok_or(OpenError::InboundBufferTooSmall)?;
        let outbound =
            Queue::new(outbound_buffer).ok_or(OpenError::OutboundBufferTooSmall)?;
        Ok(Self {
            rx: Receiver::new(),
            tx: Transmitter::new(),
            inbound,
            outbound,
            stats: Stats::default(),
            log: Log::default(),
            time: 0,
            timeout: u32::MAX,
        })
    }

    /// Re-opens this stack over the same backing storage, discarding all
    /// queued packets and FSM state. Storage capacities are unchanged.
    pub fn reopen(&mut self) {
        self.rx = Receiver::new();
        self.tx = Transmitter::new();
        while self.inbound.used_count() > 0 {
            self.inbound.discard_front();
        }
        while self.outbound.used_count() > 0 {
            self.outbound.discard_front();
        }
        self.stats = Stats::default();
        self.log = Log::default();
        self.time = 0;
    }

    // ---- back-end: symbol interface --------------------------------

    /// `portSetTime`: advances the monotonic clock used for per-ackId
    /// timeout bookkeeping. Caller-defined units.
    pub fn port_set_time(&mut self, time: u32) {
        self.time = time;
    }

    /// `portSetTimeout`: sets the retransmission timeout threshold, in the
    /// same units as [`Self::port_set_time`].
    pub fn port_set_timeout(&mut self, timeout: u32) {
        self.timeout = timeout;
    }

    /// `portSetStatus`: codec sync up/down. Going down resets both FSMs to
    /// `UNINITIALIZED` and zeroes status counters; queued outbound packets
    /// are preserved but the send window is rewound, so link re-init
    /// replays everything not yet acknowledged.
    pub fn port_set_status(&mut self, up: bool) {
        self.rx.port_set_status(up);
        self.tx.port_set_status(up);
        if !up {
            self.outbound.rewind_window();
        }
        self.log.record(if up {
            Event::LinkUp
        } else {
            Event::LinkDown
        });
    }

    /// Reports a descrambler-out-of-sync condition from the symbol codec.
    /// Only meaningful if the codec this crate is paired with exposes that
    /// signal.
    pub fn report_descrambler_fault(&mut self) {
        self.rx.report_descrambler_fault(&mut self.stats, &mut self.log);
    }

    /// `portAddSymbol`: consumes one inbound symbol. Control symbols are
    /// routed to whichever FSM the control-symbol table above assigns
    /// them to: status, start/end-of-packet, restart-from-retry and
    /// link-request go to the receiver; packet-accepted, packet-retry,
    /// packet-not-accepted and link-response go to the transmitter. A
    /// status symbol's buffer-status field additionally feeds the
    /// transmitter's send throttle.
    pub fn port_add_symbol(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::Idle => self.rx.on_idle(),
            Symbol::Error => self.rx.on_error_symbol(&mut self.stats, &mut self.log),
            Symbol::Data(word) => self.rx.on_data(word, &mut self.stats, &mut self.log),
            Symbol::Control(wire) => match ControlWord::from_wire(wire) {
                Some(cw) => self.dispatch_control(cw),
                None => self.rx.on_control_crc_error(&mut self.stats, &mut self.log),
            },
        }
    }

    fn dispatch_control(&mut self, cw: ControlWord) {
        match cw.stype0 {
            s if s == stype0::STATUS => {
                self.tx.note_peer_buffer_status(cw.parameter1);
                self.rx
                    .on_control(cw, &mut self.inbound, &mut self.stats, &mut self.log);
            }
            s if s == stype0::PACKET_FRAME
                || s == stype0::RESTART_FROM_RETRY
                || s == stype0::LINK_REQUEST =>
            {
                self.rx
                    .on_control(cw, &mut self.inbound, &mut self.stats, &mut self.log);
            }
            s if s == stype0::PACKET_ACCEPTED
                || s == stype0::PACKET_RETRY
                || s == stype0::PACKET_NOT_ACCEPTED
                || s == stype0::LINK_RESPONSE =>
            {
                self.tx.on_control(
                    cw,
                    &mut self.outbound,
                    &mut self.stats,
                    self.time,
                    &mut self.log,
                );
            }
            _ => {}
        }
    }

    /// `portGetSymbol`: always returns a symbol (idle if there's nothing
    /// else to send). Must be called once per symbol time; runs the
    /// transmitter's timeout scan and its five-level emission priority.
    pub fn port_get_symbol(&mut self) -> Symbol {
        self.tx.next_symbol(
            &mut self.rx,
            &self.inbound,
            &mut self.outbound,
            &mut self.stats,
            &mut self.log,
            self.time,
            self.timeout,
        )
    }

    // ---- front-end: packet interface --------------------------------

    /// `setOutboundPacket`: copies `pkt` into the outbound queue. Fails if
    /// [`Self::get_outbound_queue_available`] is 0; the stack does not
    /// recompute the packet's CRC, so `pkt` must already carry a valid one.
    pub fn set_outbound_packet(&mut self, pkt: &Packet) -> Result<(), QueueFull> {
        self.outbound.enqueue_back(pkt)
    }

    /// `getInboundPacket`: moves the next delivered packet out of the
    /// inbound queue, or `None` if it's empty.
    pub fn get_inbound_packet(&mut self) -> Option<Packet> {
        if self.inbound.used_count() == 0 {
            return None;
        }
        Some(self.inbound.discard_front())
    }

    pub fn get_outbound_queue_length(&self) -> usize {
        self.outbound.used_count()
    }

    pub fn get_outbound_queue_available(&self) -> usize {
        self.outbound.available_count()
    }

    pub fn get_inbound_queue_length(&self) -> usize {
        self.inbound.used_count()
    }

    pub fn get_inbound_queue_available(&self) -> usize {
        self.inbound.available_count()
    }

    /// `RIOSTACK_getLinkIsInitialized`: true iff both FSMs have completed
    /// link initialization. No user data flows in either direction until
    /// this is true.
    pub fn get_link_is_initialized(&self) -> bool {
        self.tx.state() == TxState::LinkInitialized && self.rx.state() == RxState::LinkInitialized
    }

    pub fn rx_state(&self) -> RxState {
        self.rx.state()
    }

    pub fn tx_state(&self) -> TxState {
        self.tx.state()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Iterates the diagnostic event log, oldest first.
    pub fn log(&self) -> impl Iterator<Item = (Event, u32)> + '_ {
        self.log.iter()
    }
}
