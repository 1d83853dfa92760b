// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The receiver finite-state machine: absorbs inbound symbols, reassembles
//! packets, and raises control-symbol demands for the transmitter to honor.
//!
//! Inbound control symbols are split between here and [`crate::tx`] by the
//! stack (`lib.rs`): status, start/end-of-packet, restart-from-retry and
//! link-request target the receiver; packet-accepted, packet-retry,
//! packet-not-accepted and link-response target the transmitter. Both share
//! a single inbound symbol stream, so the split happens once, at dispatch.

use crate::control;
use crate::diag::{Event, Ringbuf};
use crate::error::PacketNotAcceptedCause;
use crate::packet::{crc16_fold_word, Packet, CRC16_INIT, MAX_PACKET_WORDS};
use crate::queue::Queue;
use crate::stats::Stats;
use crate::symbol::ControlWord;

pub const N_STATUS_RX: u8 = 7;

pub type Log = Ringbuf<32>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RxState {
    Uninitialized,
    PortInitialized,
    LinkInitialized,
    InputRetryStopped,
    InputErrorStopped,
}

/// A control symbol the receiver needs the transmitter to emit. Read and
/// cleared by the transmitter's emission-priority logic in `lib.rs`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RxDemand {
    None,
    PacketRetry(u8),
    PacketNotAccepted(u8, PacketNotAcceptedCause),
    SendLinkResponse(u8),
}

pub struct Receiver {
    state: RxState,
    status_received: u8,
    in_packet: bool,
    counter: usize,
    crc: u16,
    pending_word: Option<u32>,
    buffer: [u32; MAX_PACKET_WORDS],
    ack_id: u8,
    ack_id_acked: u8,
    error_cause: PacketNotAcceptedCause,
    demand: RxDemand,
}

impl Default for Receiver {
    fn default() -> Self {
        Self {
            state: RxState::Uninitialized,
            status_received: 0,
            in_packet: false,
            counter: 0,
            crc: CRC16_INIT,
            pending_word: None,
            buffer: [0; MAX_PACKET_WORDS],
            ack_id: 0,
            ack_id_acked: 0,
            error_cause: PacketNotAcceptedCause::Reserved,
            demand: RxDemand::None,
        }
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn status_received(&self) -> u8 {
        self.status_received
    }

    pub fn error_cause(&self) -> PacketNotAcceptedCause {
        self.error_cause
    }

    /// Next ackId this receiver expects on an inbound start-of-packet.
    pub fn ack_id(&self) -> u8 {
        self.ack_id
    }

    /// Highest ackId acknowledged to the peer so far.
    pub fn ack_id_acked(&self) -> u8 {
        self.ack_id_acked
    }

    /// Whether a packet-accepted control symbol is owed to the peer.
    pub fn ack_pending(&self) -> bool {
        self.ack_id_acked != self.ack_id
    }

    pub fn take_demand(&mut self) -> RxDemand {
        core::mem::replace(&mut self.demand, RxDemand::None)
    }

    /// Non-destructive peek at the outstanding demand, for introspection.
    pub fn demand(&self) -> RxDemand {
        self.demand
    }

    /// Called by the stack once the transmitter places a demanded
    /// packet-accepted symbol on the wire.
    pub fn note_ack_emitted(&mut self) {
        self.ack_id_acked = (self.ack_id_acked + 1) % 32;
    }

    /// Called by the stack once the transmitter places a demanded
    /// link-response symbol on the wire.
    pub fn note_link_response_sent(&mut self, log: &mut Log) {
        if self.state == RxState::InputErrorStopped {
            self.state = RxState::LinkInitialized;
            self.demand = RxDemand::None;
            log.record(Event::RxState(self.state));
        }
    }

    /// Invoked for an externally-reported descrambler desync. No codec in
    /// this crate's test harness raises this, but the hook exists for one
    /// that does.
    pub fn report_descrambler_fault(&mut self, stats: &mut Stats, log: &mut Log) {
        if self.state == RxState::LinkInitialized {
            self.fail(PacketNotAcceptedCause::Descrambler, stats, log);
        }
    }

    pub fn port_set_status(&mut self, up: bool) {
        if up {
            if self.state == RxState::Uninitialized {
                self.state = RxState::PortInitialized;
                self.status_received = 0;
            }
        } else {
            *self = Self {
                ack_id: self.ack_id,
                ..Self::default()
            };
            // A full reset re-runs link init from scratch on both peers, so
            // ackId tracking restarts at 0 too rather than surviving the
            // reset: see DESIGN.md.
            self.ack_id = 0;
        }
    }

    pub fn on_idle(&mut self) {}

    pub fn on_error_symbol(&mut self, stats: &mut Stats, log: &mut Log) {
        if self.state == RxState::LinkInitialized {
            self.fail(PacketNotAcceptedCause::IllegalCharacter, stats, log);
        }
    }

    /// A control symbol failed its CRC-5 check before reaching either FSM.
    /// Always counted; only drives the FSM into
    /// `INPUT_ERROR_STOPPED` when there's a link to break.
    pub fn on_control_crc_error(&mut self, stats: &mut Stats, log: &mut Log) {
        if self.state == RxState::LinkInitialized {
            self.fail(PacketNotAcceptedCause::ControlCrc, stats, log);
        } else {
            stats.inbound_error_control_crc = stats.inbound_error_control_crc.wrapping_add(1);
        }
    }

    pub fn on_control(
        &mut self,
        cw: ControlWord,
        queue: &mut Queue,
        stats: &mut Stats,
        log: &mut Log,
    ) {
        match cw.stype0 {
            s if s == control::stype0::STATUS => self.on_status(),
            s if s == control::stype0::PACKET_FRAME => self.on_frame(cw, queue, stats, log),
            s if s == control::stype0::RESTART_FROM_RETRY => self.on_restart_from_retry(log),
            s if s == control::stype0::LINK_REQUEST => self.on_link_request(stats),
            _ => {}
        }
    }

    fn on_status(&mut self) {
        match self.state {
            RxState::Uninitialized => {}
            RxState::PortInitialized => {
                self.status_received = self.status_received.saturating_add(1);
                if self.status_received >= N_STATUS_RX {
                    self.state = RxState::LinkInitialized;
                }
            }
            _ => {
                self.status_received = self.status_received.saturating_add(1);
            }
        }
    }

    fn on_restart_from_retry(&mut self, log: &mut Log) {
        if self.state == RxState::InputRetryStopped {
            self.state = RxState::LinkInitialized;
            self.demand = RxDemand::None;
            log.record(Event::RxState(self.state));
        }
    }

    fn on_link_request(&mut self, stats: &mut Stats) {
        stats.partner_link_request = stats.partner_link_request.wrapping_add(1);
        // A link-request asks us to report our own ackId/buffer-status
        // bookkeeping; the peer may be sending it because its transmitter
        // timed out, not because we ourselves are in error-stopped. Answer
        // it in any state where that bookkeeping is meaningful.
        match self.state {
            RxState::LinkInitialized
            | RxState::InputErrorStopped
            | RxState::InputRetryStopped => {
                self.demand = RxDemand::SendLinkResponse(self.ack_id);
            }
            _ => {}
        }
    }

    fn on_frame(&mut self, cw: ControlWord, queue: &mut Queue, stats: &mut Stats, log: &mut Log) {
        use control::frame_stype1;
        if cw.stype1 == frame_stype1::START_OF_PACKET {
            self.begin_packet(cw.parameter0, queue, stats, log);
        } else if cw.stype1 == frame_stype1::END_OF_PACKET {
            self.end_packet(queue, stats, log);
        }
    }

    fn begin_packet(
        &mut self,
        ack_id: u8,
        queue: &mut Queue,
        stats: &mut Stats,
        log: &mut Log,
    ) {
        if self.state != RxState::LinkInitialized {
            return;
        }
        if queue.available_count() == 0 {
            self.state = RxState::InputRetryStopped;
            self.demand = RxDemand::PacketRetry(ack_id);
            stats.inbound_packet_retry = stats.inbound_packet_retry.wrapping_add(1);
            log.record(Event::RxState(self.state));
            return;
        }
        if ack_id != self.ack_id {
            self.fail(PacketNotAcceptedCause::UnexpectedAckId, stats, log);
            return;
        }
        self.in_packet = true;
        self.counter = 0;
        self.crc = CRC16_INIT;
        self.pending_word = None;
    }

    pub fn on_data(&mut self, word: u32, stats: &mut Stats, log: &mut Log) {
        if !self.in_packet || self.state != RxState::LinkInitialized {
            return;
        }
        if let Some(prev) = self.pending_word.take() {
            if self.counter >= MAX_PACKET_WORDS {
                self.fail(PacketNotAcceptedCause::General, stats, log);
                return;
            }
            self.buffer[self.counter] = prev;
            self.counter += 1;
            self.crc = crc16_fold_word(self.crc, prev);
        }
        self.pending_word = Some(word);
    }

    fn end_packet(&mut self, queue: &mut Queue, stats: &mut Stats, log: &mut Log) {
        if !self.in_packet || self.state != RxState::LinkInitialized {
            return;
        }
        self.in_packet = false;
        let last = match self.pending_word.take() {
            Some(w) => w,
            None => {
                self.fail(PacketNotAcceptedCause::General, stats, log);
                return;
            }
        };
        if self.counter >= MAX_PACKET_WORDS {
            self.fail(PacketNotAcceptedCause::General, stats, log);
            return;
        }
        self.buffer[self.counter] = last;
        let total_len = self.counter + 1;
        let embedded_crc = (last & 0xffff) as u16;
        if embedded_crc != self.crc {
            self.fail(PacketNotAcceptedCause::PacketCrc, stats, log);
            return;
        }
        let pkt = match Packet::from_words(&self.buffer[..total_len]) {
            Ok(p) => p,
            Err(_) => {
                self.fail(PacketNotAcceptedCause::General, stats, log);
                return;
            }
        };
        queue
            .enqueue_back(&pkt)
            .expect("availability was checked at start-of-packet");
        let completed_ack_id = self.ack_id;
        self.ack_id = (self.ack_id + 1) % 32;
        stats.inbound_packet_complete = stats.inbound_packet_complete.wrapping_add(1);
        log.record(Event::PacketDelivered {
            ack_id: completed_ack_id,
        });
    }

    fn fail(&mut self, cause: PacketNotAcceptedCause, stats: &mut Stats, log: &mut Log) {
        self.state = RxState::InputErrorStopped;
        self.error_cause = cause;
        self.demand = RxDemand::PacketNotAccepted(self.ack_id, cause);
        self.in_packet = false;
        use PacketNotAcceptedCause as C;
        match cause {
            C::PacketCrc => {
                stats.inbound_error_packet_crc = stats.inbound_error_packet_crc.wrapping_add(1)
            }
            C::UnexpectedAckId => {
                stats.inbound_error_packet_ack_id =
                    stats.inbound_error_packet_ack_id.wrapping_add(1)
            }
            C::IllegalCharacter => {
                stats.inbound_error_illegal_character =
                    stats.inbound_error_illegal_character.wrapping_add(1)
            }
            C::ControlCrc => {
                stats.inbound_error_control_crc = stats.inbound_error_control_crc.wrapping_add(1)
            }
            _ => stats.inbound_error_general = stats.inbound_error_general.wrapping_add(1),
        }
        log.record(Event::RxState(self.state));
        log.record(Event::RxError { cause });
    }
}
