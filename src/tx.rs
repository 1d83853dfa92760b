// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transmitter finite-state machine: serializes queued packets into data
//! symbols, tracks the outstanding ackId window, and honors whatever the
//! receiver (`rx.rs`) demands of it.
//!
//! `next_symbol` is the whole of `portGetSymbol`'s decision tree: timeout
//! scan, then the five-level emission priority, all in one place, since the
//! transmitter is the side with something to say every call.

use crate::control;
use crate::diag::{Event, Ringbuf};
use crate::queue::Queue;
use crate::rx::{Receiver, RxDemand, RxState};
use crate::stats::Stats;
use crate::symbol::Symbol;

pub const N_STATUS_TX: u16 = 15;

pub type Log = Ringbuf<32>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxState {
    Uninitialized,
    PortInitialized,
    LinkInitialized,
    OutputRetryStopped,
    OutputErrorStopped,
}

/// Externally-reported shape of a receiver-demanded detour, for
/// introspection only; the emission loop drains `rx`'s demand directly
/// rather than storing it here. Named to match the states a transmitter
/// would report while honoring each kind of demand.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReportedState {
    Steady(TxState),
    SendPacketRetry,
    SendPacketNotAccepted,
    SendLinkResponse,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FrameStage {
    Start,
    Data(usize),
    End,
}

#[derive(Debug, Copy, Clone)]
struct Framing {
    ack_id: u8,
    packet: crate::packet::Packet,
    stage: FrameStage,
}

pub struct Transmitter {
    state: TxState,
    status_counter: u16,
    ack_id: u8,
    ack_id_window: u8,
    buffer_status: u8,
    frame_timeout: [u32; 32],
    pending_link_request: bool,
    framing: Option<Framing>,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self {
            state: TxState::Uninitialized,
            status_counter: 0,
            ack_id: 0,
            ack_id_window: 0,
            buffer_status: 0,
            frame_timeout: [0; 32],
            pending_link_request: false,
            framing: None,
        }
    }
}

impl Transmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn ack_id(&self) -> u8 {
        self.ack_id
    }

    pub fn ack_id_window(&self) -> u8 {
        self.ack_id_window
    }

    pub fn status_counter(&self) -> u16 {
        self.status_counter
    }

    pub fn reported_state(&self, rx_demand_pending: Option<&RxDemand>) -> ReportedState {
        match rx_demand_pending {
            Some(RxDemand::PacketRetry(_)) => ReportedState::SendPacketRetry,
            Some(RxDemand::PacketNotAccepted(_, _)) => ReportedState::SendPacketNotAccepted,
            Some(RxDemand::SendLinkResponse(_)) => ReportedState::SendLinkResponse,
            _ => ReportedState::Steady(self.state),
        }
    }

    /// Updates the peer's advertised free-buffer count, learned from an
    /// inbound status symbol (forwarded by the stack's dispatcher, since a
    /// status symbol is decoded by the receiver but describes the
    /// transmitter's throttling budget) or a link-response.
    pub fn note_peer_buffer_status(&mut self, buffer_status: u8) {
        self.buffer_status = buffer_status;
    }

    pub fn port_set_status(&mut self, up: bool) {
        if up {
            if self.state == TxState::Uninitialized {
                self.state = TxState::PortInitialized;
                self.status_counter = 0;
            }
        } else {
            *self = Self {
                buffer_status: self.buffer_status,
                ..Self::default()
            };
        }
    }

    pub fn on_control(
        &mut self,
        cw: crate::symbol::ControlWord,
        outbound: &mut Queue,
        stats: &mut Stats,
        time: u32,
        log: &mut Log,
    ) {
        match cw.stype0 {
            s if s == control::stype0::PACKET_ACCEPTED => {
                self.on_packet_accepted(cw.parameter0, outbound, stats, time, log)
            }
            s if s == control::stype0::PACKET_RETRY => {
                self.on_packet_retry(cw.parameter0, outbound, stats, log)
            }
            s if s == control::stype0::PACKET_NOT_ACCEPTED => {
                let cause = crate::error::PacketNotAcceptedCause::from_wire(cw.parameter1);
                stats.record_partner_cause(cause);
                self.enter_error_stopped(log);
            }
            s if s == control::stype0::LINK_RESPONSE => {
                self.on_link_response(cw.parameter0, cw.parameter1, outbound, log)
            }
            _ => {}
        }
    }

    fn on_packet_accepted(
        &mut self,
        ack_id: u8,
        outbound: &mut Queue,
        stats: &mut Stats,
        time: u32,
        log: &mut Log,
    ) {
        if self.state != TxState::LinkInitialized {
            return;
        }
        if ack_id == self.ack_id {
            outbound.discard_front();
            let latency = time.wrapping_sub(self.frame_timeout[self.ack_id as usize]);
            stats.outbound_link_latency_max = stats.outbound_link_latency_max.max(latency);
            stats.outbound_packet_complete = stats.outbound_packet_complete.wrapping_add(1);
            log.record(Event::PacketAccepted { ack_id });
            self.ack_id = (self.ack_id + 1) % 32;
        } else {
            stats.outbound_error_packet_accepted =
                stats.outbound_error_packet_accepted.wrapping_add(1);
            self.enter_error_stopped(log);
        }
    }

    fn on_packet_retry(&mut self, ack_id: u8, outbound: &mut Queue, stats: &mut Stats, log: &mut Log) {
        if self.state != TxState::LinkInitialized {
            return;
        }
        if ack_id == self.ack_id {
            outbound.rewind_window();
            self.ack_id_window = self.ack_id;
            self.framing = None;
            self.state = TxState::OutputRetryStopped;
            stats.outbound_packet_retry = stats.outbound_packet_retry.wrapping_add(1);
            log.record(Event::TxState(self.state));
        } else {
            stats.outbound_error_packet_retry = stats.outbound_error_packet_retry.wrapping_add(1);
            self.enter_error_stopped(log);
        }
    }

    fn on_link_response(&mut self, peer_ack_id: u8, buffer_status: u8, outbound: &mut Queue, log: &mut Log) {
        if self.state != TxState::OutputErrorStopped {
            return;
        }
        self.ack_id = peer_ack_id;
        self.ack_id_window = peer_ack_id;
        self.buffer_status = buffer_status;
        self.framing = None;
        outbound.rewind_window();
        self.pending_link_request = false;
        self.state = TxState::LinkInitialized;
        log.record(Event::TxState(self.state));
    }

    fn enter_error_stopped(&mut self, log: &mut Log) {
        if self.state == TxState::OutputErrorStopped {
            return;
        }
        self.state = TxState::OutputErrorStopped;
        self.pending_link_request = true;
        self.framing = None;
        log.record(Event::TxState(self.state));
    }

    fn check_timeouts(&mut self, time: u32, timeout: u32, stats: &mut Stats, log: &mut Log) {
        if self.state != TxState::LinkInitialized {
            return;
        }
        let mut id = self.ack_id;
        while id != self.ack_id_window {
            if time.wrapping_sub(self.frame_timeout[id as usize]) >= timeout {
                stats.outbound_error_timeout = stats.outbound_error_timeout.wrapping_add(1);
                log.record(Event::TxTimeout { ack_id: id });
                self.enter_error_stopped(log);
                return;
            }
            id = (id + 1) % 32;
        }
    }

    /// The whole of `portGetSymbol`'s decision tree.
    pub fn next_symbol(
        &mut self,
        rx: &mut Receiver,
        inbound: &Queue,
        outbound: &mut Queue,
        stats: &mut Stats,
        log: &mut Log,
        time: u32,
        timeout: u32,
    ) -> Symbol {
        match self.state {
            TxState::Uninitialized => Symbol::Idle,
            TxState::PortInitialized => {
                self.status_counter = self.status_counter.saturating_add(1);
                if self.status_counter >= N_STATUS_TX && rx.state() == RxState::LinkInitialized {
                    self.state = TxState::LinkInitialized;
                    log.record(Event::TxState(self.state));
                }
                Symbol::Control(control::status(inbound.available_count().min(31) as u8).to_wire())
            }
            TxState::OutputRetryStopped => {
                let ack = self.ack_id;
                self.state = TxState::LinkInitialized;
                log.record(Event::TxState(self.state));
                Symbol::Control(control::restart_from_retry(ack).to_wire())
            }
            TxState::OutputErrorStopped => {
                if self.pending_link_request {
                    self.pending_link_request = false;
                    Symbol::Control(control::link_request().to_wire())
                } else {
                    Symbol::Idle
                }
            }
            TxState::LinkInitialized => {
                self.check_timeouts(time, timeout, stats, log);
                if self.state != TxState::LinkInitialized {
                    return self.next_symbol(rx, inbound, outbound, stats, log, time, timeout);
                }

                match rx.take_demand() {
                    RxDemand::PacketRetry(id) => return Symbol::Control(control::packet_retry(id).to_wire()),
                    RxDemand::PacketNotAccepted(id, cause) => {
                        return Symbol::Control(control::packet_not_accepted(id, cause.to_wire()).to_wire())
                    }
                    RxDemand::SendLinkResponse(id) => {
                        let buf = inbound.available_count().min(31) as u8;
                        rx.note_link_response_sent(log);
                        return Symbol::Control(control::link_response(id, buf).to_wire());
                    }
                    RxDemand::None => {}
                }

                if rx.ack_pending() {
                    let id = rx.ack_id_acked();
                    rx.note_ack_emitted();
                    return Symbol::Control(control::packet_accepted(id).to_wire());
                }

                if let Some(mut framing) = self.framing.take() {
                    return self.step_framing(&mut framing, outbound, time);
                }

                if outbound.window_open() && outbound.window_len() < 32 && self.buffer_status > 0 {
                    if let Some(pkt) = outbound.get_window() {
                        let mut framing = Framing {
                            ack_id: self.ack_id_window,
                            packet: pkt,
                            stage: FrameStage::Start,
                        };
                        return self.step_framing(&mut framing, outbound, time);
                    }
                }

                Symbol::Idle
            }
        }
    }

    /// Advances one step of `framing` and returns the symbol for this call.
    /// Leaves `self.framing` populated with the next stage unless framing
    /// just completed (End stage), in which case it performs the
    /// end-of-packet bookkeeping and leaves `self.framing` at `None`.
    fn step_framing(&mut self, framing: &mut Framing, outbound: &mut Queue, time: u32) -> Symbol {
        match framing.stage {
            FrameStage::Start => {
                framing.stage = if framing.packet.is_empty() {
                    FrameStage::End
                } else {
                    FrameStage::Data(0)
                };
                let sym = Symbol::Control(control::start_of_packet(framing.ack_id).to_wire());
                self.framing = Some(*framing);
                sym
            }
            FrameStage::Data(idx) => {
                let word = framing.packet.words()[idx];
                let next = idx + 1;
                framing.stage = if next >= framing.packet.len() {
                    FrameStage::End
                } else {
                    FrameStage::Data(next)
                };
                self.framing = Some(*framing);
                Symbol::Data(word)
            }
            FrameStage::End => {
                self.frame_timeout[framing.ack_id as usize] = time;
                self.ack_id_window = (self.ack_id_window + 1) % 32;
                outbound.advance_window();
                self.framing = None;
                Symbol::Control(control::end_of_packet().to_wire())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, SLOT_WORDS};

    fn linked_up_pair() -> (Transmitter, Receiver) {
        let mut tx = Transmitter::new();
        let mut rx = Receiver::new();
        tx.port_set_status(true);
        rx.port_set_status(true);
        for _ in 0..crate::rx::N_STATUS_RX {
            rx.on_control(
                crate::control::status(31),
                &mut Queue::new(&mut [0u32; SLOT_WORDS]).unwrap(),
                &mut Stats::default(),
                &mut crate::rx::Log::default(),
            );
        }
        let mut stats = Stats::default();
        let mut log = Log::default();
        let mut inbound_backing = [0u32; SLOT_WORDS];
        let inbound = Queue::new(&mut inbound_backing).unwrap();
        let mut outbound_backing = [0u32; SLOT_WORDS * 4];
        let mut outbound = Queue::new(&mut outbound_backing).unwrap();
        for _ in 0..N_STATUS_TX {
            tx.next_symbol(&mut rx, &inbound, &mut outbound, &mut stats, &mut log, 0, 100);
        }
        tx.note_peer_buffer_status(31);
        assert_eq!(tx.state(), TxState::LinkInitialized);
        (tx, rx)
    }

    #[test]
    fn frames_a_queued_packet_start_to_end() {
        let (mut tx, mut rx) = linked_up_pair();
        let mut stats = Stats::default();
        let mut log = Log::default();
        let mut inbound_backing = [0u32; SLOT_WORDS];
        let inbound = Queue::new(&mut inbound_backing).unwrap();
        let mut outbound_backing = [0u32; SLOT_WORDS * 4];
        let mut outbound = Queue::new(&mut outbound_backing).unwrap();

        let words = [1u32, 2, 3];
        let crc = crate::packet::crc_over_words(&words);
        let pkt = Packet::from_words(&[1, 2, 3, crc as u32]).unwrap();
        outbound.enqueue_back(&pkt).unwrap();

        let sop = tx.next_symbol(&mut rx, &inbound, &mut outbound, &mut stats, &mut log, 0, 100);
        assert!(matches!(sop, Symbol::Control(_)));
        let mut data_words = vec![];
        loop {
            let sym = tx.next_symbol(&mut rx, &inbound, &mut outbound, &mut stats, &mut log, 0, 100);
            match sym {
                Symbol::Data(w) => data_words.push(w),
                Symbol::Control(_) => break,
                _ => panic!("unexpected symbol while framing: {sym:?}"),
            }
        }
        assert_eq!(data_words, vec![1, 2, 3, crc as u32]);
        assert_eq!(outbound.window_len(), 1);
    }

    #[test]
    fn timeout_enters_output_error_stopped() {
        let (mut tx, mut rx) = linked_up_pair();
        let mut stats = Stats::default();
        let mut log = Log::default();
        let mut inbound_backing = [0u32; SLOT_WORDS];
        let inbound = Queue::new(&mut inbound_backing).unwrap();
        let mut outbound_backing = [0u32; SLOT_WORDS * 4];
        let mut outbound = Queue::new(&mut outbound_backing).unwrap();

        let pkt = Packet::from_words(&[0xffff]).unwrap();
        outbound.enqueue_back(&pkt).unwrap();
        // Frame start-of-packet at time 0, which stamps frame_timeout[0] = 0
        // only once the End stage runs; drive framing to completion first.
        loop {
            let sym = tx.next_symbol(&mut rx, &inbound, &mut outbound, &mut stats, &mut log, 0, 100);
            if matches!(sym, Symbol::Control(_)) && outbound.window_len() == 1 {
                break;
            }
        }
        let sym = tx.next_symbol(&mut rx, &inbound, &mut outbound, &mut stats, &mut log, 1000, 100);
        assert!(matches!(sym, Symbol::Idle) || matches!(sym, Symbol::Control(_)));
        assert_eq!(tx.state(), TxState::OutputErrorStopped);
        assert_eq!(stats.outbound_error_timeout, 1);
    }
}
