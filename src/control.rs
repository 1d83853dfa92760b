// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control-symbol vocabulary: the `stype0`/`stype1`/`cmd` assignments the
//! receiver and transmitter FSMs use to talk to a link partner running this
//! same stack.
//!
//! RapidIO Part 6 assigns `stype0` values to Status, Packet-accepted,
//! Packet-retry and Packet-not-accepted, and folds start/end-of-packet
//! framing into character-level codes below the symbol interface this crate
//! exposes. Since this crate's
//! [`Symbol`](crate::symbol::Symbol) is a pure four-variant tagged union with
//! no character-level escape, start/end-of-packet framing is represented
//! here as its own `stype0` value (`PACKET_FRAME`) discriminated by
//! `stype1`, and the packet CRC is never carried on a control symbol — it
//! travels in the packet's own trailing data word (see `packet.rs`).
//! Restart-from-retry and link-request/link-response round out the table to
//! fill exactly the 8 values the 3-bit `stype0` field provides.

use crate::symbol::ControlWord;

pub mod stype0 {
    pub const STATUS: u8 = 0;
    pub const PACKET_FRAME: u8 = 1;
    pub const PACKET_ACCEPTED: u8 = 2;
    pub const PACKET_RETRY: u8 = 3;
    pub const PACKET_NOT_ACCEPTED: u8 = 4;
    pub const RESTART_FROM_RETRY: u8 = 5;
    pub const LINK_REQUEST: u8 = 6;
    pub const LINK_RESPONSE: u8 = 7;
}

pub mod frame_stype1 {
    pub const START_OF_PACKET: u8 = 0;
    pub const END_OF_PACKET: u8 = 1;
}

pub mod link_request_cmd {
    /// The only link-request variety this stack ever issues: "tell me your
    /// expected ackId and buffer status."
    pub const INPUT_STATUS: u8 = 1;
}

pub fn status(buffer_status: u8) -> ControlWord {
    ControlWord::new(stype0::STATUS, 0, buffer_status, 0, 0)
}

pub fn start_of_packet(ack_id: u8) -> ControlWord {
    ControlWord::new(
        stype0::PACKET_FRAME,
        ack_id,
        0,
        frame_stype1::START_OF_PACKET,
        0,
    )
}

pub fn end_of_packet() -> ControlWord {
    ControlWord::new(stype0::PACKET_FRAME, 0, 0, frame_stype1::END_OF_PACKET, 0)
}

pub fn packet_accepted(ack_id: u8) -> ControlWord {
    ControlWord::new(stype0::PACKET_ACCEPTED, ack_id, 0, 0, 0)
}

pub fn packet_retry(ack_id: u8) -> ControlWord {
    ControlWord::new(stype0::PACKET_RETRY, ack_id, 0, 0, 0)
}

pub fn packet_not_accepted(ack_id: u8, cause: u8) -> ControlWord {
    ControlWord::new(stype0::PACKET_NOT_ACCEPTED, ack_id, cause, 0, 0)
}

pub fn restart_from_retry(ack_id: u8) -> ControlWord {
    ControlWord::new(stype0::RESTART_FROM_RETRY, ack_id, 0, 0, 0)
}

pub fn link_request() -> ControlWord {
    ControlWord::new(
        stype0::LINK_REQUEST,
        0,
        0,
        0,
        link_request_cmd::INPUT_STATUS,
    )
}

pub fn link_response(ack_id: u8, buffer_status: u8) -> ControlWord {
    ControlWord::new(stype0::LINK_RESPONSE, ack_id, buffer_status, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builder_round_trips_through_the_wire() {
        let words = [
            status(12),
            start_of_packet(5),
            end_of_packet(),
            packet_accepted(3),
            packet_retry(7),
            packet_not_accepted(1, 4),
            restart_from_retry(9),
            link_request(),
            link_response(2, 30),
        ];
        for w in words {
            let decoded = ControlWord::from_wire(w.to_wire()).expect("valid crc");
            assert_eq!(w, decoded);
        }
    }

    #[test]
    fn each_kind_has_a_distinct_stype0() {
        let mut seen: u32 = 0;
        for s in [
            stype0::STATUS,
            stype0::PACKET_FRAME,
            stype0::PACKET_ACCEPTED,
            stype0::PACKET_RETRY,
            stype0::PACKET_NOT_ACCEPTED,
            stype0::RESTART_FROM_RETRY,
            stype0::LINK_REQUEST,
            stype0::LINK_RESPONSE,
        ] {
            assert!(seen & (1 << s) == 0, "duplicate stype0 value {s}");
            seen |= 1 << s;
        }
    }
}
