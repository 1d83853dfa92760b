// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cause codes a receiver reports to its link partner in a
//! packet-not-accepted control symbol.

/// Why a receiver refused a packet and demanded a resynchronization.
///
/// Discriminants match the RapidIO Part 6 packet-not-accepted cause field
/// layout so wire captures decode identically regardless of which side
/// produced them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketNotAcceptedCause {
    Reserved = 0,
    UnexpectedAckId = 1,
    ControlCrc = 2,
    NonMaintenance = 3,
    PacketCrc = 4,
    IllegalCharacter = 5,
    NoResource = 6,
    Descrambler = 7,
    General = 31,
}

impl PacketNotAcceptedCause {
    /// Number of bits the cause occupies in the control symbol's `parameter1`
    /// field.
    pub const WIRE_BITS: u32 = 5;

    /// Decode a 5-bit wire value. Any value not matching a known cause folds
    /// into [`General`](Self::General) rather than failing: the field is a
    /// single byte of attacker/bit-error-controlled wire data and must never
    /// be rejected outright.
    pub fn from_wire(value: u8) -> Self {
        match value & 0x1f {
            0 => Self::Reserved,
            1 => Self::UnexpectedAckId,
            2 => Self::ControlCrc,
            3 => Self::NonMaintenance,
            4 => Self::PacketCrc,
            5 => Self::IllegalCharacter,
            6 => Self::NoResource,
            7 => Self::Descrambler,
            _ => Self::General,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

impl Default for PacketNotAcceptedCause {
    fn default() -> Self {
        Self::Reserved
    }
}
