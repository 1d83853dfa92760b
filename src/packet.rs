// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RapidIO packet: an opaque, fixed-capacity sequence of 32-bit words.
//!
//! The packet's header and transaction semantics are out of this crate's
//! scope; it only needs to move whole packets in order and validate the
//! 16-bit CRC embedded in them.

use crc::{Algorithm, Crc};

/// Largest packet the stack will carry, per the RapidIO serial spec (69
/// words = 276 bytes).
pub const MAX_PACKET_WORDS: usize = 69;

/// Words per ring-buffer slot: the packet itself plus one word recording its
/// length.
pub const SLOT_WORDS: usize = MAX_PACKET_WORDS + 1;

/// CRC-16/CCITT-FALSE: poly `0x1021`, seed `0xFFFF`, no reflection, no xorout.
/// This is the RapidIO packet CRC.
const CRC16_ALGORITHM: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xffff,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x29b1,
    residue: 0x0000,
};

pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC16_ALGORITHM);

/// Error returned when a caller-supplied word count can't be a packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Zero words, or more than [`MAX_PACKET_WORDS`].
    LengthOutOfRange,
}

/// A fixed-capacity, stack-resident packet.
///
/// The trailing 16 bits of the last word carry the packet's CRC-16, covering
/// every preceding word in big-endian byte order (the upper 16 bits of the
/// last word are unused padding). This convention is a property of this
/// crate's framing, not of RapidIO packet headers in general; callers
/// producing packets for [`setOutboundPacket`](crate::Stack::set_outbound_packet)
/// must lay out their last word this way.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Packet {
    words: [u32; MAX_PACKET_WORDS],
    len: usize,
}

impl Packet {
    pub fn from_words(words: &[u32]) -> Result<Self, PacketError> {
        if words.is_empty() || words.len() > MAX_PACKET_WORDS {
            return Err(PacketError::LengthOutOfRange);
        }
        let mut buf = [0u32; MAX_PACKET_WORDS];
        buf[..words.len()].copy_from_slice(words);
        Ok(Self {
            words: buf,
            len: words.len(),
        })
    }

    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// CRC-16 computed over every word except the last, i.e. the value the
    /// last word's low 16 bits are expected to carry.
    pub fn expected_crc(&self) -> u16 {
        crc_over_words(&self.words[..self.len - 1])
    }

    /// The CRC field embedded in the last word.
    pub fn embedded_crc(&self) -> u16 {
        (self.words[self.len - 1] & 0xffff) as u16
    }

    pub fn crc_is_valid(&self) -> bool {
        self.len >= 1 && self.expected_crc() == self.embedded_crc()
    }
}

/// Runs the packet CRC over a big-endian word sequence in one pass. Used for
/// packets already fully assembled; the receiver FSM instead folds one word
/// in at a time with [`crc16_fold_word`] so each data symbol is O(1) to
/// process without holding a borrowed [`crc::Digest`] across `portAddSymbol`
/// calls.
pub fn crc_over_words(words: &[u32]) -> u16 {
    let mut digest = CRC16.digest();
    for w in words {
        digest.update(&w.to_be_bytes());
    }
    digest.finalize()
}

/// Seed value for an incremental CRC-16 run, matching [`CRC16_ALGORITHM`]'s
/// `init`.
pub const CRC16_INIT: u16 = 0xffff;

/// Folds one big-endian 32-bit word into a running CRC-16/CCITT-FALSE value.
/// Equivalent to `crc_over_words` extended by one word, but takes and
/// returns a plain `u16` so the receiver can carry it across symbol calls
/// without borrowing anything.
pub fn crc16_fold_word(crc: u16, word: u32) -> u16 {
    let mut crc = crc;
    for byte in word.to_be_bytes() {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
