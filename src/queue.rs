// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-size ring of packet slots, backed by caller-owned memory.
//!
//! Modeled on [`circq`](https://github.com/oxidecomputer/hubris)'s
//! borrowed-backing-slice circular buffer, but indexed in whole packet slots
//! rather than bytes, and extended with the sliding-window bookkeeping
//! (`windowSize`/`windowIndex`) the transmitter side needs while the
//! receiver side leaves it permanently at zero.

use crate::packet::{Packet, SLOT_WORDS};

/// Error returned by [`Queue::enqueue_back`] when no slot is free.
///
/// Calling `enqueue_back` when the queue is full is a
/// caller bug, not a condition the stack recovers from — callers must check
/// [`Queue::available_count`] first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueueFull;

/// A ring of `size` packet slots carved out of caller-supplied backing words.
#[derive(Debug)]
pub struct Queue<'a> {
    backing: &'a mut [u32],
    size: usize,
    available: usize,
    window_size: usize,
    window_index: usize,
    front_index: usize,
    back_index: usize,
}

impl<'a> Queue<'a> {
    /// Builds a queue over `backing`, which must hold at least one slot
    /// (`SLOT_WORDS` words). Returns `None` if it's too small.
    pub fn new(backing: &'a mut [u32]) -> Option<Self> {
        let size = backing.len() / SLOT_WORDS;
        if size == 0 {
            return None;
        }
        Some(Self {
            backing,
            size,
            available: size,
            window_size: 0,
            window_index: 0,
            front_index: 0,
            back_index: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn available_count(&self) -> usize {
        self.available
    }

    pub fn used_count(&self) -> usize {
        self.size - self.available
    }

    /// Outstanding-but-unacknowledged slot count. Always 0 on an ingress
    /// queue.
    pub fn window_len(&self) -> usize {
        self.window_size
    }

    /// Whether there is a queued packet that hasn't been handed to the
    /// transmitter for framing yet.
    pub fn window_open(&self) -> bool {
        self.used_count() > self.window_size
    }

    fn slot(&self, index: usize) -> &[u32] {
        let start = index * SLOT_WORDS;
        &self.backing[start..start + SLOT_WORDS]
    }

    fn slot_mut(&mut self, index: usize) -> &mut [u32] {
        let start = index * SLOT_WORDS;
        &mut self.backing[start..start + SLOT_WORDS]
    }

    fn write_slot(&mut self, index: usize, pkt: &Packet) {
        let slot = self.slot_mut(index);
        slot[0] = pkt.len() as u32;
        slot[1..1 + pkt.len()].copy_from_slice(pkt.words());
    }

    fn read_slot(&self, index: usize) -> Packet {
        let slot = self.slot(index);
        let len = slot[0] as usize;
        Packet::from_words(&slot[1..1 + len]).expect("slot holds a previously-validated packet")
    }

    /// Appends `pkt` at the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] if [`Self::available_count`] is 0; the caller
    /// must check first.
    pub fn enqueue_back(&mut self, pkt: &Packet) -> Result<(), QueueFull> {
        if self.available == 0 {
            return Err(QueueFull);
        }
        self.write_slot(self.back_index, pkt);
        self.back_index = (self.back_index + 1) % self.size;
        self.available -= 1;
        Ok(())
    }

    /// Reads (without removing) the packet currently at the window pointer.
    /// Only meaningful when [`Self::window_open`] is true.
    pub fn get_window(&self) -> Option<Packet> {
        if !self.window_open() {
            return None;
        }
        Some(self.read_slot(self.window_index))
    }

    /// Moves the send pointer forward and grows the outstanding window by
    /// one slot. Only valid when [`Self::window_open`] was true before the
    /// call (debug-asserted; the transmitter never calls this otherwise).
    pub fn advance_window(&mut self) {
        debug_assert!(self.window_size < self.used_count());
        self.window_index = (self.window_index + 1) % self.size;
        self.window_size += 1;
    }

    /// Pulls the send pointer back to the front of the queue and empties the
    /// outstanding window, so every unacknowledged packet will be
    /// re-examined by [`Self::get_window`]. Used when the peer demands a
    /// retry or when resynchronizing after an error.
    pub fn rewind_window(&mut self) {
        self.window_index = self.front_index;
        self.window_size = 0;
    }

    /// Releases the slot at the front of the queue, returning its packet.
    /// On an egress queue this is an acknowledgement; on an ingress queue
    /// this is the consumer draining a received packet. Panics if the queue
    /// is empty — the caller must check `used_count()` first.
    pub fn discard_front(&mut self) -> Packet {
        assert!(self.used_count() > 0, "discard_front on an empty queue");
        let pkt = self.read_slot(self.front_index);
        self.front_index = (self.front_index + 1) % self.size;
        self.available += 1;
        if self.window_size > 0 {
            self.window_size -= 1;
        }
        pkt
    }
}
