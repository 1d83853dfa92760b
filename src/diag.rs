// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small ring-buffer event log, carried per [`Stack`](crate::Stack)
//! instance rather than as a module-level static.
//!
//! Shaped after `ringbuf`'s `RingbufEntry`/`Ringbuf<T, N>`: identical
//! consecutive entries coalesce into a single slot with a running count
//! instead of each eating a new one, so a log that's mostly "nothing
//! happened, nothing happened, ..." doesn't evict the interesting entries.
//! Unlike `ringbuf`, there's no static-initializer macro — a stack instance
//! owns its log directly as a field, consistent with this crate's rule that
//! all state lives in the caller-supplied instance, never behind a global.

/// One notable event observed by the receiver or transmitter FSM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    RxState(crate::rx::RxState),
    TxState(crate::tx::TxState),
    PacketDelivered { ack_id: u8 },
    PacketAccepted { ack_id: u8 },
    RxError {
        cause: crate::error::PacketNotAcceptedCause,
    },
    TxTimeout {
        ack_id: u8,
    },
    LinkUp,
    LinkDown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Entry {
    event: Event,
    count: u32,
}

/// Fixed-depth event log. `N` is chosen per use site; the stack's own log
/// uses a small depth since it is meant for "what just happened", not a full
/// trace.
#[derive(Debug)]
pub struct Ringbuf<const N: usize> {
    last: Option<usize>,
    buffer: [Option<Entry>; N],
}

impl<const N: usize> Default for Ringbuf<N> {
    fn default() -> Self {
        Self {
            last: None,
            buffer: [None; N],
        }
    }
}

impl<const N: usize> Ringbuf<N> {
    #[cfg(not(feature = "disabled-ringbuf"))]
    pub fn record(&mut self, event: Event) {
        if let Some(last) = self.last {
            if let Some(ent) = &mut self.buffer[last] {
                if ent.event == event {
                    ent.count = ent.count.saturating_add(1);
                    return;
                }
            }
        }
        let ndx = match self.last {
            None => 0,
            Some(last) if last + 1 >= N => 0,
            Some(last) => last + 1,
        };
        self.buffer[ndx] = Some(Entry { event, count: 1 });
        self.last = Some(ndx);
    }

    #[cfg(feature = "disabled-ringbuf")]
    pub fn record(&mut self, _event: Event) {}

    /// Iterates entries oldest-first, for tests and debug dumps.
    pub fn iter(&self) -> impl Iterator<Item = (Event, u32)> + '_ {
        let start = self.last.map(|l| (l + 1) % N).unwrap_or(0);
        (0..N)
            .map(move |i| self.buffer[(start + i) % N])
            .flatten()
            .map(|e| (e.event, e.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_consecutive_events_coalesce() {
        let mut log: Ringbuf<4> = Ringbuf::default();
        log.record(Event::LinkUp);
        log.record(Event::LinkUp);
        log.record(Event::LinkUp);
        let entries: std::vec::Vec<_> = log.iter().collect();
        assert_eq!(entries, vec![(Event::LinkUp, 3)]);
    }

    #[test]
    fn distinct_events_each_get_a_slot() {
        let mut log: Ringbuf<4> = Ringbuf::default();
        log.record(Event::PacketDelivered { ack_id: 0 });
        log.record(Event::PacketDelivered { ack_id: 1 });
        let entries: std::vec::Vec<_> = log.iter().collect();
        assert_eq!(
            entries,
            vec![
                (Event::PacketDelivered { ack_id: 0 }, 1),
                (Event::PacketDelivered { ack_id: 1 }, 1),
            ]
        );
    }

    #[test]
    fn ring_wraps_after_n_distinct_events() {
        let mut log: Ringbuf<2> = Ringbuf::default();
        log.record(Event::PacketAccepted { ack_id: 0 });
        log.record(Event::PacketAccepted { ack_id: 1 });
        log.record(Event::PacketAccepted { ack_id: 2 });
        let entries: std::vec::Vec<_> = log.iter().collect();
        assert_eq!(
            entries,
            vec![
                (Event::PacketAccepted { ack_id: 1 }, 1),
                (Event::PacketAccepted { ack_id: 2 }, 1),
            ]
        );
    }
}
