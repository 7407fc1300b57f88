/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The discrete-event queue that orders everything that happens in a simulation.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::{
    timer::Timeout,
    types::{
        data_types::{PeerId, Tick},
        peer_address::PeerAddress,
    },
};

/// Everything that can be scheduled to happen at a tick.
#[derive(Clone, Debug)]
pub(crate) enum SimulationEvent {
    /// A new peer joins with the given id, or the next free one.
    PeerJoin { id: PeerId },

    /// The peer with the given id, or the next live one, fails.
    PeerFail { id: PeerId },

    /// A client asks the entry peer to add an entry to the index.
    AddIndexEntry { key: String, value: String },

    /// A gradient round of `peer`.
    Round { peer: PeerAddress },

    /// A membership sample is due at `peer`.
    Sample { peer: PeerAddress },

    /// An encoded message arrives at `destination`.
    Deliver {
        origin: PeerAddress,
        destination: PeerAddress,
        bytes: Vec<u8>,
    },

    /// A timeout that `peer` scheduled fires.
    Timeout { peer: PeerAddress, timeout: Timeout },

    /// The snapshot reports.
    Report,
}

struct Scheduled {
    at: Tick,
    seq: u64,
    event: SimulationEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-queue of [`SimulationEvent`]s. Events scheduled for the same tick pop in the order they were
/// pushed.
#[derive(Default)]
pub(crate) struct EventQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, at: Tick, event: SimulationEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { at, seq, event }));
    }

    pub(crate) fn pop(&mut self) -> Option<(Tick, SimulationEvent)> {
        self.heap
            .pop()
            .map(|Reverse(scheduled)| (scheduled.at, scheduled.event))
    }

    /// The tick of the next event, if any.
    pub(crate) fn peek_tick(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse(scheduled)| scheduled.at)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
