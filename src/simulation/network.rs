/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The simulated transport and timer service that every peer of a simulation is wired to.
//!
//! Sent messages are encoded with `borsh` and delivered after a random latency in
//! `[min_latency, max_latency]` ticks. Encoding makes the simulated network account for the actual size
//! of every message, and makes sure that no peer ever shares state with another through a message.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use borsh::BorshSerialize;
use rand::{rngs::StdRng, Rng};

use crate::{
    networking::{
        messages::{Message, Protocol},
        network::Network,
    },
    timer::{Timeout, Timer},
    types::{data_types::Tick, peer_address::PeerAddress},
};

use super::scheduler::{EventQueue, SimulationEvent};

/// Number and total encoded size of the messages sent by one protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolStats {
    pub messages: u64,
    pub bytes: u64,
}

/// Per-protocol message accounting of a whole simulation run.
#[derive(Clone, Debug, Default)]
pub struct NetworkStats {
    per_protocol: BTreeMap<Protocol, ProtocolStats>,
}

impl NetworkStats {
    fn record(&mut self, protocol: Protocol, bytes: usize) {
        let stats = self.per_protocol.entry(protocol).or_default();
        stats.messages += 1;
        stats.bytes += bytes as u64;
    }

    pub fn protocol(&self, protocol: Protocol) -> ProtocolStats {
        self.per_protocol
            .get(&protocol)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_messages(&self) -> u64 {
        self.per_protocol.values().map(|stats| stats.messages).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.per_protocol.values().map(|stats| stats.bytes).sum()
    }
}

/// State shared by the simulation and every peer's [`SimulatedNetwork`].
pub(crate) struct NetworkCore {
    pub(crate) now: Tick,
    pub(crate) queue: EventQueue,
    pub(crate) stats: NetworkStats,
    rng: StdRng,
    min_latency: u64,
    max_latency: u64,
}

impl NetworkCore {
    pub(crate) fn new(rng: StdRng, min_latency: u64, max_latency: u64) -> Self {
        Self {
            now: Tick::default(),
            queue: EventQueue::new(),
            stats: NetworkStats::default(),
            rng,
            min_latency,
            max_latency: max_latency.max(min_latency),
        }
    }

    fn latency(&mut self) -> u64 {
        self.rng.gen_range(self.min_latency, self.max_latency + 1)
    }
}

/// One peer's port on the simulated network. Implements both [`Network`] and [`Timer`].
#[derive(Clone)]
pub struct SimulatedNetwork {
    me: PeerAddress,
    core: Rc<RefCell<NetworkCore>>,
}

impl SimulatedNetwork {
    pub(crate) fn new(me: PeerAddress, core: Rc<RefCell<NetworkCore>>) -> Self {
        Self { me, core }
    }
}

impl Network for SimulatedNetwork {
    fn send(&mut self, peer: PeerAddress, message: Message) {
        let protocol = message.protocol();
        let bytes = match message.try_to_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("{} failed to encode a {} message: {}", self.me, protocol, err);
                return;
            }
        };

        let mut core = self.core.borrow_mut();
        core.stats.record(protocol, bytes.len());
        let latency = core.latency();
        let at = core.now + latency;
        core.queue.push(
            at,
            SimulationEvent::Deliver {
                origin: self.me,
                destination: peer,
                bytes,
            },
        );
    }
}

impl Timer for SimulatedNetwork {
    fn schedule(&mut self, delay: u64, timeout: Timeout) {
        let mut core = self.core.borrow_mut();
        let at = core.now + delay;
        core.queue.push(
            at,
            SimulationEvent::Timeout {
                peer: self.me,
                timeout,
            },
        );
    }
}
