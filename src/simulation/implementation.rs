/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The simulation run loop. Main type: [`Simulation`].

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    rc::Rc,
    sync::mpsc::{self, Receiver, Sender},
};

use borsh::BorshDeserialize;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    event_bus::{drain_events, EventHandlers, HandlerPtr},
    events::Event,
    index_store::{IndexEntry, QueryError},
    networking::messages::Message,
    peer::Peer,
    snapshot::{Snapshot, SnapshotError},
    types::{
        data_types::{PeerId, Tick},
        peer_address::{NetworkAddress, PeerAddress},
    },
};

use super::{
    configuration::SimulationConfiguration,
    membership::MembershipSampler,
    network::{NetworkCore, NetworkStats, SimulatedNetwork},
    scheduler::SimulationEvent,
};

/// Port of the first 2^24 peers that join. Later peers take the ports above it.
const PEER_PORT: u16 = 8058;

/// The network address of the `sequence`th peer to join, or `None` if the simulated address space is
/// used up. Distinct sequence numbers always get distinct addresses.
fn network_address(sequence: u64) -> Option<NetworkAddress> {
    let port = u16::try_from(sequence >> 24)
        .ok()
        .and_then(|offset| PEER_PORT.checked_add(offset))?;
    let [_, _, _, _, _, a, b, c] = sequence.to_be_bytes();
    Some(NetworkAddress::new([10, a, b, c], port))
}

/// A peer wired to the simulated network.
pub type SimulatedPeer = Peer<SimulatedNetwork, SimulatedNetwork>;

/// A discrete-event simulation of an overlay. See the [module-level docs](super).
pub struct Simulation {
    config: SimulationConfiguration,
    core: Rc<RefCell<NetworkCore>>,
    peers: BTreeMap<PeerId, SimulatedPeer>,
    peer_sequence: u64,
    first_added_peer: Option<PeerAddress>,
    sampler: MembershipSampler,
    rng: StdRng,
    snapshot: Snapshot,
    event_publisher: Sender<Event>,
    event_subscriber: Receiver<Event>,
    event_handlers: EventHandlers,
}

impl Simulation {
    pub fn new(config: SimulationConfiguration) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let network_rng = StdRng::seed_from_u64(rng.gen());
        let core = Rc::new(RefCell::new(NetworkCore::new(
            network_rng,
            config.min_latency,
            config.max_latency,
        )));
        core.borrow_mut()
            .queue
            .push(Tick::new(config.snapshot_period), SimulationEvent::Report);

        let (event_publisher, event_subscriber) = mpsc::channel();

        Self {
            config,
            core,
            peers: BTreeMap::new(),
            peer_sequence: 0,
            first_added_peer: None,
            sampler: MembershipSampler::new(config.sample_size),
            rng,
            snapshot: Snapshot::new(config.expected_peers),
            event_publisher,
            event_subscriber,
            event_handlers: EventHandlers::new(config.log_events),
        }
    }

    /// Schedule a peer to join at `at` with `id`, or with the next free id if `id` is taken.
    pub fn peer_join(&mut self, at: Tick, id: PeerId) {
        self.schedule(at, SimulationEvent::PeerJoin { id })
    }

    /// Schedule the peer with `id`, or the next live peer after `id`, to fail at `at`.
    pub fn peer_fail(&mut self, at: Tick, id: PeerId) {
        self.schedule(at, SimulationEvent::PeerFail { id })
    }

    /// Schedule a client to ask the first peer that joined to add an entry at `at`.
    pub fn add_index_entry(&mut self, at: Tick, key: impl Into<String>, value: impl Into<String>) {
        self.schedule(
            at,
            SimulationEvent::AddIndexEntry {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    /// Register a handler that is called with every event published by any peer.
    pub fn on_event(&mut self, handler: HandlerPtr<Event>) {
        self.event_handlers.add_handler(handler)
    }

    /// Run until the index propagation completes, no events remain, or the next event is due after
    /// `max_ticks`.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        while !self.snapshot.is_complete() {
            match self.next_tick() {
                Some(at) if at.int() <= self.config.max_ticks => self.step()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Run every event due at or before `until`, whether or not the index propagation completes.
    pub fn run_until(&mut self, until: Tick) -> Result<(), SimulationError> {
        while let Some(at) = self.next_tick() {
            if at > until {
                break;
            }
            self.step()?;
        }
        let mut core = self.core.borrow_mut();
        if core.now < until {
            core.now = until;
        }
        Ok(())
    }

    pub fn now(&self) -> Tick {
        self.core.borrow().now
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn peer(&self, id: PeerId) -> Option<&SimulatedPeer> {
        self.peers.get(&id)
    }

    /// The addresses of all live peers, lowest id first.
    pub fn live_peers(&self) -> Vec<PeerAddress> {
        self.peers.values().map(|peer| peer.address()).collect()
    }

    /// Search the index copy of the peer with `id`.
    pub fn query(&self, id: PeerId, query: &str) -> Result<Vec<IndexEntry>, SimulationError> {
        let peer = self.peers.get(&id).ok_or(SimulationError::PeerNotFound(id))?;
        Ok(peer.query(query)?)
    }

    pub fn gradient_view(&self, id: PeerId) -> Result<Vec<PeerAddress>, SimulationError> {
        self.peers
            .get(&id)
            .map(|peer| peer.gradient_view().to_vec())
            .ok_or(SimulationError::PeerNotFound(id))
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.core.borrow().stats.clone()
    }

    fn schedule(&mut self, at: Tick, event: SimulationEvent) {
        self.core.borrow_mut().queue.push(at, event)
    }

    fn next_tick(&self) -> Option<Tick> {
        self.core.borrow().queue.peek_tick()
    }

    /// Execute the next event, then hand every event the peers published to the snapshot and the
    /// event handlers.
    fn step(&mut self) -> Result<(), SimulationError> {
        let next = self.core.borrow_mut().queue.pop();
        let Some((at, event)) = next else {
            return Ok(());
        };
        self.core.borrow_mut().now = at;

        match event {
            SimulationEvent::PeerJoin { id } => self.join(id, at)?,
            SimulationEvent::PeerFail { id } => self.fail(id, at)?,
            SimulationEvent::AddIndexEntry { key, value } => {
                let entry_peer = self.first_added_peer.ok_or(SimulationError::NoEntryPeer)?;
                let peer = self
                    .live_peer_mut(&entry_peer)
                    .ok_or(SimulationError::NoEntryPeer)?;
                peer.add_index_entry(key, value, at);
            }
            SimulationEvent::Round { peer } => {
                let all_joined = self.snapshot.has_all_peers_joined();
                if let Some(live) = self.live_peer_mut(&peer) {
                    if all_joined {
                        live.on_round(at);
                    }
                    let next = at + self.config.gradient_period;
                    self.schedule(next, SimulationEvent::Round { peer });
                }
            }
            SimulationEvent::Sample { peer } => {
                if self.live_peer_mut(&peer).is_some() {
                    if self.snapshot.has_all_peers_joined() {
                        let live = self.live_peers();
                        let sample = self.sampler.sample(peer, &live, &mut self.rng);
                        if let Some(live) = self.live_peer_mut(&peer) {
                            live.on_sample(&sample);
                        }
                    }
                    let next = at + self.config.membership_period;
                    self.schedule(next, SimulationEvent::Sample { peer });
                }
            }
            SimulationEvent::Deliver {
                origin,
                destination,
                bytes,
            } => {
                if let Some(live) = self.live_peer_mut(&destination) {
                    match Message::try_from_slice(&bytes) {
                        Ok(msg) => live.on_receive_msg(msg, origin, at),
                        Err(err) => log::debug!(
                            "{} dropped an undecodable message from {}: {}",
                            destination,
                            origin,
                            err
                        ),
                    }
                }
            }
            SimulationEvent::Timeout { peer, timeout } => {
                if let Some(live) = self.live_peer_mut(&peer) {
                    live.on_timeout(timeout, at);
                }
            }
            SimulationEvent::Report => {
                self.snapshot.report(at)?;
                let next = at + self.config.snapshot_period;
                self.schedule(next, SimulationEvent::Report);
            }
        }

        for event in drain_events(&self.event_subscriber) {
            self.snapshot.observe(&event)?;
            self.event_handlers.fire_handlers(&event);
        }

        Ok(())
    }

    fn join(&mut self, id: PeerId, now: Tick) -> Result<(), SimulationError> {
        let space = self.config.identifier_space_size;
        if self.peers.len() as u64 >= space {
            return Err(SimulationError::IdentifierSpaceExhausted);
        }

        // Linear probing to the next free id.
        let mut id = id.int() % space;
        while self.peers.contains_key(&PeerId::new(id)) {
            id = (id + 1) % space;
        }
        let id = PeerId::new(id);

        let sequence = self.peer_sequence + 1;
        let address = PeerAddress::new(
            network_address(sequence).ok_or(SimulationError::AddressSpaceExhausted)?,
            id,
        );
        self.peer_sequence = sequence;
        let network = SimulatedNetwork::new(address, self.core.clone());
        let seed = self.config.seed ^ id.int().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let peer = Peer::new(
            address,
            self.config.peer,
            network.clone(),
            network,
            seed,
            Some(self.event_publisher.clone()),
        );

        self.peers.insert(id, peer);
        self.first_added_peer.get_or_insert(address);
        self.snapshot.add_peer(address, now);
        log::debug!("{} joined at {}", address, now);

        let round_offset = self.rng.gen_range(1, self.config.gradient_period + 1);
        let sample_offset = self.rng.gen_range(1, self.config.membership_period + 1);
        self.schedule(now + round_offset, SimulationEvent::Round { peer: address });
        self.schedule(now + sample_offset, SimulationEvent::Sample { peer: address });

        Ok(())
    }

    fn fail(&mut self, id: PeerId, now: Tick) -> Result<(), SimulationError> {
        // The peer that owns `id`, or the next live one, wrapping around the identifier space.
        let owner = self
            .peers
            .range(id..)
            .next()
            .or_else(|| self.peers.iter().next())
            .map(|(owner, _)| *owner)
            .ok_or(SimulationError::EmptyNetwork)?;

        if let Some(peer) = self.peers.remove(&owner) {
            log::debug!("{} failed at {}", peer.address(), now);
            self.snapshot.remove_peer(peer.address(), now)?;
        }
        Ok(())
    }

    /// The live peer at exactly `address`. A message or timer for a failed peer is never delivered to
    /// a later peer that took over its id.
    fn live_peer_mut(&mut self, address: &PeerAddress) -> Option<&mut SimulatedPeer> {
        self.peers
            .get_mut(&address.id())
            .filter(|peer| peer.address().address() == address.address())
    }
}

/// Enumerates the ways a [`Simulation`] run can fail.
#[derive(Debug)]
pub enum SimulationError {
    /// Every id of the identifier space is taken.
    IdentifierSpaceExhausted,

    /// Every simulated network address has been handed out.
    AddressSpaceExhausted,

    /// A peer was asked to fail, but no peer is live.
    EmptyNetwork,

    /// No live peer has the given id.
    PeerNotFound(PeerId),

    /// An index entry was added, but the first peer that joined is not live.
    NoEntryPeer,

    /// The snapshot found the run inconsistent.
    Snapshot(SnapshotError),

    /// A query was rejected.
    Query(QueryError),
}

impl Display for SimulationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::IdentifierSpaceExhausted => f.write_str("identifier space exhausted"),
            SimulationError::AddressSpaceExhausted => f.write_str("address space exhausted"),
            SimulationError::EmptyNetwork => f.write_str("empty network"),
            SimulationError::PeerNotFound(id) => write!(f, "no live peer with id {}", id),
            SimulationError::NoEntryPeer => f.write_str("no live entry peer"),
            SimulationError::Snapshot(err) => write!(f, "snapshot error: {}", err),
            SimulationError::Query(err) => write!(f, "query error: {}", err),
        }
    }
}

impl std::error::Error for SimulationError {}

impl From<SnapshotError> for SimulationError {
    fn from(value: SnapshotError) -> Self {
        SimulationError::Snapshot(value)
    }
}

impl From<QueryError> for SimulationError {
    fn from(value: QueryError) -> Self {
        SimulationError::Query(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(expected_peers: usize, identifier_space_size: u64) -> Simulation {
        Simulation::new(
            SimulationConfiguration::builder()
                .expected_peers(expected_peers)
                .identifier_space_size(identifier_space_size)
                .build(),
        )
    }

    fn ids(simulation: &Simulation) -> Vec<u64> {
        simulation
            .live_peers()
            .iter()
            .map(|peer| peer.id().int())
            .collect()
    }

    #[test]
    fn join_probes_to_the_next_free_id() {
        let mut simulation = simulation(4, 8);
        for at in 0..4 {
            simulation.peer_join(Tick::new(at), PeerId::new(6));
        }
        simulation.run_until(Tick::new(3)).unwrap();

        assert_eq!(ids(&simulation), vec![0, 1, 6, 7]);
        assert!(simulation.snapshot().has_all_peers_joined());
    }

    #[test]
    fn full_identifier_space_rejects_joins() {
        let mut simulation = simulation(2, 2);
        for at in 0..3 {
            simulation.peer_join(Tick::new(at), PeerId::new(0));
        }
        assert!(matches!(
            simulation.run_until(Tick::new(2)),
            Err(SimulationError::IdentifierSpaceExhausted)
        ));
    }

    #[test]
    fn network_addresses_never_repeat() {
        let sequences = [1, 2, 256, 257, 65_536, 65_537, 1 << 24, (1 << 24) + 1, 1 << 32];
        let addresses: Vec<NetworkAddress> = sequences
            .iter()
            .map(|sequence| network_address(*sequence).unwrap())
            .collect();
        for (i, address) in addresses.iter().enumerate() {
            assert!(!addresses[i + 1..].contains(address));
        }
        assert_eq!(network_address(1).unwrap(), NetworkAddress::new([10, 0, 0, 1], PEER_PORT));
        assert_eq!(
            network_address((1 << 24) + 1).unwrap(),
            NetworkAddress::new([10, 0, 0, 1], PEER_PORT + 1)
        );
        assert_eq!(network_address(u64::MAX), None);
    }

    #[test]
    fn fail_takes_the_owner_or_its_successor() {
        let mut simulation = simulation(3, 16);
        for (at, id) in [2, 5, 9].into_iter().enumerate() {
            simulation.peer_join(Tick::new(at as u64), PeerId::new(id));
        }
        simulation.peer_fail(Tick::new(10), PeerId::new(5));
        simulation.peer_fail(Tick::new(11), PeerId::new(10));
        simulation.run_until(Tick::new(11)).unwrap();

        assert_eq!(ids(&simulation), vec![9]);
    }

    #[test]
    fn fail_on_an_empty_network_is_an_error() {
        let mut simulation = simulation(1, 16);
        simulation.peer_fail(Tick::new(1), PeerId::new(3));
        assert!(matches!(
            simulation.run_until(Tick::new(1)),
            Err(SimulationError::EmptyNetwork)
        ));
    }

    #[test]
    fn entries_need_an_entry_peer() {
        let mut simulation = simulation(1, 16);
        simulation.add_index_entry(Tick::new(1), "k", "v");
        assert!(matches!(
            simulation.run_until(Tick::new(1)),
            Err(SimulationError::NoEntryPeer)
        ));
    }

    #[test]
    fn unknown_peers_cannot_be_queried() {
        let simulation = simulation(1, 16);
        assert!(matches!(
            simulation.query(PeerId::new(1), "k"),
            Err(SimulationError::PeerNotFound(_))
        ));
        assert!(simulation.gradient_view(PeerId::new(1)).is_err());
    }
}
