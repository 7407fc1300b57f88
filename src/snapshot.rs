/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Read-model over the events of a simulation run, which derives the benchmark milestones.
//!
//! The [`Snapshot`] is a pure observer: it never sends messages or changes protocol state. The
//! [simulation](crate::simulation) tells it about joining and failing peers, hands it every published
//! event, and asks it to [`report`](Snapshot::report) periodically.
//!
//! ## Milestones
//!
//! Every milestone is reported at most once, as a number of ticks. Except for `allPeersJoined`, values
//! are measured from the tick at which all expected peers had joined.
//!
//! | Key | Value |
//! |---|---|
//! | `allPeersJoined` | Tick at which the last expected peer joined. |
//! | `firstLeader` | Ticks until exactly one peer believes itself to be the leader. |
//! | `originalLeaderDead` | Ticks until the first leader was failed. |
//! | `deadLeaderConfirmed` | Ticks between the failure and the first election started after it. |
//! | `secondLeader` | Ticks between the first election after the failure and a new leader. |
//! | `indexAddInitiated`, `indexAddCompleted` | Ticks until the first index add was initiated and acknowledged. |
//! | `indexAddMessages` | Index add messages sent until the first acknowledgement. |
//! | `indexPropagationStart`, `indexPropagationComplete` | Ticks until the leader appended its first entry, and until every peer held the leader's max. |
//! | `indexPropagationMessages` | Index exchange messages sent during propagation. |
//!
//! Both leader milestones are checked against an oracle: the leader must be the peer with the lowest
//! id among the peers alive at the time. A mismatch is a [`SnapshotError::UnexpectedLeader`].

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use crate::{
    events::Event,
    types::{
        data_types::{PeerId, SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

pub const ALL_PEERS_JOINED: &str = "allPeersJoined";
pub const FIRST_LEADER: &str = "firstLeader";
pub const ORIGINAL_LEADER_DEAD: &str = "originalLeaderDead";
pub const DEAD_LEADER_CONFIRMED: &str = "deadLeaderConfirmed";
pub const SECOND_LEADER: &str = "secondLeader";
pub const INDEX_ADD_INITIATED: &str = "indexAddInitiated";
pub const INDEX_ADD_COMPLETED: &str = "indexAddCompleted";
pub const INDEX_ADD_MESSAGES: &str = "indexAddMessages";
pub const INDEX_PROPAGATION_START: &str = "indexPropagationStart";
pub const INDEX_PROPAGATION_COMPLETE: &str = "indexPropagationComplete";
pub const INDEX_PROPAGATION_MESSAGES: &str = "indexPropagationMessages";

/// What the snapshot knows about a live peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerInfo {
    pub is_leader: bool,
    pub max_sequence: SequenceNumber,
}

pub struct Snapshot {
    expected_peers: usize,
    peers: BTreeMap<PeerAddress, PeerInfo>,
    reported: BTreeMap<&'static str, u64>,
    all_peers_joined_at: Option<Tick>,
    first_leader: Option<PeerAddress>,
    last_leader_count: usize,
    last_index_dist_percentage: u64,
    max_leader_index: SequenceNumber,
    last_max_leader_index: SequenceNumber,
    index_add_messages: u64,
    index_propagation_messages: u64,
    index_propagation_messages_at_start: u64,
    completed: bool,
}

impl Snapshot {
    /// Create a snapshot that considers all peers joined once `expected_peers` peers have joined.
    pub fn new(expected_peers: usize) -> Self {
        Self {
            expected_peers,
            peers: BTreeMap::new(),
            reported: BTreeMap::new(),
            all_peers_joined_at: None,
            first_leader: None,
            last_leader_count: 0,
            last_index_dist_percentage: 0,
            max_leader_index: SequenceNumber::init(),
            last_max_leader_index: SequenceNumber::init(),
            index_add_messages: 0,
            index_propagation_messages: 0,
            index_propagation_messages_at_start: 0,
            completed: false,
        }
    }

    pub fn add_peer(&mut self, peer: PeerAddress, now: Tick) {
        self.peers.insert(peer, PeerInfo::default());
        if self.all_peers_joined_at.is_none() && self.peers.len() >= self.expected_peers {
            self.all_peers_joined_at = Some(now);
            self.report_value(ALL_PEERS_JOINED, now.int());
        }
    }

    pub fn remove_peer(&mut self, peer: PeerAddress, now: Tick) -> Result<(), SnapshotError> {
        self.peers.remove(&peer);
        if self.first_leader == Some(peer) {
            let since = self.ticks_since_all_joined(now)?;
            self.report_value(ORIGINAL_LEADER_DEAD, since);
        }
        Ok(())
    }

    /// Update the read-model with a single event.
    pub fn observe(&mut self, event: &Event) -> Result<(), SnapshotError> {
        match event {
            Event::BecomeLeader(become_leader) => {
                self.update_peer(become_leader.peer, |info| info.is_leader = true)
            }
            Event::Demote(demote) => self.update_peer(demote.peer, |info| info.is_leader = false),
            Event::StartElection(start_election) => {
                if self.is_reported(FIRST_LEADER)
                    && self.is_reported(ORIGINAL_LEADER_DEAD)
                    && !self.is_reported(SECOND_LEADER)
                    && !self.is_reported(DEAD_LEADER_CONFIRMED)
                {
                    let since = self.ticks_since_all_joined(start_election.tick)?;
                    let dead = self.reported_value(ORIGINAL_LEADER_DEAD)?;
                    self.report_value(DEAD_LEADER_CONFIRMED, since.saturating_sub(dead));
                }
            }
            Event::InitiateIndexAdd(initiate) => {
                self.report_once_since(INDEX_ADD_INITIATED, initiate.tick)?
            }
            Event::RouteIndexAdd(route) => {
                if route.next_hop.is_some() {
                    self.index_add_messages += 1;
                }
            }
            Event::SendLeaderResponse(_) => self.index_add_messages += 1,
            Event::CompleteIndexAdd(complete) => {
                if !self.is_reported(INDEX_ADD_COMPLETED) {
                    self.report_once_since(INDEX_ADD_COMPLETED, complete.tick)?;
                    self.report_value(INDEX_ADD_MESSAGES, self.index_add_messages);
                }
            }
            Event::AppendAtLeader(append) => {
                let sequence = append.entry.sequence;
                if sequence > self.max_leader_index {
                    self.max_leader_index = sequence;
                }
                self.update_peer(append.peer, |info| {
                    if sequence > info.max_sequence {
                        info.max_sequence = sequence
                    }
                });
                if !self.is_reported(INDEX_PROPAGATION_START) {
                    self.report_once_since(INDEX_PROPAGATION_START, append.tick)?;
                    self.index_propagation_messages_at_start = self.index_propagation_messages;
                }
            }
            Event::SendIndexExchangeRequest(_) | Event::SendIndexExchangeResponse(_) => {
                self.index_propagation_messages += 1
            }
            Event::ReceiveIndexEntries(received) => {
                let max = received.max;
                self.update_peer(received.peer, |info| info.max_sequence = max)
            }
            _ => {}
        }
        Ok(())
    }

    /// Detect the milestones that depend on the state of all peers, and log the changes since the last
    /// report. Does nothing until all peers have joined.
    pub fn report(&mut self, now: Tick) -> Result<(), SnapshotError> {
        if self.all_peers_joined_at.is_none() {
            return Ok(());
        }
        let since = self.ticks_since_all_joined(now)?;

        // 1. Leader milestones.
        let leaders = self.leaders();
        if leaders.len() == 1 && self.last_leader_count == 0 && !self.is_reported(FIRST_LEADER) {
            self.report_value(FIRST_LEADER, since);
            self.check_leader(FIRST_LEADER, leaders[0])?;
            self.first_leader = Some(leaders[0]);
        }
        if leaders.len() > self.last_leader_count
            && self.is_reported(FIRST_LEADER)
            && self.is_reported(ORIGINAL_LEADER_DEAD)
            && self.is_reported(DEAD_LEADER_CONFIRMED)
            && !self.is_reported(SECOND_LEADER)
        {
            let dead = self.reported_value(ORIGINAL_LEADER_DEAD)?;
            let confirmed = self.reported_value(DEAD_LEADER_CONFIRMED)?;
            self.report_value(SECOND_LEADER, since.saturating_sub(dead + confirmed));
            self.check_leader(SECOND_LEADER, leaders[0])?;
        }
        self.last_leader_count = leaders.len();

        // 2. Index distribution.
        let index_dist_percentage = self.index_dist_percentage()?;
        if index_dist_percentage.abs_diff(self.last_index_dist_percentage) >= 10 {
            self.last_index_dist_percentage = index_dist_percentage;
            log::info!("# index dist %: {}", index_dist_percentage);
        }
        if self.last_max_leader_index != self.max_leader_index {
            self.last_max_leader_index = self.max_leader_index;
            log::info!("# max index: {}", self.max_leader_index);
        }

        // 3. Propagation completion ends the run.
        if index_dist_percentage == 100
            && self.is_reported(INDEX_PROPAGATION_START)
            && !self.is_reported(INDEX_PROPAGATION_COMPLETE)
        {
            self.report_value(INDEX_PROPAGATION_COMPLETE, since);
            self.report_value(
                INDEX_PROPAGATION_MESSAGES,
                self.index_propagation_messages - self.index_propagation_messages_at_start,
            );
            self.completed = true;
        }

        Ok(())
    }

    /// Percentage (rounded down) of the live peers whose max sequence number equals the leader's.
    pub fn index_dist_percentage(&self) -> Result<u64, SnapshotError> {
        if self.peers.is_empty() {
            return Ok(0);
        }
        let mut with_full_index = 0;
        for (peer, info) in &self.peers {
            if info.max_sequence > self.max_leader_index {
                return Err(SnapshotError::IndexAheadOfLeader {
                    peer: peer.id(),
                    max: info.max_sequence,
                    leader_max: self.max_leader_index,
                });
            }
            if info.max_sequence == self.max_leader_index {
                with_full_index += 1;
            }
        }
        Ok(with_full_index * 100 / self.peers.len() as u64)
    }

    /// The live peers that believe themselves to be the leader, lowest first.
    pub fn leaders(&self) -> Vec<PeerAddress> {
        self.peers
            .iter()
            .filter(|(_, info)| info.is_leader)
            .map(|(peer, _)| *peer)
            .collect()
    }

    pub fn peer_info(&self, peer: &PeerAddress) -> Option<PeerInfo> {
        self.peers.get(peer).copied()
    }

    pub fn ticks_since_all_joined(&self, now: Tick) -> Result<u64, SnapshotError> {
        self.all_peers_joined_at
            .map(|joined| now.saturating_since(joined))
            .ok_or(SnapshotError::PeersNotJoined)
    }

    pub fn has_all_peers_joined(&self) -> bool {
        self.all_peers_joined_at.is_some()
    }

    pub fn is_reported(&self, key: &str) -> bool {
        self.reported.contains_key(key)
    }

    pub fn reported_value(&self, key: &'static str) -> Result<u64, SnapshotError> {
        self.reported
            .get(key)
            .copied()
            .ok_or(SnapshotError::UnreportedValue { key })
    }

    /// All values reported so far, by key.
    pub fn reported_values(&self) -> &BTreeMap<&'static str, u64> {
        &self.reported
    }

    /// Whether the index propagation completed, which ends the run.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn index_add_messages(&self) -> u64 {
        self.index_add_messages
    }

    pub fn index_propagation_messages(&self) -> u64 {
        self.index_propagation_messages
    }

    fn report_value(&mut self, key: &'static str, value: u64) {
        if self.reported.contains_key(key) {
            return;
        }
        self.reported.insert(key, value);
        log::info!("#### {}: {}", key, value);
    }

    fn report_once_since(&mut self, key: &'static str, now: Tick) -> Result<(), SnapshotError> {
        if !self.is_reported(key) {
            let since = self.ticks_since_all_joined(now)?;
            self.report_value(key, since);
        }
        Ok(())
    }

    fn update_peer<F: FnOnce(&mut PeerInfo)>(&mut self, peer: PeerAddress, update: F) {
        if let Some(info) = self.peers.get_mut(&peer) {
            update(info)
        }
    }

    fn check_leader(&self, milestone: &'static str, actual: PeerAddress) -> Result<(), SnapshotError> {
        match self.peers.keys().next() {
            Some(expected) if *expected != actual => Err(SnapshotError::UnexpectedLeader {
                milestone,
                expected: expected.id(),
                actual: actual.id(),
            }),
            _ => Ok(()),
        }
    }
}

/// Enumerates the ways a [`Snapshot`] can find a run inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A milestone measured from "all peers joined" was due before all peers joined.
    PeersNotJoined,

    /// A milestone depends on a value that has not been reported.
    UnreportedValue { key: &'static str },

    /// The elected leader is not the lowest live peer.
    UnexpectedLeader {
        milestone: &'static str,
        expected: PeerId,
        actual: PeerId,
    },

    /// A peer holds entries the leader never appended.
    IndexAheadOfLeader {
        peer: PeerId,
        max: SequenceNumber,
        leader_max: SequenceNumber,
    },
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::PeersNotJoined => f.write_str("all peers haven't joined yet"),
            SnapshotError::UnreportedValue { key } => write!(f, "key {} has not been reported", key),
            SnapshotError::UnexpectedLeader {
                milestone,
                expected,
                actual,
            } => write!(
                f,
                "{} is not the correct leader: expected {}, was {}",
                milestone, expected, actual
            ),
            SnapshotError::IndexAheadOfLeader {
                peer,
                max,
                leader_max,
            } => write!(
                f,
                "peer {} has index {} higher than the leader's {}",
                peer, max, leader_max
            ),
        }
    }
}

impl std::error::Error for SnapshotError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{
            AppendAtLeaderEvent, BecomeLeaderEvent, ReceiveIndexEntriesEvent, StartElectionEvent,
        },
        index_store::IndexEntry,
        networking::stub::peer,
    };

    fn joined(ids: &[u64]) -> Snapshot {
        let mut snapshot = Snapshot::new(ids.len());
        for (at, id) in ids.iter().enumerate() {
            snapshot.add_peer(peer(*id), Tick::new(at as u64 * 10));
        }
        snapshot
    }

    fn become_leader(id: u64, tick: u64) -> Event {
        Event::BecomeLeader(BecomeLeaderEvent {
            tick: Tick::new(tick),
            peer: peer(id),
            votes: 3,
            next_sequence: SequenceNumber::init(),
        })
    }

    fn start_election(id: u64, tick: u64) -> Event {
        Event::StartElection(StartElectionEvent {
            tick: Tick::new(tick),
            peer: peer(id),
            participants: 4,
        })
    }

    fn append(id: u64, sequence: u64, tick: u64) -> Event {
        Event::AppendAtLeader(AppendAtLeaderEvent {
            tick: Tick::new(tick),
            peer: peer(id),
            entry: IndexEntry::new(SequenceNumber::new(sequence), "k".into(), "v".into()),
        })
    }

    fn receive(id: u64, max: u64, tick: u64) -> Event {
        Event::ReceiveIndexEntries(ReceiveIndexEntriesEvent {
            tick: Tick::new(tick),
            peer: peer(id),
            origin: peer(1),
            appended: 1,
            max: SequenceNumber::new(max),
        })
    }

    #[test]
    fn all_peers_joined_is_reported_once() {
        let mut snapshot = Snapshot::new(3);
        snapshot.add_peer(peer(3), Tick::new(0));
        snapshot.add_peer(peer(2), Tick::new(5));
        assert!(!snapshot.has_all_peers_joined());
        assert_eq!(
            snapshot.ticks_since_all_joined(Tick::new(5)),
            Err(SnapshotError::PeersNotJoined)
        );

        snapshot.add_peer(peer(1), Tick::new(20));
        snapshot.add_peer(peer(4), Tick::new(30));
        assert_eq!(snapshot.reported_value(ALL_PEERS_JOINED), Ok(20));
        assert_eq!(snapshot.ticks_since_all_joined(Tick::new(25)), Ok(5));
    }

    #[test]
    fn leader_handoff_milestones() {
        let mut snapshot = joined(&[5, 4, 3, 2, 1]);
        let joined_at = 40;

        snapshot.observe(&become_leader(1, joined_at + 300)).unwrap();
        snapshot.report(Tick::new(joined_at + 300)).unwrap();
        assert_eq!(snapshot.reported_value(FIRST_LEADER), Ok(300));

        snapshot.remove_peer(peer(1), Tick::new(joined_at + 1000)).unwrap();
        assert_eq!(snapshot.reported_value(ORIGINAL_LEADER_DEAD), Ok(1000));
        snapshot.report(Tick::new(joined_at + 1000)).unwrap();

        snapshot.observe(&start_election(2, joined_at + 1800)).unwrap();
        assert_eq!(snapshot.reported_value(DEAD_LEADER_CONFIRMED), Ok(800));
        snapshot.observe(&start_election(2, joined_at + 2500)).unwrap();
        assert_eq!(snapshot.reported_value(DEAD_LEADER_CONFIRMED), Ok(800));

        snapshot.observe(&become_leader(2, joined_at + 2100)).unwrap();
        snapshot.report(Tick::new(joined_at + 2100)).unwrap();
        assert_eq!(snapshot.reported_value(SECOND_LEADER), Ok(300));
    }

    #[test]
    fn wrong_first_leader_is_an_error() {
        let mut snapshot = joined(&[1, 2, 3]);
        snapshot.observe(&become_leader(2, 100)).unwrap();
        assert_eq!(
            snapshot.report(Tick::new(100)),
            Err(SnapshotError::UnexpectedLeader {
                milestone: FIRST_LEADER,
                expected: PeerId::new(1),
                actual: PeerId::new(2),
            })
        );
    }

    #[test]
    fn index_distribution_completes_the_run() {
        let mut snapshot = joined(&[1, 2, 3, 4]);
        assert_eq!(snapshot.index_dist_percentage(), Ok(100));

        snapshot.observe(&append(1, 1, 100)).unwrap();
        assert_eq!(snapshot.index_dist_percentage(), Ok(25));
        snapshot.report(Tick::new(100)).unwrap();
        assert!(!snapshot.is_complete());

        snapshot.observe(&receive(2, 1, 150)).unwrap();
        snapshot.observe(&receive(3, 1, 160)).unwrap();
        assert_eq!(snapshot.index_dist_percentage(), Ok(75));
        snapshot.observe(&receive(4, 1, 170)).unwrap();
        snapshot.report(Tick::new(200)).unwrap();

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.reported_value(INDEX_PROPAGATION_START), Ok(70));
        assert_eq!(snapshot.reported_value(INDEX_PROPAGATION_COMPLETE), Ok(170));
    }

    #[test]
    fn peer_ahead_of_leader_is_an_error() {
        let mut snapshot = joined(&[1, 2]);
        snapshot.observe(&receive(2, 3, 10)).unwrap();
        assert!(matches!(
            snapshot.index_dist_percentage(),
            Err(SnapshotError::IndexAheadOfLeader { .. })
        ));
    }
}
