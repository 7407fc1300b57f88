/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the leader election protocol.

use std::{collections::HashMap, sync::mpsc::Sender};

use rand::Rng;

use crate::{
    events::{
        BecomeLeaderEvent, DemoteEvent, DemotionCause, Event, HeartbeatTimeoutEvent,
        StartElectionEvent, UpdateLeaderEvent,
    },
    gradient::PartnerView,
    index_store::SequenceAllocator,
    networking::{network::Network, sending::SenderHandle},
    timer::{Timer, TimerHandle},
    types::{
        data_types::{RequestId, SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

use super::messages::{HeartbeatTimeout, LeaderElectionMessage};

#[derive(Clone, Copy, Debug)]
pub(crate) struct LeaderElectionConfiguration {
    pub(crate) heartbeat_timeout: u64,
    pub(crate) stable_rounds_before_election: u64,
}

pub(crate) struct LeaderElection<N: Network, T: Timer> {
    config: LeaderElectionConfiguration,
    me: PeerAddress,
    state: LeaderElectionState,
    sender: SenderHandle<N>,
    timer: TimerHandle<T>,
    event_publisher: Option<Sender<Event>>,
}

#[derive(Default)]
struct LeaderElectionState {
    is_leader: bool,
    is_running_election: bool,
    election_yes_votes: usize,
    election_participants: usize,
    election_rounds: u64,
    leader: Option<PeerAddress>,
    partners: Vec<PeerAddress>,
    partners_last_round: Vec<PeerAddress>,
    same_neighbors_round_count: u64,
    outstanding_heartbeats: HashMap<RequestId, PeerAddress>,
    alive_electors: HashMap<PeerAddress, bool>,
}

impl<N: Network, T: Timer> LeaderElection<N, T> {
    pub(crate) fn new(
        config: LeaderElectionConfiguration,
        me: PeerAddress,
        network: N,
        timer: T,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            me,
            state: LeaderElectionState::default(),
            sender: SenderHandle::new(network),
            timer: TimerHandle::new(timer),
            event_publisher,
        }
    }

    pub(crate) fn is_leader(&self) -> bool {
        self.state.is_leader
    }

    /// The peer this peer currently believes to be the leader. This is the peer itself if it is the
    /// leader.
    pub(crate) fn leader(&self) -> Option<PeerAddress> {
        if self.state.is_leader {
            Some(self.me)
        } else {
            self.state.leader
        }
    }

    pub(crate) fn is_running_election(&self) -> bool {
        self.state.is_running_election
    }

    /// Run one leader election round on the partners published by the gradient.
    pub(crate) fn on_partner_view<R: Rng + ?Sized>(
        &mut self,
        partner_view: &PartnerView,
        now: Tick,
        rng: &mut R,
    ) {
        // 1. Adopt the new partners.
        self.state.partners = partner_view.partners.clone();

        // 2. Demote, challenge, or start an election, depending on the view.
        self.check_for_leadership(partner_view.saturated, now);

        // 3. Probe the electors for liveness.
        self.heartbeat_electors(rng);

        // 4. Assume newly seen partners alive until a probe says otherwise.
        for partner in &self.state.partners {
            self.state.alive_electors.entry(*partner).or_insert(true);
        }

        // 5. Remember the partners to detect a stable view in the next round.
        self.state.partners_last_round = self.state.partners.clone();
    }

    pub(crate) fn on_receive_msg(
        &mut self,
        msg: LeaderElectionMessage,
        origin: PeerAddress,
        now: Tick,
        local_max: SequenceNumber,
        next_id: &mut SequenceAllocator,
    ) {
        match msg {
            LeaderElectionMessage::AmILegend => {
                let reply = if self.is_lowest_peer(origin) {
                    LeaderElectionMessage::YouAreLegend {
                        next_sequence: local_max,
                    }
                } else {
                    LeaderElectionMessage::YouAreLoser
                };
                self.sender.send(origin, reply);
            }
            LeaderElectionMessage::YouAreLegend { next_sequence } => {
                if !self.state.is_running_election {
                    return;
                }
                self.state.election_yes_votes += 1;
                next_id.adopt(next_sequence);
                if self.state.election_yes_votes > self.state.election_participants / 2 {
                    self.announce_leadership(now, local_max, next_id);
                }
            }
            LeaderElectionMessage::IAmLegend => {
                self.state.leader = Some(origin);
                Event::UpdateLeader(UpdateLeaderEvent {
                    tick: now,
                    peer: self.me,
                    leader: Some(origin),
                })
                .publish(&self.event_publisher);
            }
            LeaderElectionMessage::YouAreLoser => {
                if self.state.is_leader {
                    self.demote(DemotionCause::Challenged, now);
                }
                self.state.is_running_election = false;
            }
            LeaderElectionMessage::AreYouAlive { request_id } => {
                self.sender
                    .send(origin, LeaderElectionMessage::IAmAlive { request_id });
            }
            LeaderElectionMessage::IAmAlive { request_id } => {
                if let Some(elector) = self.state.outstanding_heartbeats.remove(&request_id) {
                    self.state.alive_electors.insert(elector, true);
                }
            }
        }
    }

    /// Handle an unanswered heartbeat. Returns the elector if it is now considered dead, so that the
    /// caller can remove it from the gradient view.
    pub(crate) fn on_timeout(&mut self, timeout: HeartbeatTimeout, now: Tick) -> Option<PeerAddress> {
        let elector = self
            .state
            .outstanding_heartbeats
            .remove(&timeout.request_id)?;
        let was_leader = self.state.leader == Some(elector);

        if was_leader {
            self.state.leader = None;
            Event::UpdateLeader(UpdateLeaderEvent {
                tick: now,
                peer: self.me,
                leader: None,
            })
            .publish(&self.event_publisher);
            self.initiate_election(now);
        }

        self.state.alive_electors.insert(elector, false);
        Event::HeartbeatTimeout(HeartbeatTimeoutEvent {
            tick: now,
            peer: self.me,
            elector,
            was_leader,
        })
        .publish(&self.event_publisher);

        Some(elector)
    }

    fn check_for_leadership(&mut self, saturated: bool, now: Tick) {
        if self.state.is_running_election {
            self.state.election_rounds += 1;
            if self.state.election_rounds > self.config.stable_rounds_before_election {
                log::debug!("{} abandons an election without a majority", self.me);
                self.state.is_running_election = false;
            }
            return;
        }

        if self.state.is_leader && !self.is_lowest_peer(self.me) {
            self.demote(DemotionCause::NotLowest, now);
        }

        if !self.state.is_leader {
            if let Some(leader) = self.state.leader {
                if !self.is_lowest_peer(leader) {
                    self.sender.send(leader, LeaderElectionMessage::YouAreLoser);
                }
            }
        }

        if self.state.partners == self.state.partners_last_round {
            self.state.same_neighbors_round_count += 1;
        } else {
            self.state.same_neighbors_round_count = 0;
        }

        if saturated
            && self.state.same_neighbors_round_count >= self.config.stable_rounds_before_election
            && self.is_lowest_peer(self.me)
        {
            self.initiate_election(now);
        }
    }

    fn heartbeat_electors<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.state.is_leader {
            return;
        }
        let Some(leader) = self.state.leader else {
            return;
        };

        let mut electors = self.state.partners.clone();
        if !electors.contains(&leader) {
            electors.push(leader);
        }

        for elector in electors {
            if self
                .state
                .outstanding_heartbeats
                .values()
                .any(|probed| *probed == elector)
            {
                continue;
            }
            let request_id = RequestId::random(rng);
            self.state.outstanding_heartbeats.insert(request_id, elector);
            self.sender
                .send(elector, LeaderElectionMessage::AreYouAlive { request_id });
            self.timer.schedule(
                self.config.heartbeat_timeout,
                HeartbeatTimeout {
                    request_id,
                    elector,
                },
            );
        }
    }

    /// `peer` is the lowest peer as far as this peer can tell: neither this peer nor any of its
    /// partners that are believed alive has a lower id.
    fn is_lowest_peer(&self, peer: PeerAddress) -> bool {
        if self.me < peer {
            return false;
        }
        !self.state.partners.iter().any(|partner| {
            *partner < peer && self.state.alive_electors.get(partner).copied().unwrap_or(true)
        })
    }

    fn initiate_election(&mut self, now: Tick) {
        if self.state.is_leader || self.state.is_running_election || self.state.partners.is_empty() {
            return;
        }

        self.state.is_running_election = true;
        self.state.election_yes_votes = 0;
        self.state.election_rounds = 0;
        self.state.election_participants = self.state.partners.len();
        self.sender
            .send_all(&self.state.partners, LeaderElectionMessage::AmILegend);

        Event::StartElection(StartElectionEvent {
            tick: now,
            peer: self.me,
            participants: self.state.election_participants,
        })
        .publish(&self.event_publisher);
    }

    fn announce_leadership(
        &mut self,
        now: Tick,
        local_max: SequenceNumber,
        next_id: &mut SequenceAllocator,
    ) {
        self.state.is_leader = true;
        self.state.is_running_election = false;
        self.state.leader = None;
        next_id.adopt(local_max);
        self.sender
            .send_all(&self.state.partners, LeaderElectionMessage::IAmLegend);

        Event::BecomeLeader(BecomeLeaderEvent {
            tick: now,
            peer: self.me,
            votes: self.state.election_yes_votes,
            next_sequence: next_id.current(),
        })
        .publish(&self.event_publisher);
    }

    fn demote(&mut self, cause: DemotionCause, now: Tick) {
        self.state.is_leader = false;
        Event::Demote(DemoteEvent {
            tick: now,
            peer: self.me,
            cause,
        })
        .publish(&self.event_publisher);
    }
}
