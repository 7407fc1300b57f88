/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that the protocols of a peer emit.
//!
//! An event for a given action indicates that the action has been completed. Events are published on
//! a channel shared by every peer of a [simulation](crate::simulation). The simulation drains the
//! channel after every step and passes each event to the [snapshot](crate::snapshot), which derives
//! the benchmark milestones from them, and then to the registered
//! [event handlers](crate::event_bus), which includes the default [loggers](crate::logging) if
//! logging is enabled.
//!
//! Every event carries the [`Tick`] at which it happened and the [`PeerAddress`] of the peer it
//! happened at.

use std::sync::mpsc::Sender;

use crate::{
    index_store::IndexEntry,
    types::{
        data_types::{RequestId, SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

/// Enumerates all events defined for a peer.
#[derive(Clone, Debug)]
pub enum Event {
    // Events that change the gradient view.
    UpdateGradientView(UpdateGradientViewEvent),
    EvictPeer(EvictPeerEvent),

    // Events of the leader election protocol.
    StartElection(StartElectionEvent),
    BecomeLeader(BecomeLeaderEvent),
    Demote(DemoteEvent),
    UpdateLeader(UpdateLeaderEvent),
    HeartbeatTimeout(HeartbeatTimeoutEvent),

    // Events of the index add protocol.
    InitiateIndexAdd(InitiateIndexAddEvent),
    RouteIndexAdd(RouteIndexAddEvent),
    AppendAtLeader(AppendAtLeaderEvent),
    SendLeaderResponse(SendLeaderResponseEvent),
    CompleteIndexAdd(CompleteIndexAddEvent),
    IndexAddTimeout(IndexAddTimeoutEvent),

    // Events of the index exchange protocol.
    SendIndexExchangeRequest(SendIndexExchangeRequestEvent),
    SendIndexExchangeResponse(SendIndexExchangeResponseEvent),
    ReceiveIndexEntries(ReceiveIndexEntriesEvent),
}

impl Event {
    /// Publish this event on `event_publisher`, if there is one.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // A dropped receiver means that nobody is observing the run anymore.
            let _ = event_publisher.send(self);
        }
    }

    /// Get the tick at which the event happened.
    pub fn tick(&self) -> Tick {
        match self {
            Event::UpdateGradientView(event) => event.tick,
            Event::EvictPeer(event) => event.tick,
            Event::StartElection(event) => event.tick,
            Event::BecomeLeader(event) => event.tick,
            Event::Demote(event) => event.tick,
            Event::UpdateLeader(event) => event.tick,
            Event::HeartbeatTimeout(event) => event.tick,
            Event::InitiateIndexAdd(event) => event.tick,
            Event::RouteIndexAdd(event) => event.tick,
            Event::AppendAtLeader(event) => event.tick,
            Event::SendLeaderResponse(event) => event.tick,
            Event::CompleteIndexAdd(event) => event.tick,
            Event::IndexAddTimeout(event) => event.tick,
            Event::SendIndexExchangeRequest(event) => event.tick,
            Event::SendIndexExchangeResponse(event) => event.tick,
            Event::ReceiveIndexEntries(event) => event.tick,
        }
    }
}

/// A peer published its gradient view to its local consumers. Emitted every gradient round, including
/// rounds in which the view did not change.
#[derive(Clone, Debug)]
pub struct UpdateGradientViewEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub partners: Vec<PeerAddress>,
    pub saturated: bool,
}

/// A peer removed `evicted` from its gradient view.
#[derive(Clone, Debug)]
pub struct EvictPeerEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub evicted: PeerAddress,
    pub cause: EvictionCause,
}

/// Why a peer was evicted from a gradient view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionCause {
    /// A gradient exchange request to the peer was not answered in time.
    ExchangeTimeout,

    /// A heartbeat to the peer was not answered in time.
    HeartbeatTimeout,

    /// An index add request routed through the peer was not acknowledged in time.
    IndexAddTimeout,
}

/// A peer started a leader election, asking `participants` gradient partners for their vote.
#[derive(Clone, Debug)]
pub struct StartElectionEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub participants: usize,
}

/// A peer won an election with `votes` yes-votes.
#[derive(Clone, Debug)]
pub struct BecomeLeaderEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub votes: usize,
    pub next_sequence: SequenceNumber,
}

/// A peer that believed itself to be the leader stopped believing so.
#[derive(Clone, Debug)]
pub struct DemoteEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub cause: DemotionCause,
}

/// Why a leader demoted itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemotionCause {
    /// The leader found a lower, alive peer in its own gradient view.
    NotLowest,

    /// Another peer told the leader that it is not the lowest peer.
    Challenged,
}

/// A peer changed its belief about who the leader is. `leader` is `None` if the leader was found to be
/// dead.
#[derive(Clone, Debug)]
pub struct UpdateLeaderEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub leader: Option<PeerAddress>,
}

/// A heartbeat that a peer sent to `elector` was not answered in time.
#[derive(Clone, Debug)]
pub struct HeartbeatTimeoutEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub elector: PeerAddress,
    pub was_leader: bool,
}

/// A client asked a peer to add an entry to the index.
#[derive(Clone, Debug)]
pub struct InitiateIndexAddEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub request_id: RequestId,
    pub key: String,
}

/// A peer routed an index add request towards the leader on behalf of `source`. `next_hop` is `None`
/// if no peer closer to the leader was known and the request was parked.
#[derive(Clone, Debug)]
pub struct RouteIndexAddEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub request_id: RequestId,
    pub source: PeerAddress,
    pub next_hop: Option<PeerAddress>,
}

/// The leader assigned a sequence number to a new entry and appended it to its index.
#[derive(Clone, Debug)]
pub struct AppendAtLeaderEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub entry: IndexEntry,
}

/// The leader acknowledged an index add request to the peer that originated it.
#[derive(Clone, Debug)]
pub struct SendLeaderResponseEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub request_id: RequestId,
    pub destination: PeerAddress,
}

/// The peer that originated an index add request learnt that the entry was appended.
#[derive(Clone, Debug)]
pub struct CompleteIndexAddEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub request_id: RequestId,
    pub sequence: SequenceNumber,
}

/// An index add request was not acknowledged in time. If `retry` is set, the peer originated the
/// request and has re-issued it.
#[derive(Clone, Debug)]
pub struct IndexAddTimeoutEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub request_id: RequestId,
    pub destination: Option<PeerAddress>,
    pub retry: bool,
}

/// A peer asked `partner` for the entries above `max`.
#[derive(Clone, Debug)]
pub struct SendIndexExchangeRequestEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub partner: PeerAddress,
    pub max: SequenceNumber,
}

/// A peer sent `entries` entries that `requester` was missing.
#[derive(Clone, Debug)]
pub struct SendIndexExchangeResponseEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub requester: PeerAddress,
    pub entries: usize,
}

/// A peer appended `appended` new entries received from `origin`. `max` is its max sequence number
/// after the append.
#[derive(Clone, Debug)]
pub struct ReceiveIndexEntriesEvent {
    pub tick: Tick,
    pub peer: PeerAddress,
    pub origin: PeerAddress,
    pub appended: usize,
    pub max: SequenceNumber,
}
