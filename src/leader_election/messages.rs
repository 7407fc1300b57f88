/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between peers as part of leader election.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{RequestId, SequenceNumber},
    peer_address::PeerAddress,
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum LeaderElectionMessage {
    /// A candidate asks a partner for its vote.
    AmILegend,

    /// Yes-vote. Carries the voter's max index sequence number, so that the new leader continues the
    /// index after it.
    YouAreLegend { next_sequence: SequenceNumber },

    /// The winner of an election announces itself to its partners.
    IAmLegend,

    /// No-vote, or a challenge sent to a leader that is known not to be the lowest peer.
    YouAreLoser,

    /// Heartbeat probe.
    AreYouAlive { request_id: RequestId },

    /// Reply to [`AreYouAlive`](Self::AreYouAlive), echoing its `request_id`.
    IAmAlive { request_id: RequestId },
}

/// Fires if the [`AreYouAlive`](LeaderElectionMessage::AreYouAlive) probe identified by
/// `request_id` was not answered in time.
#[derive(Clone, Debug)]
pub struct HeartbeatTimeout {
    pub request_id: RequestId,
    pub elector: PeerAddress,
}
