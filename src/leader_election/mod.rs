/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for electing the peer with the lowest id as the leader, and for replacing it when it
//! fails.
//!
//! # Stability and elections
//!
//! Every gradient round, the peer receives its [`PartnerView`](crate::gradient::PartnerView). The
//! peer counts how many consecutive rounds the partners stayed the same. Once the view is saturated,
//! has been stable for `stable_rounds_before_election` rounds, and no alive partner has a lower id,
//! the peer believes it is the lowest peer in the network and starts an election:
//! 1. It broadcasts [`AmILegend`](messages::LeaderElectionMessage::AmILegend) to its partners.
//! 2. Each partner answers [`YouAreLegend`](messages::LeaderElectionMessage::YouAreLegend) if the
//!    candidate is lower than itself and lower than every alive peer in its own view, and
//!    [`YouAreLoser`](messages::LeaderElectionMessage::YouAreLoser) otherwise. A yes-vote carries the
//!    voter's max index sequence number.
//! 3. On collecting yes-votes from a strict majority of the participants, the candidate becomes the
//!    leader, continues the index sequence after the highest sequence number it has seen, and
//!    broadcasts [`IAmLegend`](messages::LeaderElectionMessage::IAmLegend). A single no-vote aborts the
//!    election.
//!
//! An election that neither wins nor is aborted within `stable_rounds_before_election` rounds is
//! abandoned, so that a later round can start a fresh one.
//!
//! # Demotion
//!
//! A leader that sees a lower, alive partner in its own view, or that receives a `YouAreLoser`,
//! demotes itself. Demotion is passive: other peers are not told.
//!
//! # Heartbeats
//!
//! While a follower knows a leader, it probes every elector (its partners and the leader) with
//! [`AreYouAlive`](messages::LeaderElectionMessage::AreYouAlive) once per round, unless a probe to
//! that elector is still outstanding. A probe that is not answered within `heartbeat_timeout` ticks
//! marks the elector dead, which removes it from the gradient view. If the dead elector is the leader,
//! the follower forgets it and starts an election itself.

pub mod messages;

pub(crate) mod implementation;
