/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumeration of every message variant exchanged between peers.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    gradient::messages::{ExchangeRequest, ExchangeResponse, GradientMessage},
    index_add::messages::{IndexAddMessage, IndexAddRequest, LeaderResponse},
    index_exchange::messages::{IndexExchangeMessage, IndexExchangeRequest, IndexExchangeResponse},
    leader_election::messages::LeaderElectionMessage,
};

/// All message variants used by the protocols of a peer.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// See: [`GradientMessage`].
    GradientMessage(GradientMessage),

    /// See: [`LeaderElectionMessage`].
    LeaderElectionMessage(LeaderElectionMessage),

    /// See: [`IndexAddMessage`].
    IndexAddMessage(IndexAddMessage),

    /// See: [`IndexExchangeMessage`].
    IndexExchangeMessage(IndexExchangeMessage),
}

impl Message {
    /// Get the protocol that the inner message belongs to.
    pub fn protocol(&self) -> Protocol {
        match self {
            Message::GradientMessage(_) => Protocol::Gradient,
            Message::LeaderElectionMessage(_) => Protocol::LeaderElection,
            Message::IndexAddMessage(_) => Protocol::IndexAdd,
            Message::IndexExchangeMessage(_) => Protocol::IndexExchange,
        }
    }
}

/// The four protocols that every peer runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Gradient,
    LeaderElection,
    IndexAdd,
    IndexExchange,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Gradient => "Gradient",
            Protocol::LeaderElection => "LeaderElection",
            Protocol::IndexAdd => "IndexAdd",
            Protocol::IndexExchange => "IndexExchange",
        };
        f.write_str(name)
    }
}

impl From<GradientMessage> for Message {
    fn from(value: GradientMessage) -> Self {
        Message::GradientMessage(value)
    }
}

impl From<ExchangeRequest> for Message {
    fn from(value: ExchangeRequest) -> Self {
        Message::GradientMessage(GradientMessage::ExchangeRequest(value))
    }
}

impl From<ExchangeResponse> for Message {
    fn from(value: ExchangeResponse) -> Self {
        Message::GradientMessage(GradientMessage::ExchangeResponse(value))
    }
}

impl From<LeaderElectionMessage> for Message {
    fn from(value: LeaderElectionMessage) -> Self {
        Message::LeaderElectionMessage(value)
    }
}

impl From<IndexAddMessage> for Message {
    fn from(value: IndexAddMessage) -> Self {
        Message::IndexAddMessage(value)
    }
}

impl From<IndexAddRequest> for Message {
    fn from(value: IndexAddRequest) -> Self {
        Message::IndexAddMessage(IndexAddMessage::IndexAddRequest(value))
    }
}

impl From<LeaderResponse> for Message {
    fn from(value: LeaderResponse) -> Self {
        Message::IndexAddMessage(IndexAddMessage::LeaderResponse(value))
    }
}

impl From<IndexExchangeMessage> for Message {
    fn from(value: IndexExchangeMessage) -> Self {
        Message::IndexExchangeMessage(value)
    }
}

impl From<IndexExchangeRequest> for Message {
    fn from(value: IndexExchangeRequest) -> Self {
        Message::IndexExchangeMessage(IndexExchangeMessage::IndexExchangeRequest(value))
    }
}

impl From<IndexExchangeResponse> for Message {
    fn from(value: IndexExchangeResponse) -> Self {
        Message::IndexExchangeMessage(IndexExchangeMessage::IndexExchangeResponse(value))
    }
}
