/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between peers as part of the index add protocol.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{RequestId, SequenceNumber},
    peer_address::PeerAddress,
};

#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum IndexAddMessage {
    IndexAddRequest(IndexAddRequest),
    LeaderResponse(LeaderResponse),
}

impl IndexAddMessage {
    pub fn index_add_request(
        request_id: RequestId,
        key: String,
        value: String,
        source: PeerAddress,
    ) -> IndexAddMessage {
        IndexAddMessage::IndexAddRequest(IndexAddRequest {
            request_id,
            key,
            value,
            source,
        })
    }

    pub fn leader_response(request_id: RequestId, sequence: SequenceNumber) -> IndexAddMessage {
        IndexAddMessage::LeaderResponse(LeaderResponse {
            request_id,
            sequence,
        })
    }
}

/// An entry travelling up the gradient towards the leader. `source` is the peer that originated the
/// request, which the leader acknowledges directly.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexAddRequest {
    pub request_id: RequestId,
    pub key: String,
    pub value: String,
    pub source: PeerAddress,
}

/// The leader's acknowledgement that the entry of request `request_id` was appended as `sequence`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LeaderResponse {
    pub request_id: RequestId,
    pub sequence: SequenceNumber,
}

/// Fires if the request identified by `request_id` was not acknowledged in time. `retry` is set only
/// at the peer that originated the request.
#[derive(Clone, Debug)]
pub struct IndexAddTimeout {
    pub request_id: RequestId,
    pub retry: bool,
}
