/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between peers as part of the index exchange.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{index_store::IndexEntry, types::data_types::SequenceNumber};

#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum IndexExchangeMessage {
    IndexExchangeRequest(IndexExchangeRequest),
    IndexExchangeResponse(IndexExchangeResponse),
}

impl IndexExchangeMessage {
    pub fn index_exchange_request(max: SequenceNumber) -> IndexExchangeMessage {
        IndexExchangeMessage::IndexExchangeRequest(IndexExchangeRequest { max })
    }

    pub fn index_exchange_response(entries: Vec<IndexEntry>) -> IndexExchangeMessage {
        IndexExchangeMessage::IndexExchangeResponse(IndexExchangeResponse { entries })
    }
}

/// Asks a partner for every entry above `max`, the requester's highest sequence number.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexExchangeRequest {
    pub max: SequenceNumber,
}

/// The entries that the requester of an [`IndexExchangeRequest`] was missing, in ascending sequence
/// order.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexExchangeResponse {
    pub entries: Vec<IndexEntry>,
}
