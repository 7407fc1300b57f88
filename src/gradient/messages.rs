/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between peers as part of the gradient exchange.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{data_types::RequestId, peer_address::PeerAddress};

#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum GradientMessage {
    ExchangeRequest(ExchangeRequest),
    ExchangeResponse(ExchangeResponse),
}

impl GradientMessage {
    pub fn exchange_request(request_id: RequestId, buffer: Vec<PeerAddress>) -> GradientMessage {
        GradientMessage::ExchangeRequest(ExchangeRequest { request_id, buffer })
    }

    pub fn exchange_response(request_id: RequestId, buffer: Vec<PeerAddress>) -> GradientMessage {
        GradientMessage::ExchangeResponse(ExchangeResponse { request_id, buffer })
    }
}

/// Offer of partners from the initiator of an exchange.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub struct ExchangeRequest {
    pub request_id: RequestId,
    pub buffer: Vec<PeerAddress>,
}

/// Offer of partners sent back by the receiver of an [`ExchangeRequest`].
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub struct ExchangeResponse {
    pub request_id: RequestId,
    pub buffer: Vec<PeerAddress>,
}

/// Fires if the [`ExchangeRequest`] identified by `request_id` was not answered in time.
#[derive(Clone, Debug)]
pub struct ExchangeTimeout {
    pub request_id: RequestId,
    pub partner: PeerAddress,
}
