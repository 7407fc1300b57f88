/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the index exchange protocol.
//!
//! Main type: [`IndexExchange`].

use std::sync::mpsc::Sender;

use rand::{seq::SliceRandom, Rng};

use crate::{
    events::{
        Event, ReceiveIndexEntriesEvent, SendIndexExchangeRequestEvent,
        SendIndexExchangeResponseEvent,
    },
    gradient::PartnerView,
    index_store::IndexStore,
    networking::{network::Network, sending::SenderHandle},
    types::{
        data_types::{SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

use super::messages::{IndexExchangeMessage, IndexExchangeRequest, IndexExchangeResponse};

#[derive(Clone, Copy, Debug)]
pub(crate) struct IndexExchangeConfiguration {
    pub(crate) index_range_upper_bound: SequenceNumber,
}

pub(crate) struct IndexExchange<N: Network> {
    config: IndexExchangeConfiguration,
    me: PeerAddress,
    sender: SenderHandle<N>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network> IndexExchange<N> {
    pub(crate) fn new(
        config: IndexExchangeConfiguration,
        me: PeerAddress,
        network: N,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            me,
            sender: SenderHandle::new(network),
            event_publisher,
        }
    }

    /// Ask a random partner for the entries above the local max.
    pub(crate) fn on_partner_view<R: Rng + ?Sized>(
        &mut self,
        partner_view: &PartnerView,
        now: Tick,
        index: &IndexStore,
        rng: &mut R,
    ) {
        if partner_view.partners.len() < 2 {
            return;
        }
        let Some(partner) = partner_view.partners.choose(rng).copied() else {
            return;
        };

        let max = index.max_sequence();
        self.sender
            .send(partner, IndexExchangeMessage::index_exchange_request(max));
        Event::SendIndexExchangeRequest(SendIndexExchangeRequestEvent {
            tick: now,
            peer: self.me,
            partner,
            max,
        })
        .publish(&self.event_publisher);
    }

    pub(crate) fn on_receive_msg(
        &mut self,
        msg: IndexExchangeMessage,
        origin: PeerAddress,
        now: Tick,
        index: &mut IndexStore,
    ) {
        match msg {
            IndexExchangeMessage::IndexExchangeRequest(request) => {
                self.on_receive_index_exchange_request(request, origin, now, index)
            }
            IndexExchangeMessage::IndexExchangeResponse(response) => {
                self.on_receive_index_exchange_response(response, origin, now, index)
            }
        }
    }

    fn on_receive_index_exchange_request(
        &mut self,
        request: IndexExchangeRequest,
        origin: PeerAddress,
        now: Tick,
        index: &IndexStore,
    ) {
        if request.max >= index.max_sequence() {
            return;
        }

        let entries = index.range_since(request.max, self.config.index_range_upper_bound);
        let count = entries.len();
        self.sender
            .send(origin, IndexExchangeMessage::index_exchange_response(entries));
        Event::SendIndexExchangeResponse(SendIndexExchangeResponseEvent {
            tick: now,
            peer: self.me,
            requester: origin,
            entries: count,
        })
        .publish(&self.event_publisher);
    }

    fn on_receive_index_exchange_response(
        &mut self,
        response: IndexExchangeResponse,
        origin: PeerAddress,
        now: Tick,
        index: &mut IndexStore,
    ) {
        let appended = response
            .entries
            .into_iter()
            .filter(|entry| index.append(entry.clone()))
            .count();

        Event::ReceiveIndexEntries(ReceiveIndexEntriesEvent {
            tick: now,
            peer: self.me,
            origin,
            appended,
            max: index.max_sequence(),
        })
        .publish(&self.event_publisher);
    }
}
