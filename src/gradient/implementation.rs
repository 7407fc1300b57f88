/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the gradient protocol.
//!
//! Main type: [`Gradient`].

use std::{
    collections::{BTreeSet, HashMap},
    sync::mpsc::Sender,
};

use rand::Rng;

use crate::{
    events::{Event, EvictPeerEvent, EvictionCause, UpdateGradientViewEvent},
    networking::{network::Network, sending::SenderHandle},
    timer::{Timer, TimerHandle},
    types::{
        data_types::{RequestId, Tick},
        peer_address::PeerAddress,
    },
};

use super::{
    messages::{ExchangeRequest, ExchangeResponse, ExchangeTimeout, GradientMessage},
    ranking::{select_peer, select_view},
};

/// The gradient view as published to the local consumers every round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartnerView {
    /// The partners, best ranked first.
    pub partners: Vec<PeerAddress>,

    /// Whether the view cannot currently grow any further: it is either at capacity, or it already holds
    /// every peer that the membership layer has shown this peer.
    pub saturated: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct GradientConfiguration {
    pub(crate) view_size: usize,
    pub(crate) exchange_timeout: u64,
}

/// A single participant in the gradient protocol.
///
/// After creating an instance using [`new`](Self::new), the owning peer calls:
/// 1. [`on_sample`](Self::on_sample) whenever the membership layer delivers a sample,
/// 2. [`tick`](Self::tick) every gradient round, to get the [`PartnerView`] to hand to the other
///    protocols,
/// 3. [`on_receive_msg`](Self::on_receive_msg) and [`on_timeout`](Self::on_timeout) for inbound
///    exchanges and their timeouts, and
/// 4. [`kill_node`](Self::kill_node) when another protocol found a peer dead.
pub(crate) struct Gradient<N: Network, T: Timer> {
    config: GradientConfiguration,
    me: PeerAddress,
    view: Vec<PeerAddress>,
    last_sample: Vec<PeerAddress>,
    known_peers: BTreeSet<PeerAddress>,
    outstanding_exchanges: HashMap<RequestId, PeerAddress>,
    sender: SenderHandle<N>,
    timer: TimerHandle<T>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network, T: Timer> Gradient<N, T> {
    pub(crate) fn new(
        config: GradientConfiguration,
        me: PeerAddress,
        network: N,
        timer: T,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            me,
            view: Vec::new(),
            last_sample: Vec::new(),
            known_peers: BTreeSet::new(),
            outstanding_exchanges: HashMap::new(),
            sender: SenderHandle::new(network),
            timer: TimerHandle::new(timer),
            event_publisher,
        }
    }

    /// The current view, best ranked first.
    pub(crate) fn view(&self) -> &[PeerAddress] {
        &self.view
    }

    /// Start an exchange with a partner, or seed an empty view, using a fresh membership `sample`.
    pub(crate) fn on_sample<R: Rng + ?Sized>(&mut self, sample: &[PeerAddress], rng: &mut R) {
        let me = self.me;
        self.known_peers
            .extend(sample.iter().filter(|peer| **peer != me).copied());
        self.last_sample = sample.to_vec();

        // 1. If the view is empty, seed it directly from the sample.
        if self.view.is_empty() {
            let mut seeded = Vec::new();
            add_unique_omitting(sample, &mut seeded, &[me]);
            seeded.truncate(self.config.view_size);
            self.view = select_view(me.id(), &seeded, self.config.view_size);
            return;
        }

        // 2. Otherwise, offer the view, ourselves and the sample to a partner picked from the better half
        //    of the view.
        let Some(partner) = select_peer(me.id(), &self.view, rng) else {
            return;
        };
        let mut buffer: Vec<PeerAddress> = self
            .view
            .iter()
            .filter(|peer| **peer != partner)
            .copied()
            .collect();
        buffer.push(me);
        add_unique_omitting(sample, &mut buffer, &[partner]);

        let request_id = RequestId::random(rng);
        self.outstanding_exchanges.insert(request_id, partner);
        self.timer.schedule(
            self.config.exchange_timeout,
            ExchangeTimeout {
                request_id,
                partner,
            },
        );
        self.sender
            .send(partner, GradientMessage::exchange_request(request_id, buffer));
    }

    /// Publish the current view. Called once every gradient round.
    pub(crate) fn tick(&mut self, now: Tick) -> PartnerView {
        debug_assert!(
            self.view.len() <= self.config.view_size,
            "gradient view of {} holds {} partners",
            self.me,
            self.view.len()
        );
        self.view.truncate(self.config.view_size);

        let partner_view = PartnerView {
            partners: self.view.clone(),
            saturated: self.is_saturated(),
        };

        Event::UpdateGradientView(UpdateGradientViewEvent {
            tick: now,
            peer: self.me,
            partners: partner_view.partners.clone(),
            saturated: partner_view.saturated,
        })
        .publish(&self.event_publisher);

        partner_view
    }

    /// Execute the required steps of the exchange upon receiving a `GradientMessage` from `origin`.
    pub(crate) fn on_receive_msg(&mut self, msg: GradientMessage, origin: PeerAddress) {
        match msg {
            GradientMessage::ExchangeRequest(request) => {
                self.on_receive_exchange_request(request, origin)
            }
            GradientMessage::ExchangeResponse(response) => {
                self.on_receive_exchange_response(response)
            }
        }
    }

    /// Evict the partner of a timed out exchange, unless the exchange already completed.
    pub(crate) fn on_timeout(&mut self, timeout: ExchangeTimeout, now: Tick) {
        if self
            .outstanding_exchanges
            .remove(&timeout.request_id)
            .is_some()
        {
            self.evict(timeout.partner, EvictionCause::ExchangeTimeout, now);
        }
    }

    /// Remove `peer` from the view unconditionally.
    pub(crate) fn kill_node(&mut self, peer: PeerAddress, cause: EvictionCause, now: Tick) {
        self.evict(peer, cause, now)
    }

    fn on_receive_exchange_request(&mut self, request: ExchangeRequest, origin: PeerAddress) {
        let me = self.me;

        // 1. Reply with our view, ourselves, and our last sample, all without the requester.
        let mut buffer: Vec<PeerAddress> = self
            .view
            .iter()
            .filter(|peer| **peer != origin)
            .copied()
            .collect();
        buffer.push(me);
        let last_sample = self.last_sample.clone();
        add_unique_omitting(&last_sample, &mut buffer, &[origin]);
        self.sender.send(
            origin,
            GradientMessage::exchange_response(request.request_id, buffer),
        );

        // 2. Merge the requester's offer into our view.
        self.merge(&request.buffer);
    }

    fn on_receive_exchange_response(&mut self, response: ExchangeResponse) {
        self.outstanding_exchanges.remove(&response.request_id);
        self.merge(&response.buffer);
    }

    // Compute the merged view into a fresh collection, then replace the old view with it.
    fn merge(&mut self, offered: &[PeerAddress]) {
        let mut candidates = self.view.clone();
        add_unique_omitting(offered, &mut candidates, &[self.me]);
        self.view = select_view(self.me.id(), &candidates, self.config.view_size);
    }

    fn evict(&mut self, peer: PeerAddress, cause: EvictionCause, now: Tick) {
        self.known_peers.remove(&peer);
        let before = self.view.len();
        self.view.retain(|partner| *partner != peer);
        if self.view.len() != before {
            Event::EvictPeer(EvictPeerEvent {
                tick: now,
                peer: self.me,
                evicted: peer,
                cause,
            })
            .publish(&self.event_publisher);
        }
    }

    fn is_saturated(&self) -> bool {
        !self.view.is_empty()
            && self.view.len() >= self.config.view_size.min(self.known_peers.len())
    }
}

/// Append each peer of `add` that is not yet in `buffer` and is not one of `omitting`.
fn add_unique_omitting(add: &[PeerAddress], buffer: &mut Vec<PeerAddress>, omitting: &[PeerAddress]) {
    for peer in add {
        if !buffer.contains(peer) && !omitting.contains(peer) {
            buffer.push(*peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        networking::{
            messages::Message,
            stub::{peer, peers, NetworkStub},
        },
        timer::Timeout,
    };

    fn gradient(id: u64, stub: &NetworkStub) -> Gradient<NetworkStub, NetworkStub> {
        let config = GradientConfiguration {
            view_size: 6,
            exchange_timeout: 1000,
        };
        Gradient::new(config, peer(id), stub.clone(), stub.clone(), None)
    }

    fn ids(view: &[PeerAddress]) -> Vec<u64> {
        view.iter().map(|peer| peer.id().int()).collect()
    }

    #[test]
    fn empty_view_is_seeded_from_the_sample() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(1);

        gradient.on_sample(&peers(&[9, 5, 1, 7, 4, 10, 2, 6, 3]), &mut rng);

        // Self is excluded, and at most six sample entries are taken before ranking.
        assert_eq!(ids(gradient.view()), vec![4, 2, 1, 7, 9, 10]);
        assert!(stub.take_sent().is_empty());
    }

    #[test]
    fn exchange_request_offers_view_self_and_sample_without_the_partner() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(2);
        gradient.on_sample(&peers(&[4]), &mut rng);

        gradient.on_sample(&peers(&[4, 8, 5]), &mut rng);

        let sent = stub.take_sent();
        assert_eq!(sent.len(), 1);
        let (destination, message) = &sent[0];
        assert_eq!(destination.id().int(), 4);
        match message {
            Message::GradientMessage(GradientMessage::ExchangeRequest(request)) => {
                assert_eq!(ids(&request.buffer), vec![5, 8]);
            }
            other => panic!("unexpected message {:?}", other),
        }

        let scheduled = stub.take_scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, 1000);
    }

    #[test]
    fn exchange_request_is_answered_and_merged() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(3);
        gradient.on_sample(&peers(&[6, 8]), &mut rng);
        gradient.last_sample = peers(&[3, 2]);

        let request = GradientMessage::exchange_request(
            RequestId::random(&mut rng),
            peers(&[5, 4, 9]),
        );
        gradient.on_receive_msg(request, peer(2));

        let sent = stub.take_sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            Message::GradientMessage(GradientMessage::ExchangeResponse(response)) => {
                // The requester is never offered back to itself.
                assert_eq!(ids(&response.buffer), vec![6, 8, 5, 3]);
            }
            other => panic!("unexpected message {:?}", other),
        }
        // Self is dropped from the received offer.
        assert_eq!(ids(gradient.view()), vec![4, 6, 8, 9]);
    }

    #[test]
    fn view_never_exceeds_capacity() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(50, &stub);
        let mut rng = StdRng::seed_from_u64(4);
        gradient.on_sample(&peers(&[60]), &mut rng);

        let response = GradientMessage::exchange_response(
            RequestId::random(&mut rng),
            peers(&[1, 10, 20, 30, 40, 49, 51, 70, 80]),
        );
        gradient.on_receive_msg(response, peer(60));

        assert_eq!(ids(gradient.view()), vec![49, 40, 30, 20, 10, 1]);
        assert!(gradient.tick(Tick::new(1)).saturated);
    }

    #[test]
    fn unanswered_exchange_evicts_the_partner() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(5);
        gradient.on_sample(&peers(&[4]), &mut rng);
        gradient.on_sample(&peers(&[4]), &mut rng);

        let timeout = match stub.take_scheduled().pop() {
            Some((_, Timeout::ExchangeTimeout(timeout))) => timeout,
            other => panic!("unexpected timeout {:?}", other),
        };
        gradient.on_timeout(timeout.clone(), Tick::new(1000));
        assert!(gradient.view().is_empty());

        // A second delivery of the same timeout is a no-op.
        gradient.on_sample(&peers(&[4]), &mut rng);
        gradient.on_timeout(timeout, Tick::new(2000));
        assert_eq!(ids(gradient.view()), vec![4]);
    }

    #[test]
    fn answered_exchange_cancels_the_timeout() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(6);
        gradient.on_sample(&peers(&[4]), &mut rng);
        gradient.on_sample(&peers(&[4]), &mut rng);

        let timeout = match stub.take_scheduled().pop() {
            Some((_, Timeout::ExchangeTimeout(timeout))) => timeout,
            other => panic!("unexpected timeout {:?}", other),
        };
        gradient.on_receive_msg(
            GradientMessage::exchange_response(timeout.request_id, peers(&[3])),
            peer(4),
        );
        gradient.on_timeout(timeout, Tick::new(1000));

        assert_eq!(ids(gradient.view()), vec![4, 3]);
    }

    #[test]
    fn kill_node_removes_the_peer_and_unsaturates_the_view() {
        let stub = NetworkStub::new();
        let mut gradient = gradient(5, &stub);
        let mut rng = StdRng::seed_from_u64(7);
        gradient.on_sample(&peers(&[1, 2, 3, 4]), &mut rng);
        assert!(gradient.tick(Tick::new(1)).saturated);

        gradient.kill_node(peer(1), EvictionCause::HeartbeatTimeout, Tick::new(2));

        let partner_view = gradient.tick(Tick::new(3));
        assert_eq!(ids(&partner_view.partners), vec![4, 3, 2]);
        // The dead peer is forgotten, so the smaller view is still saturated.
        assert!(partner_view.saturated);
    }
}
