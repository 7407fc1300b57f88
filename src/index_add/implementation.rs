/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the index add protocol.

use std::{collections::HashMap, sync::mpsc::Sender};

use rand::Rng;

use crate::{
    events::{
        AppendAtLeaderEvent, CompleteIndexAddEvent, Event, IndexAddTimeoutEvent,
        InitiateIndexAddEvent, RouteIndexAddEvent, SendLeaderResponseEvent,
    },
    gradient::PartnerView,
    index_store::{IndexEntry, IndexStore, SequenceAllocator},
    networking::{network::Network, sending::SenderHandle},
    timer::{Timer, TimerHandle},
    types::{
        data_types::{RequestId, SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

use super::{
    messages::{IndexAddMessage, IndexAddRequest, IndexAddTimeout, LeaderResponse},
    routing::{next_hop, TopmostPartners},
};

#[derive(Clone, Copy, Debug)]
pub(crate) struct IndexAddConfiguration {
    pub(crate) index_add_timeout: u64,
    pub(crate) topmost_partners_capacity: usize,
}

/// The local index and the sequence allocator, lent to the protocol for the duration of one call.
pub(crate) struct LocalIndex<'a> {
    pub(crate) is_leader: bool,
    pub(crate) index: &'a mut IndexStore,
    pub(crate) next_id: &'a mut SequenceAllocator,
}

/// A request that this peer forwarded or parked, and that has been neither acknowledged nor timed out.
struct OutstandingRequest {
    key: String,
    value: String,
    source: PeerAddress,
    destination: Option<PeerAddress>,
}

pub(crate) struct IndexAdd<N: Network, T: Timer> {
    config: IndexAddConfiguration,
    me: PeerAddress,
    topmost: TopmostPartners,
    view: Vec<PeerAddress>,
    outstanding_requests: HashMap<RequestId, OutstandingRequest>,
    sender: SenderHandle<N>,
    timer: TimerHandle<T>,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network, T: Timer> IndexAdd<N, T> {
    pub(crate) fn new(
        config: IndexAddConfiguration,
        me: PeerAddress,
        network: N,
        timer: T,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            me,
            topmost: TopmostPartners::new(config.topmost_partners_capacity),
            view: Vec::new(),
            outstanding_requests: HashMap::new(),
            sender: SenderHandle::new(network),
            timer: TimerHandle::new(timer),
            event_publisher,
        }
    }

    pub(crate) fn on_sample(&mut self, sample: &[PeerAddress]) {
        self.topmost.insert_sample(self.me, sample)
    }

    pub(crate) fn on_partner_view(&mut self, partner_view: &PartnerView) {
        self.view = partner_view.partners.clone();
    }

    /// Number of requests this peer is still waiting on.
    pub(crate) fn outstanding_requests(&self) -> usize {
        self.outstanding_requests.len()
    }

    /// Add a new entry to the index on behalf of a client: append it directly if this peer is the
    /// leader, and route it towards the leader otherwise.
    pub(crate) fn add_entry<R: Rng + ?Sized>(
        &mut self,
        key: String,
        value: String,
        now: Tick,
        local: LocalIndex,
        rng: &mut R,
    ) -> RequestId {
        let request_id = RequestId::random(rng);
        Event::InitiateIndexAdd(InitiateIndexAddEvent {
            tick: now,
            peer: self.me,
            request_id,
            key: key.clone(),
        })
        .publish(&self.event_publisher);

        if local.is_leader {
            let sequence = self.append_at_leader(key, value, now, local);
            Event::CompleteIndexAdd(CompleteIndexAddEvent {
                tick: now,
                peer: self.me,
                request_id,
                sequence,
            })
            .publish(&self.event_publisher);
        } else {
            self.route(request_id, key, value, self.me, now);
        }

        request_id
    }

    pub(crate) fn on_receive_msg(&mut self, msg: IndexAddMessage, now: Tick, local: LocalIndex) {
        match msg {
            IndexAddMessage::IndexAddRequest(request) => {
                self.on_receive_index_add_request(request, now, local)
            }
            IndexAddMessage::LeaderResponse(response) => {
                self.on_receive_leader_response(response, now)
            }
        }
    }

    /// Handle an unacknowledged request. Returns the next hop it was sent to if that peer should be
    /// considered dead, so that the caller can remove it from the gradient view.
    pub(crate) fn on_timeout<R: Rng + ?Sized>(
        &mut self,
        timeout: IndexAddTimeout,
        now: Tick,
        local: LocalIndex,
        rng: &mut R,
    ) -> Option<PeerAddress> {
        let request = self.outstanding_requests.remove(&timeout.request_id)?;

        Event::IndexAddTimeout(IndexAddTimeoutEvent {
            tick: now,
            peer: self.me,
            request_id: timeout.request_id,
            destination: request.destination,
            retry: timeout.retry,
        })
        .publish(&self.event_publisher);

        if !timeout.retry {
            log::debug!(
                "{} drops request {} relayed for {}",
                self.me,
                timeout.request_id,
                request.source
            );
            return None;
        }

        if let Some(destination) = request.destination {
            self.topmost.remove(&destination);
            self.view.retain(|partner| *partner != destination);
        }
        self.add_entry(request.key, request.value, now, local, rng);

        request.destination
    }

    fn on_receive_index_add_request(&mut self, request: IndexAddRequest, now: Tick, local: LocalIndex) {
        if local.is_leader {
            let sequence = self.append_at_leader(request.key, request.value, now, local);
            self.sender.send(
                request.source,
                IndexAddMessage::leader_response(request.request_id, sequence),
            );
            Event::SendLeaderResponse(SendLeaderResponseEvent {
                tick: now,
                peer: self.me,
                request_id: request.request_id,
                destination: request.source,
            })
            .publish(&self.event_publisher);
        } else {
            self.route(
                request.request_id,
                request.key,
                request.value,
                request.source,
                now,
            );
        }
    }

    fn on_receive_leader_response(&mut self, response: LeaderResponse, now: Tick) {
        if self
            .outstanding_requests
            .remove(&response.request_id)
            .is_some()
        {
            Event::CompleteIndexAdd(CompleteIndexAddEvent {
                tick: now,
                peer: self.me,
                request_id: response.request_id,
                sequence: response.sequence,
            })
            .publish(&self.event_publisher);
        }
    }

    /// Forward a request to the lowest known peer below this one, or park it if there is none. Only the
    /// peer that originated the request retries it on timeout.
    fn route(
        &mut self,
        request_id: RequestId,
        key: String,
        value: String,
        source: PeerAddress,
        now: Tick,
    ) {
        let destination = next_hop(self.me, &self.topmost, &self.view);
        self.timer.schedule(
            self.config.index_add_timeout,
            IndexAddTimeout {
                request_id,
                retry: source == self.me,
            },
        );

        Event::RouteIndexAdd(RouteIndexAddEvent {
            tick: now,
            peer: self.me,
            request_id,
            source,
            next_hop: destination,
        })
        .publish(&self.event_publisher);

        if let Some(destination) = destination {
            self.sender.send(
                destination,
                IndexAddMessage::index_add_request(request_id, key.clone(), value.clone(), source),
            );
        }

        self.outstanding_requests.insert(
            request_id,
            OutstandingRequest {
                key,
                value,
                source,
                destination,
            },
        );
    }

    fn append_at_leader(
        &mut self,
        key: String,
        value: String,
        now: Tick,
        local: LocalIndex,
    ) -> SequenceNumber {
        // Entries pulled in by index exchange may be ahead of the allocator.
        local.next_id.adopt(local.index.max_sequence());
        let sequence = local.next_id.next();
        let entry = IndexEntry::new(sequence, key, value);
        let appended = local.index.append(entry.clone());
        debug_assert!(appended, "sequence number {} was handed out twice", sequence);

        Event::AppendAtLeader(AppendAtLeaderEvent {
            tick: now,
            peer: self.me,
            entry,
        })
        .publish(&self.event_publisher);

        sequence
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        networking::{
            messages::Message,
            stub::{peer, peers, NetworkStub},
        },
        timer::Timeout,
    };

    struct Fixture {
        stub: NetworkStub,
        index_add: IndexAdd<NetworkStub, NetworkStub>,
        events: Receiver<Event>,
        index: IndexStore,
        next_id: SequenceAllocator,
        rng: StdRng,
    }

    impl Fixture {
        fn new(id: u64, view: &[u64]) -> Self {
            let stub = NetworkStub::new();
            let (event_publisher, events) = mpsc::channel();
            let config = IndexAddConfiguration {
                index_add_timeout: 10000,
                topmost_partners_capacity: 10,
            };
            let mut index_add =
                IndexAdd::new(config, peer(id), stub.clone(), stub.clone(), Some(event_publisher));
            index_add.on_partner_view(&PartnerView {
                partners: peers(view),
                saturated: true,
            });
            Self {
                stub,
                index_add,
                events,
                index: IndexStore::new(),
                next_id: SequenceAllocator::new(),
                rng: StdRng::seed_from_u64(id),
            }
        }

        fn add(&mut self, is_leader: bool) -> RequestId {
            let local = LocalIndex {
                is_leader,
                index: &mut self.index,
                next_id: &mut self.next_id,
            };
            self.index_add.add_entry(
                "some key".to_string(),
                "some value".to_string(),
                Tick::new(0),
                local,
                &mut self.rng,
            )
        }

        fn deliver(&mut self, msg: IndexAddMessage, is_leader: bool) {
            let local = LocalIndex {
                is_leader,
                index: &mut self.index,
                next_id: &mut self.next_id,
            };
            self.index_add.on_receive_msg(msg, Tick::new(1), local)
        }

        fn time_out(&mut self, timeout: IndexAddTimeout) -> Option<PeerAddress> {
            let local = LocalIndex {
                is_leader: false,
                index: &mut self.index,
                next_id: &mut self.next_id,
            };
            self.index_add
                .on_timeout(timeout, Tick::new(10000), local, &mut self.rng)
        }

        fn sent_requests(&self) -> Vec<(u64, IndexAddRequest)> {
            self.stub
                .take_sent()
                .into_iter()
                .filter_map(|(destination, message)| match message {
                    Message::IndexAddMessage(IndexAddMessage::IndexAddRequest(request)) => {
                        Some((destination.id().int(), request))
                    }
                    _ => None,
                })
                .collect()
        }

        fn timeouts(&self) -> Vec<IndexAddTimeout> {
            self.stub
                .take_scheduled()
                .into_iter()
                .filter_map(|(_, timeout)| match timeout {
                    Timeout::IndexAddTimeout(timeout) => Some(timeout),
                    _ => None,
                })
                .collect()
        }

        fn completed(&self) -> Vec<SequenceNumber> {
            self.events
                .try_iter()
                .filter_map(|event| match event {
                    Event::CompleteIndexAdd(complete) => Some(complete.sequence),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn leader_appends_its_own_entries_directly() {
        let mut fixture = Fixture::new(1, &[2, 3]);

        fixture.add(true);
        fixture.add(true);

        assert_eq!(fixture.index.max_sequence(), SequenceNumber::new(2));
        assert!(fixture.stub.take_sent().is_empty());
        assert_eq!(
            fixture.completed(),
            vec![SequenceNumber::new(1), SequenceNumber::new(2)]
        );
        assert_eq!(fixture.index_add.outstanding_requests(), 0);
    }

    #[test]
    fn requests_are_routed_to_the_lowest_known_peer() {
        let mut fixture = Fixture::new(5, &[4, 6]);
        fixture.index_add.on_sample(&peers(&[9, 2]));

        fixture.add(false);

        let sent = fixture.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 2);
        assert_eq!(sent[0].1.source, peer(5));
        let timeouts = fixture.timeouts();
        assert_eq!(timeouts.len(), 1);
        assert!(timeouts[0].retry);
        assert_eq!(fixture.index_add.outstanding_requests(), 1);
    }

    #[test]
    fn relays_forward_on_behalf_of_the_source() {
        let mut fixture = Fixture::new(3, &[1, 2, 4]);
        let request_id = RequestId::random(&mut fixture.rng);

        fixture.deliver(
            IndexAddMessage::index_add_request(request_id, "k".into(), "v".into(), peer(7)),
            false,
        );

        let sent = fixture.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].1.request_id, request_id);
        assert_eq!(sent[0].1.source, peer(7));
        assert!(!fixture.timeouts()[0].retry);
        let outstanding = &fixture.index_add.outstanding_requests[&request_id];
        assert_eq!(outstanding.source, peer(7));
    }

    #[test]
    fn leader_acknowledges_the_source_directly() {
        let mut fixture = Fixture::new(1, &[2, 3]);
        fixture.next_id.adopt(SequenceNumber::new(4));
        let request_id = RequestId::random(&mut fixture.rng);

        fixture.deliver(
            IndexAddMessage::index_add_request(request_id, "k".into(), "v".into(), peer(7)),
            true,
        );

        assert_eq!(fixture.index.max_sequence(), SequenceNumber::new(5));
        let sent = fixture.stub.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, peer(7));
        match &sent[0].1 {
            Message::IndexAddMessage(IndexAddMessage::LeaderResponse(response)) => {
                assert_eq!(response.request_id, request_id);
                assert_eq!(response.sequence, SequenceNumber::new(5));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn leader_response_completes_the_request_once() {
        let mut fixture = Fixture::new(5, &[4]);
        let request_id = fixture.add(false);
        assert_eq!(fixture.sent_requests().len(), 1);
        let timeouts = fixture.timeouts();

        let response = IndexAddMessage::leader_response(request_id, SequenceNumber::new(1));
        fixture.deliver(response.clone(), false);
        fixture.deliver(response, false);

        assert_eq!(fixture.completed(), vec![SequenceNumber::new(1)]);
        assert_eq!(fixture.index_add.outstanding_requests(), 0);

        // The timeout of a completed request is a no-op.
        for timeout in timeouts {
            assert_eq!(fixture.time_out(timeout), None);
        }
        assert!(fixture.sent_requests().is_empty());
    }

    #[test]
    fn leader_numbers_after_entries_it_pulled_in() {
        let mut fixture = Fixture::new(1, &[2, 3]);
        fixture
            .index
            .append(IndexEntry::new(SequenceNumber::new(1), "old".into(), "old".into()));
        fixture
            .index
            .append(IndexEntry::new(SequenceNumber::new(2), "older".into(), "older".into()));

        fixture.add(true);

        assert_eq!(fixture.completed(), vec![SequenceNumber::new(3)]);
        assert_eq!(fixture.index.len(), 3);
        assert_eq!(fixture.index.max_sequence(), SequenceNumber::new(3));
        let stored = fixture.index.get(SequenceNumber::new(3)).unwrap();
        assert_eq!(stored.key, "some key");
        assert_eq!(fixture.index.get(SequenceNumber::new(1)).unwrap().key, "old");
    }

    #[test]
    fn source_evicts_the_next_hop_and_retries() {
        let mut fixture = Fixture::new(5, &[3, 4]);
        fixture.index_add.on_sample(&peers(&[3]));
        fixture.add(false);
        assert_eq!(fixture.sent_requests()[0].0, 3);

        let timeout = fixture.timeouts().remove(0);
        assert_eq!(fixture.time_out(timeout), Some(peer(3)));

        let sent = fixture.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 4);
        assert_eq!(fixture.index_add.outstanding_requests(), 1);
    }

    #[test]
    fn parked_requests_retry_and_relayed_requests_are_dropped() {
        let mut fixture = Fixture::new(2, &[3, 4]);
        fixture.add(false);
        assert!(fixture.sent_requests().is_empty());
        let parked = fixture.timeouts().remove(0);

        let request_id = RequestId::random(&mut fixture.rng);
        fixture.deliver(
            IndexAddMessage::index_add_request(request_id, "k".into(), "v".into(), peer(7)),
            false,
        );
        let relayed = fixture.timeouts().remove(0);
        assert_eq!(fixture.index_add.outstanding_requests(), 2);

        assert_eq!(fixture.time_out(relayed), None);
        assert_eq!(fixture.index_add.outstanding_requests(), 1);

        assert_eq!(fixture.time_out(parked), None);
        // The parked request was issued again.
        assert_eq!(fixture.index_add.outstanding_requests(), 1);
        assert_eq!(fixture.timeouts().len(), 1);
    }
}
