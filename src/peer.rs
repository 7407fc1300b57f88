/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A single participant of the overlay, running all four protocols.
//!
//! ## Protocols
//!
//! Every [`Peer`] runs four protocols, which share the peer's gradient view, its [`IndexStore`], and
//! its [`SequenceAllocator`]:
//! 1. [Gradient](crate::gradient): maintains the view of overlay partners.
//! 2. [Leader election](crate::leader_election): elects the lowest peer as the leader.
//! 3. [Index add](crate::index_add): routes new entries to the leader.
//! 4. [Index exchange](crate::index_exchange): disseminates entries from the leader to every peer.
//!
//! A peer does nothing on its own. It is driven by its host (the [simulation](crate::simulation)),
//! which calls:
//! - [`on_sample`](Peer::on_sample) whenever the membership layer delivers a sample,
//! - [`on_round`](Peer::on_round) every gradient round,
//! - [`on_receive_msg`](Peer::on_receive_msg) and [`on_timeout`](Peer::on_timeout) for every delivered
//!   message and timeout, and
//! - [`add_index_entry`](Peer::add_index_entry) whenever a client wants to add an entry.
//!
//! Every round, the gradient publishes its view to the other three protocols in a fixed order:
//! leader election first, then index add, then index exchange.
//!
//! ## Configuration
//!
//! All protocol parameters are set with a [`Configuration`], which is built with
//! [`Configuration::builder`]. Every parameter has a default:
//!
//! ```
//! use gradient_search::peer::Configuration;
//!
//! let configuration = Configuration::builder()
//!     .view_size(6)
//!     .heartbeat_timeout(500)
//!     .build();
//! assert_eq!(configuration.stable_rounds_before_election, 3);
//! ```

use std::sync::mpsc::Sender;

use rand::{rngs::StdRng, SeedableRng};
use typed_builder::TypedBuilder;

use crate::{
    events::{Event, EvictionCause},
    gradient::implementation::{Gradient, GradientConfiguration},
    index_add::implementation::{IndexAdd, IndexAddConfiguration, LocalIndex},
    index_exchange::implementation::{IndexExchange, IndexExchangeConfiguration},
    index_store::{IndexEntry, IndexStore, QueryError, SequenceAllocator},
    leader_election::implementation::{LeaderElection, LeaderElectionConfiguration},
    networking::{messages::Message, network::Network},
    timer::{Timeout, Timer},
    types::{
        data_types::{RequestId, SequenceNumber, Tick},
        peer_address::PeerAddress,
    },
};

/// Protocol parameters shared by every peer of an overlay. All durations are in ticks.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. Every parameter is optional:
    - `.view_size(...)`
    - `.exchange_timeout(...)`
    - `.heartbeat_timeout(...)`
    - `.stable_rounds_before_election(...)`
    - `.index_add_timeout(...)`
    - `.topmost_partners_capacity(...)`
    - `.index_range_upper_bound(...)`
"))]
pub struct Configuration {
    #[builder(
        default = 6,
        setter(doc = "Set the maximum number of partners in a gradient view. Defaults to 6.")
    )]
    pub view_size: usize,
    #[builder(
        default = 1000,
        setter(doc = "Set the time to wait for a gradient exchange response. Defaults to 1000.")
    )]
    pub exchange_timeout: u64,
    #[builder(
        default = 1000,
        setter(doc = "Set the time to wait for a heartbeat reply. Defaults to 1000.")
    )]
    pub heartbeat_timeout: u64,
    #[builder(
        default = 3,
        setter(doc = "Set the number of consecutive rounds with unchanged partners after which the lowest peer starts an election. Defaults to 3.")
    )]
    pub stable_rounds_before_election: u64,
    #[builder(
        default = 10000,
        setter(doc = "Set the time to wait for the leader to acknowledge an index add request. Defaults to 10000.")
    )]
    pub index_add_timeout: u64,
    #[builder(
        default = 10,
        setter(doc = "Set the number of lowest sampled peers kept for routing index add requests. Defaults to 10.")
    )]
    pub topmost_partners_capacity: usize,
    #[builder(
        default = SequenceNumber::new(99999),
        setter(doc = "Set the highest sequence number that an index exchange response can carry. Defaults to 99999.")
    )]
    pub index_range_upper_bound: SequenceNumber,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::builder().build()
    }
}

impl
    Into<(
        GradientConfiguration,
        LeaderElectionConfiguration,
        IndexAddConfiguration,
        IndexExchangeConfiguration,
    )> for Configuration
{
    fn into(
        self,
    ) -> (
        GradientConfiguration,
        LeaderElectionConfiguration,
        IndexAddConfiguration,
        IndexExchangeConfiguration,
    ) {
        let gradient_config = GradientConfiguration {
            view_size: self.view_size,
            exchange_timeout: self.exchange_timeout,
        };
        let leader_election_config = LeaderElectionConfiguration {
            heartbeat_timeout: self.heartbeat_timeout,
            stable_rounds_before_election: self.stable_rounds_before_election,
        };
        let index_add_config = IndexAddConfiguration {
            index_add_timeout: self.index_add_timeout,
            topmost_partners_capacity: self.topmost_partners_capacity,
        };
        let index_exchange_config = IndexExchangeConfiguration {
            index_range_upper_bound: self.index_range_upper_bound,
        };
        (
            gradient_config,
            leader_election_config,
            index_add_config,
            index_exchange_config,
        )
    }
}

/// A peer of the overlay. See the [module-level docs](self).
pub struct Peer<N: Network, T: Timer> {
    me: PeerAddress,
    gradient: Gradient<N, T>,
    leader_election: LeaderElection<N, T>,
    index_add: IndexAdd<N, T>,
    index_exchange: IndexExchange<N>,
    index: IndexStore,
    next_id: SequenceAllocator,
    rng: StdRng,
}

impl<N: Network, T: Timer> Peer<N, T> {
    /// Create a peer with an empty view and an empty index. Its random choices are drawn from a
    /// generator seeded with `seed`.
    pub fn new(
        me: PeerAddress,
        configuration: Configuration,
        network: N,
        timer: T,
        seed: u64,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let (gradient_config, leader_election_config, index_add_config, index_exchange_config) =
            configuration.into();

        Self {
            me,
            gradient: Gradient::new(
                gradient_config,
                me,
                network.clone(),
                timer.clone(),
                event_publisher.clone(),
            ),
            leader_election: LeaderElection::new(
                leader_election_config,
                me,
                network.clone(),
                timer.clone(),
                event_publisher.clone(),
            ),
            index_add: IndexAdd::new(
                index_add_config,
                me,
                network.clone(),
                timer,
                event_publisher.clone(),
            ),
            index_exchange: IndexExchange::new(index_exchange_config, me, network, event_publisher),
            index: IndexStore::new(),
            next_id: SequenceAllocator::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn on_sample(&mut self, sample: &[PeerAddress]) {
        self.gradient.on_sample(sample, &mut self.rng);
        self.index_add.on_sample(sample);
    }

    pub fn on_round(&mut self, now: Tick) {
        let partner_view = self.gradient.tick(now);
        self.leader_election
            .on_partner_view(&partner_view, now, &mut self.rng);
        self.index_add.on_partner_view(&partner_view);
        self.index_exchange
            .on_partner_view(&partner_view, now, &self.index, &mut self.rng);
    }

    pub fn on_receive_msg(&mut self, msg: Message, origin: PeerAddress, now: Tick) {
        match msg {
            Message::GradientMessage(msg) => self.gradient.on_receive_msg(msg, origin),
            Message::LeaderElectionMessage(msg) => self.leader_election.on_receive_msg(
                msg,
                origin,
                now,
                self.index.max_sequence(),
                &mut self.next_id,
            ),
            Message::IndexAddMessage(msg) => {
                let local = LocalIndex {
                    is_leader: self.leader_election.is_leader(),
                    index: &mut self.index,
                    next_id: &mut self.next_id,
                };
                self.index_add.on_receive_msg(msg, now, local)
            }
            Message::IndexExchangeMessage(msg) => {
                self.index_exchange
                    .on_receive_msg(msg, origin, now, &mut self.index)
            }
        }
    }

    pub fn on_timeout(&mut self, timeout: Timeout, now: Tick) {
        match timeout {
            Timeout::ExchangeTimeout(timeout) => self.gradient.on_timeout(timeout, now),
            Timeout::HeartbeatTimeout(timeout) => {
                if let Some(dead) = self.leader_election.on_timeout(timeout, now) {
                    self.gradient
                        .kill_node(dead, EvictionCause::HeartbeatTimeout, now);
                }
            }
            Timeout::IndexAddTimeout(timeout) => {
                let local = LocalIndex {
                    is_leader: self.leader_election.is_leader(),
                    index: &mut self.index,
                    next_id: &mut self.next_id,
                };
                if let Some(dead) = self.index_add.on_timeout(timeout, now, local, &mut self.rng) {
                    self.gradient
                        .kill_node(dead, EvictionCause::IndexAddTimeout, now);
                }
            }
        }
    }

    /// Ask this peer to add an entry to the index on behalf of a client.
    pub fn add_index_entry(&mut self, key: String, value: String, now: Tick) -> RequestId {
        let local = LocalIndex {
            is_leader: self.leader_election.is_leader(),
            index: &mut self.index,
            next_id: &mut self.next_id,
        };
        self.index_add
            .add_entry(key, value, now, local, &mut self.rng)
    }

    /// Search this peer's copy of the index. See [`IndexStore::query`].
    pub fn query(&self, query: &str) -> Result<Vec<IndexEntry>, QueryError> {
        self.index.query(query)
    }

    pub fn address(&self) -> PeerAddress {
        self.me
    }

    pub fn is_leader(&self) -> bool {
        self.leader_election.is_leader()
    }

    pub fn leader(&self) -> Option<PeerAddress> {
        self.leader_election.leader()
    }

    pub fn gradient_view(&self) -> &[PeerAddress] {
        self.gradient.view()
    }

    pub fn max_sequence(&self) -> SequenceNumber {
        self.index.max_sequence()
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Number of index add requests this peer originated or relays that are still unacknowledged.
    pub fn outstanding_index_adds(&self) -> usize {
        self.index_add.outstanding_requests()
    }
}
