/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for routing new index entries to the leader, which assigns them sequence numbers.
//!
//! # Routing
//!
//! A peer that is asked to add an entry and is not the leader forwards an
//! [`IndexAddRequest`](messages::IndexAddRequest) greedily up the gradient: to the lowest peer it
//! knows of, from its gradient view and from a [cache](routing::TopmostPartners) of the lowest peers
//! seen in membership samples, as long as that peer is lower than itself. A peer that knows no lower
//! peer parks the request until it times out.
//!
//! The leader appends the entry under the next sequence number and acknowledges the request with a
//! [`LeaderResponse`](messages::LeaderResponse) sent directly to the peer that originated it.
//!
//! # Timeouts
//!
//! Every peer that forwards or parks a request keeps it outstanding for `index_add_timeout` ticks.
//! When the timeout fires and the request is still outstanding:
//! - At the peer that originated it, the next hop is evicted from the routing cache and from the
//!   gradient view, and the request is issued again from scratch.
//! - At a relaying peer, the request is dropped. The originating peer will retry it.

pub mod messages;

pub mod routing;

pub(crate) mod implementation;
