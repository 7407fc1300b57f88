/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for building and maintaining the gradient overlay (TMan).
//!
//! # The gradient
//!
//! Every peer keeps a small view (at most `view_size` entries, 6 by default) of overlay partners. The
//! view is ordered by a [ranking function](ranking::compare) that is relative to the owning peer:
//! - Any peer with a lower id than the owner ranks better than any peer with a higher id.
//! - Among peers with lower ids, the one closest to the owner (the highest id) ranks best.
//! - Among peers with higher ids, the one closest to the owner (the lowest id) ranks best.
//!
//! Repeatedly keeping only the best-ranked partners pulls every view towards the peers just below its
//! owner, so that following the best partner from any peer leads to the peer with the globally lowest
//! id. The [leader election](crate::leader_election) protocol relies on this to elect that peer.
//!
//! # Epidemic exchange
//!
//! The view is maintained by periodic pairwise exchanges, seeded by samples from the membership
//! layer:
//! 1. When a membership sample arrives and the view is non-empty, the peer picks a partner with
//!    [`select_peer`](ranking::select_peer), and sends it an [`ExchangeRequest`](messages::ExchangeRequest)
//!    carrying its view (minus the partner), itself, and the fresh sample.
//! 2. The partner replies with an [`ExchangeResponse`](messages::ExchangeResponse) carrying its own view,
//!    itself, and its last sample, and then merges the received buffer into its own view.
//! 3. On receiving the response, the initiator merges the buffer into its view.
//!
//! Merging keeps the best `view_size` entries under [`select_view`](ranking::select_view) and never
//! keeps the owner itself. If the view is empty, the sample seeds it directly.
//!
//! Every gradient round, the peer publishes its view to the local consumers (leader election, index
//! add, and index exchange), whether or not it changed.
//!
//! # Failures
//!
//! An exchange request that is not answered within `exchange_timeout` ticks evicts the partner from
//! the view. The [leader election](crate::leader_election) heartbeats and the
//! [index add](crate::index_add) timeouts evict peers through [`kill_node`](implementation::Gradient::kill_node)
//! as well.

pub mod messages;

pub mod ranking;

pub(crate) mod implementation;

pub use implementation::PartnerView;
