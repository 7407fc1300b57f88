/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for disseminating index entries from the leader to every peer by anti-entropy.
//!
//! Every gradient round, a peer with at least two partners asks one of them, picked uniformly at
//! random, for the entries above its own max sequence number. A partner whose max is higher replies
//! with its entries in the range `(max, index_range_upper_bound]`. A partner that has nothing newer does
//! not reply. Received entries are appended idempotently.
//!
//! Since the leader is the lowest peer, and every gradient view leans towards lower peers, entries
//! spread outward from the leader along the gradient.

pub mod messages;

pub(crate) mod implementation;
