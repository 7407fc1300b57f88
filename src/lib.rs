/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A simulated peer-to-peer search overlay.
//!
//! Peers organize themselves into a [gradient](gradient) topology using TMan, elect the peer at the top
//! of the gradient as their [leader](leader_election), route every new index entry to that leader to
//! be [sequenced](index_add), and replicate the sequenced entries to every other peer by
//! [anti-entropy](index_exchange).
//!
//! Everything runs inside a deterministic, discrete-event [simulation]. A [snapshot] observes the
//! [events] published by every peer and reports when the overlay reaches each milestone of a run:
//! every peer joined, a leader was elected, an entry was added, and the entry reached every peer.
//!
//! # Getting started
//!
//! ```no_run
//! use gradient_search::{
//!     simulation::{Simulation, SimulationConfiguration},
//!     types::data_types::{PeerId, Tick},
//! };
//!
//! let mut simulation = Simulation::new(SimulationConfiguration::builder().expected_peers(5).build());
//! for (at, id) in [5, 4, 3, 2, 1].into_iter().enumerate() {
//!     simulation.peer_join(Tick::new(at as u64 * 100), PeerId::new(id));
//! }
//! simulation.add_index_entry(Tick::new(60_000), "song", "http://example.org/song");
//! simulation.run().unwrap();
//!
//! println!("{:?}", simulation.snapshot().reported_values());
//! ```

pub mod events;

pub mod event_bus;

pub mod gradient;

pub mod index_add;

pub mod index_exchange;

pub mod index_store;

pub mod leader_election;

pub(crate) mod logging;

pub mod networking;

pub mod peer;

pub mod simulation;

pub mod snapshot;

pub mod timer;

pub mod types;
