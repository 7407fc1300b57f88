/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Discrete-event simulation of a whole overlay.
//!
//! A [`Simulation`] owns every live [`Peer`](crate::peer::Peer), a single clock, and a single queue of
//! scheduled events. Nothing happens between events: every step of [`run`](Simulation::run) pops the
//! earliest event, moves the clock to its tick, and hands it to the peer it concerns.
//!
//! # Scheduled events
//!
//! Users schedule three kinds of events:
//! - [`peer_join`](Simulation::peer_join): a peer joins with the given id. If the id is taken, the next
//!   free id (modulo `identifier_space_size`) is used.
//! - [`peer_fail`](Simulation::peer_fail): the peer with the given id fails. If no peer has the id, the
//!   next live peer in id order fails instead, wrapping around the identifier space.
//! - [`add_index_entry`](Simulation::add_index_entry): a client asks the first peer that joined to add
//!   an entry to the index.
//!
//! The simulation itself schedules every peer's gradient rounds (every `gradient_period` ticks),
//! membership samples (every `membership_period` ticks), message deliveries, and timeouts, as well as
//! the periodic [snapshot](crate::snapshot) reports. Rounds and samples do nothing until all expected
//! peers have joined.
//!
//! # Determinism
//!
//! Every random choice of a run (latencies, samples, round offsets, and every peer's own choices) is
//! drawn from generators derived from [`seed`](SimulationConfiguration::seed). Two runs with the same
//! configuration and the same scheduled events behave identically.
//!
//! # Failures
//!
//! A failed peer is removed at once. Messages and timeouts addressed to it are dropped when they come
//! due, and the surviving peers find out through their own timeouts.

pub mod configuration;

pub mod network;

pub(crate) mod scheduler;

pub(crate) mod membership;

mod implementation;

pub use configuration::SimulationConfiguration;

pub use implementation::{SimulatedPeer, Simulation, SimulationError};
