/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! Every protocol of a peer talks to other peers only through the [`Network`](network::Network)
//! trait. The crate ships one implementation, the
//! [`SimulatedNetwork`](crate::simulation::network::SimulatedNetwork), which delivers messages through
//! the discrete-event scheduler.

pub mod network;

pub mod messages;

pub(crate) mod sending;

#[cfg(test)]
pub(crate) mod stub;
