/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use typed_builder::TypedBuilder;

use crate::peer::Configuration;

/// Parameters of a simulation run. All periods and latencies are in ticks.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SimulationConfiguration]. On the builder call the following methods to construct a valid [SimulationConfiguration].

    Required:
    - `.expected_peers(...)`

    Optional:
    - `.peer(...)`
    - `.seed(...)`
    - `.identifier_space_size(...)`
    - `.gradient_period(...)`
    - `.membership_period(...)`
    - `.sample_size(...)`
    - `.snapshot_period(...)`
    - `.min_latency(...)`
    - `.max_latency(...)`
    - `.max_ticks(...)`
    - `.log_events(...)`
"))]
pub struct SimulationConfiguration {
    #[builder(setter(doc = "Set the number of peers after whose join the snapshot considers all peers joined. Required."))]
    pub expected_peers: usize,
    #[builder(
        default,
        setter(doc = "Set the protocol parameters of every peer. Defaults to `Configuration::default()`.")
    )]
    pub peer: Configuration,
    #[builder(
        default = 0,
        setter(doc = "Set the seed of every random choice of the run. Defaults to 0.")
    )]
    pub seed: u64,
    #[builder(
        default = 8192,
        setter(doc = "Set the size of the identifier space that peer ids are probed in. Defaults to 2^13.")
    )]
    pub identifier_space_size: u64,
    #[builder(
        default = 1000,
        setter(doc = "Set the period of the gradient rounds of every peer. Defaults to 1000.")
    )]
    pub gradient_period: u64,
    #[builder(
        default = 1000,
        setter(doc = "Set the period of the membership samples of every peer. Defaults to 1000.")
    )]
    pub membership_period: u64,
    #[builder(
        default = 10,
        setter(doc = "Set the maximum number of peers in a membership sample. Defaults to 10.")
    )]
    pub sample_size: usize,
    #[builder(
        default = 100,
        setter(doc = "Set the period of the snapshot reports. Defaults to 100.")
    )]
    pub snapshot_period: u64,
    #[builder(
        default = 1,
        setter(doc = "Set the minimum message latency. Defaults to 1.")
    )]
    pub min_latency: u64,
    #[builder(
        default = 20,
        setter(doc = "Set the maximum message latency. Defaults to 20.")
    )]
    pub max_latency: u64,
    #[builder(
        default = 1_000_000,
        setter(doc = "Set the tick after which `Simulation::run` stops. Defaults to 1000000.")
    )]
    pub max_ticks: u64,
    #[builder(
        default = false,
        setter(doc = "Enable the default logging handlers of every event? Defaults to false.")
    )]
    pub log_events: bool,
}
