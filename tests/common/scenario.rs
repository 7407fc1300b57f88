/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{cell::RefCell, rc::Rc};

use gradient_search::{
    events::Event,
    simulation::{Simulation, SimulationConfiguration},
    types::data_types::{PeerId, SequenceNumber, Tick},
};

/// Ticks between two scheduled joins.
pub(crate) const JOIN_INTERVAL: u64 = 100;

/// Create a simulation in which peers with the given ids join, one every [`JOIN_INTERVAL`] ticks
/// starting at tick 0, in the order given.
pub(crate) fn simulation_with_peers(ids: &[u64], seed: u64) -> Simulation {
    let config = SimulationConfiguration::builder()
        .expected_peers(ids.len())
        .seed(seed)
        .build();
    let mut simulation = Simulation::new(config);
    for (i, id) in ids.iter().enumerate() {
        simulation.peer_join(Tick::new(i as u64 * JOIN_INTERVAL), PeerId::new(*id));
    }
    simulation
}

/// Register a handler that records the sequence number of every entry appended at a leader.
pub(crate) fn collect_appends(simulation: &mut Simulation) -> Rc<RefCell<Vec<SequenceNumber>>> {
    let appends = Rc::new(RefCell::new(Vec::new()));
    let collected = appends.clone();
    simulation.on_event(Box::new(move |event: &Event| {
        if let Event::AppendAtLeader(append) = event {
            collected.borrow_mut().push(append.entry.sequence);
        }
    }));
    appends
}

/// The ids of the peers that each live peer believes to be the leader, lowest peer first.
pub(crate) fn believed_leaders(simulation: &Simulation) -> Vec<Option<u64>> {
    simulation
        .live_peers()
        .iter()
        .map(|peer| {
            simulation
                .peer(peer.id())
                .and_then(|peer| peer.leader())
                .map(|leader| leader.id().int())
        })
        .collect()
}
