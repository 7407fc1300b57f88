/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use gradient_search::{
    networking::messages::Protocol,
    snapshot::{
        INDEX_ADD_COMPLETED, INDEX_ADD_INITIATED, INDEX_ADD_MESSAGES, INDEX_PROPAGATION_COMPLETE,
        INDEX_PROPAGATION_START, SECOND_LEADER,
    },
    types::data_types::{PeerId, SequenceNumber, Tick},
};
use log::LevelFilter;

mod common;

use crate::common::{
    logging::setup_logger,
    scenario::{collect_appends, simulation_with_peers},
};

#[test]
fn entry_reaches_every_peer_test() {
    setup_logger(LevelFilter::Info);

    // 1. Let 5 peers join, highest id first, so that the entry peer is the highest peer.
    let mut simulation = simulation_with_peers(&[5, 4, 3, 2, 1], 3);

    // 2. Add an entry once a leader has had time to emerge, and run until every peer has it.
    simulation.add_index_entry(Tick::new(30_000), "Blue Danube", "http://example.org/danube");
    simulation.run().unwrap();

    // 3. The run ended because the entry propagated, with every milestone of the add reported.
    let snapshot = simulation.snapshot();
    assert!(snapshot.is_complete());
    for key in [
        INDEX_ADD_INITIATED,
        INDEX_ADD_COMPLETED,
        INDEX_PROPAGATION_START,
        INDEX_PROPAGATION_COMPLETE,
    ] {
        assert!(snapshot.is_reported(key), "{} not reported", key);
    }
    assert!(snapshot.reported_value(INDEX_ADD_MESSAGES).unwrap() >= 2);
    assert_eq!(snapshot.index_dist_percentage().unwrap(), 100);

    // 4. Every peer holds the entry under sequence number 1, and can find it.
    for peer in simulation.live_peers() {
        let live = simulation.peer(peer.id()).unwrap();
        assert_eq!(live.max_sequence(), SequenceNumber::new(1));
        let info = snapshot.peer_info(&peer).unwrap();
        assert_eq!(info.max_sequence, SequenceNumber::new(1));
        assert_eq!(info.is_leader, peer.id() == PeerId::new(1));

        let hits = simulation.query(peer.id(), "danube").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "Blue Danube");
        assert_eq!(hits[0].value, "http://example.org/danube");
    }

    // 5. The entry peer got its answer from the leader.
    assert_eq!(
        simulation.peer(PeerId::new(5)).unwrap().outstanding_index_adds(),
        0
    );

    // 6. All four protocols used the network.
    let stats = simulation.network_stats();
    for protocol in [
        Protocol::Gradient,
        Protocol::LeaderElection,
        Protocol::IndexAdd,
        Protocol::IndexExchange,
    ] {
        assert!(stats.protocol(protocol).messages > 0);
    }
    assert!(stats.total_bytes() > stats.total_messages());
}

#[test]
fn entries_are_sequenced_without_gaps_test() {
    setup_logger(LevelFilter::Info);

    // 1. Let 5 peers join and record every append at a leader.
    let mut simulation = simulation_with_peers(&[5, 4, 3, 2, 1], 5);
    let appends = collect_appends(&mut simulation);

    // 2. Add 5 entries, spaced apart.
    for i in 0..5u64 {
        simulation.add_index_entry(
            Tick::new(30_000 + i * 500),
            format!("track {}", i),
            format!("http://example.org/{}", i),
        );
    }

    // 3. Give the entries time to be sequenced and to propagate.
    simulation.run_until(Tick::new(120_000)).unwrap();

    // 4. The leader handed out 1 to 5, each once and in order.
    let expected: Vec<SequenceNumber> = (1..=5).map(SequenceNumber::new).collect();
    assert_eq!(*appends.borrow(), expected);

    // 5. Every peer ends up with all 5 entries.
    for peer in simulation.live_peers() {
        let live = simulation.peer(peer.id()).unwrap();
        assert_eq!(live.max_sequence(), SequenceNumber::new(5));
        assert_eq!(live.index().len(), 5);
        assert_eq!(simulation.query(peer.id(), "track").unwrap().len(), 5);
    }
}

#[test]
fn sequencing_continues_after_leader_handoff_test() {
    setup_logger(LevelFilter::Info);

    // 1. Let 5 peers join, record every append, and add 2 entries under the first leader.
    let mut simulation = simulation_with_peers(&[5, 4, 3, 2, 1], 13);
    let appends = collect_appends(&mut simulation);
    for i in 0..2u64 {
        simulation.add_index_entry(
            Tick::new(30_000 + i * 500),
            format!("before {}", i),
            format!("http://example.org/before/{}", i),
        );
    }

    // 2. Fail the first leader once the entries have spread, and wait for the next leader.
    simulation.peer_fail(Tick::new(45_000), PeerId::new(1));
    simulation.run_until(Tick::new(200_000)).unwrap();
    assert!(simulation.snapshot().is_reported(SECOND_LEADER));
    assert!(simulation.peer(PeerId::new(2)).unwrap().is_leader());

    // 3. Add 2 more entries under the new leader.
    for i in 0..2u64 {
        simulation.add_index_entry(
            Tick::new(200_500 + i * 500),
            format!("after {}", i),
            format!("http://example.org/after/{}", i),
        );
    }
    simulation.run_until(Tick::new(300_000)).unwrap();

    // 4. The two leaders handed out 1 to 4 between them, each once and in order.
    let expected: Vec<SequenceNumber> = (1..=4).map(SequenceNumber::new).collect();
    assert_eq!(*appends.borrow(), expected);

    // 5. Every survivor converges to the new leader's index.
    let leader_max = simulation.peer(PeerId::new(2)).unwrap().max_sequence();
    assert_eq!(leader_max, SequenceNumber::new(4));
    for peer in simulation.live_peers() {
        let live = simulation.peer(peer.id()).unwrap();
        assert_eq!(live.max_sequence(), leader_max);
        assert_eq!(live.index().len(), 4);
        assert_eq!(simulation.query(peer.id(), "before").unwrap().len(), 2);
        assert_eq!(simulation.query(peer.id(), "after").unwrap().len(), 2);
    }
}
