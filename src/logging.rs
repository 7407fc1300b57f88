/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via
//! [`log_events`](crate::simulation::SimulationConfiguration::log_events).
//!
//! Events are logged using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//! Events that change a peer's role or the index are logged at the `Info` level; events that happen
//! every round are logged at the `Debug` level.
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least three values. The first three values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The simulation tick at which the event happened.
//! 3. The id of the peer at which the event happened.
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [RouteIndexAdd](crate::events::RouteIndexAddEvent) is printed:
//!
//! ```text
//! RouteIndexAdd, 10000, 5, hV3bM0U, 5, 1
//! ```
//!
//! In the snippet:
//! - The fourth value is the first seven characters of the Base64 encoding of the request id.
//! - The fifth value is the id of the peer that originated the request.
//! - The sixth value is the id of the next hop, or `-` if the request was parked.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;

use crate::{event_bus::HandlerPtr, events::*, types::peer_address::PeerAddress};

// Names of each event in PascalCase for printing:
pub const UPDATE_GRADIENT_VIEW: &str = "UpdateGradientView";
pub const EVICT_PEER: &str = "EvictPeer";

pub const START_ELECTION: &str = "StartElection";
pub const BECOME_LEADER: &str = "BecomeLeader";
pub const DEMOTE: &str = "Demote";
pub const UPDATE_LEADER: &str = "UpdateLeader";
pub const HEARTBEAT_TIMEOUT: &str = "HeartbeatTimeout";

pub const INITIATE_INDEX_ADD: &str = "InitiateIndexAdd";
pub const ROUTE_INDEX_ADD: &str = "RouteIndexAdd";
pub const APPEND_AT_LEADER: &str = "AppendAtLeader";
pub const SEND_LEADER_RESPONSE: &str = "SendLeaderResponse";
pub const COMPLETE_INDEX_ADD: &str = "CompleteIndexAdd";
pub const INDEX_ADD_TIMEOUT: &str = "IndexAddTimeout";

pub const SEND_INDEX_EXCHANGE_REQUEST: &str = "SendIndexExchangeRequest";
pub const SEND_INDEX_EXCHANGE_RESPONSE: &str = "SendIndexExchangeResponse";
pub const RECEIVE_INDEX_ENTRIES: &str = "ReceiveIndexEntries";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> HandlerPtr<Self>;
}

impl Logger for UpdateGradientViewEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |update_gradient_view_event: &UpdateGradientViewEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                UPDATE_GRADIENT_VIEW,
                update_gradient_view_event.tick,
                update_gradient_view_event.peer.id(),
                peer_ids(&update_gradient_view_event.partners),
                update_gradient_view_event.saturated
            )
        };
        Box::new(logger)
    }
}

impl Logger for EvictPeerEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |evict_peer_event: &EvictPeerEvent| {
            log::info!(
                "{}, {}, {}, {}, {:?}",
                EVICT_PEER,
                evict_peer_event.tick,
                evict_peer_event.peer.id(),
                evict_peer_event.evicted.id(),
                evict_peer_event.cause
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartElectionEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |start_election_event: &StartElectionEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_ELECTION,
                start_election_event.tick,
                start_election_event.peer.id(),
                start_election_event.participants
            )
        };
        Box::new(logger)
    }
}

impl Logger for BecomeLeaderEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |become_leader_event: &BecomeLeaderEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                BECOME_LEADER,
                become_leader_event.tick,
                become_leader_event.peer.id(),
                become_leader_event.votes,
                become_leader_event.next_sequence
            )
        };
        Box::new(logger)
    }
}

impl Logger for DemoteEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |demote_event: &DemoteEvent| {
            log::info!(
                "{}, {}, {}, {:?}",
                DEMOTE,
                demote_event.tick,
                demote_event.peer.id(),
                demote_event.cause
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateLeaderEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |update_leader_event: &UpdateLeaderEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_LEADER,
                update_leader_event.tick,
                update_leader_event.peer.id(),
                optional_peer_id(update_leader_event.leader.as_ref())
            )
        };
        Box::new(logger)
    }
}

impl Logger for HeartbeatTimeoutEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |heartbeat_timeout_event: &HeartbeatTimeoutEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                HEARTBEAT_TIMEOUT,
                heartbeat_timeout_event.tick,
                heartbeat_timeout_event.peer.id(),
                heartbeat_timeout_event.elector.id(),
                heartbeat_timeout_event.was_leader
            )
        };
        Box::new(logger)
    }
}

impl Logger for InitiateIndexAddEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |initiate_index_add_event: &InitiateIndexAddEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                INITIATE_INDEX_ADD,
                initiate_index_add_event.tick,
                initiate_index_add_event.peer.id(),
                first_seven_base64_chars(&initiate_index_add_event.request_id.bytes()),
                initiate_index_add_event.key
            )
        };
        Box::new(logger)
    }
}

impl Logger for RouteIndexAddEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |route_index_add_event: &RouteIndexAddEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}, {}",
                ROUTE_INDEX_ADD,
                route_index_add_event.tick,
                route_index_add_event.peer.id(),
                first_seven_base64_chars(&route_index_add_event.request_id.bytes()),
                route_index_add_event.source.id(),
                optional_peer_id(route_index_add_event.next_hop.as_ref())
            )
        };
        Box::new(logger)
    }
}

impl Logger for AppendAtLeaderEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |append_at_leader_event: &AppendAtLeaderEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                APPEND_AT_LEADER,
                append_at_leader_event.tick,
                append_at_leader_event.peer.id(),
                append_at_leader_event.entry.sequence,
                append_at_leader_event.entry.key
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendLeaderResponseEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |send_leader_response_event: &SendLeaderResponseEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                SEND_LEADER_RESPONSE,
                send_leader_response_event.tick,
                send_leader_response_event.peer.id(),
                first_seven_base64_chars(&send_leader_response_event.request_id.bytes()),
                send_leader_response_event.destination.id()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CompleteIndexAddEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |complete_index_add_event: &CompleteIndexAddEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COMPLETE_INDEX_ADD,
                complete_index_add_event.tick,
                complete_index_add_event.peer.id(),
                first_seven_base64_chars(&complete_index_add_event.request_id.bytes()),
                complete_index_add_event.sequence
            )
        };
        Box::new(logger)
    }
}

impl Logger for IndexAddTimeoutEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |index_add_timeout_event: &IndexAddTimeoutEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                INDEX_ADD_TIMEOUT,
                index_add_timeout_event.tick,
                index_add_timeout_event.peer.id(),
                first_seven_base64_chars(&index_add_timeout_event.request_id.bytes()),
                optional_peer_id(index_add_timeout_event.destination.as_ref()),
                index_add_timeout_event.retry
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendIndexExchangeRequestEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |send_index_exchange_request_event: &SendIndexExchangeRequestEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                SEND_INDEX_EXCHANGE_REQUEST,
                send_index_exchange_request_event.tick,
                send_index_exchange_request_event.peer.id(),
                send_index_exchange_request_event.partner.id(),
                send_index_exchange_request_event.max
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendIndexExchangeResponseEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |send_index_exchange_response_event: &SendIndexExchangeResponseEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                SEND_INDEX_EXCHANGE_RESPONSE,
                send_index_exchange_response_event.tick,
                send_index_exchange_response_event.peer.id(),
                send_index_exchange_response_event.requester.id(),
                send_index_exchange_response_event.entries
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveIndexEntriesEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |receive_index_entries_event: &ReceiveIndexEntriesEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_INDEX_ENTRIES,
                receive_index_entries_event.tick,
                receive_index_entries_event.peer.id(),
                receive_index_entries_event.origin.id(),
                receive_index_entries_event.appended,
                receive_index_entries_event.max
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Space-separated list of peer ids, so that a list stays a single CSV value.
fn peer_ids(peers: &[PeerAddress]) -> String {
    peers
        .iter()
        .map(|peer| peer.id().to_string())
        .collect::<Vec<String>>()
        .join(" ")
}

fn optional_peer_id(peer: Option<&PeerAddress>) -> String {
    match peer {
        Some(peer) => peer.id().to_string(),
        None => String::from("-"),
    }
}
