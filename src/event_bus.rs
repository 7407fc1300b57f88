/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Registry of event handlers, and the function that drains published events into them.
//!
//! The simulation runs every peer on a single thread, so events are handled synchronously: after
//! every simulation step the published events are drained from the channel and handed to
//! [`EventHandlers::fire_handlers`] in publication order.

use std::sync::mpsc::Receiver;

use crate::{events::*, logging::Logger};

/// Pointer to a handler closure for an event of type `T`.
pub type HandlerPtr<T> = Box<dyn Fn(&T)>;

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) update_gradient_view_handlers: Vec<HandlerPtr<UpdateGradientViewEvent>>,
    pub(crate) evict_peer_handlers: Vec<HandlerPtr<EvictPeerEvent>>,
    pub(crate) start_election_handlers: Vec<HandlerPtr<StartElectionEvent>>,
    pub(crate) become_leader_handlers: Vec<HandlerPtr<BecomeLeaderEvent>>,
    pub(crate) demote_handlers: Vec<HandlerPtr<DemoteEvent>>,
    pub(crate) update_leader_handlers: Vec<HandlerPtr<UpdateLeaderEvent>>,
    pub(crate) heartbeat_timeout_handlers: Vec<HandlerPtr<HeartbeatTimeoutEvent>>,
    pub(crate) initiate_index_add_handlers: Vec<HandlerPtr<InitiateIndexAddEvent>>,
    pub(crate) route_index_add_handlers: Vec<HandlerPtr<RouteIndexAddEvent>>,
    pub(crate) append_at_leader_handlers: Vec<HandlerPtr<AppendAtLeaderEvent>>,
    pub(crate) send_leader_response_handlers: Vec<HandlerPtr<SendLeaderResponseEvent>>,
    pub(crate) complete_index_add_handlers: Vec<HandlerPtr<CompleteIndexAddEvent>>,
    pub(crate) index_add_timeout_handlers: Vec<HandlerPtr<IndexAddTimeoutEvent>>,
    pub(crate) send_index_exchange_request_handlers: Vec<HandlerPtr<SendIndexExchangeRequestEvent>>,
    pub(crate) send_index_exchange_response_handlers:
        Vec<HandlerPtr<SendIndexExchangeResponseEvent>>,
    pub(crate) receive_index_entries_handlers: Vec<HandlerPtr<ReceiveIndexEntriesEvent>>,
    pub(crate) any_event_handlers: Vec<HandlerPtr<Event>>,
}

impl EventHandlers {
    /// Create a registry that contains the default logging handler for every event type if
    /// `log_events` is set, and no handlers otherwise.
    pub(crate) fn new(log_events: bool) -> Self {
        let mut handlers = Self::default();
        if log_events {
            handlers.add_logging_handlers();
        }
        handlers
    }

    /// Register a handler that is called for every event, after the type-specific handlers.
    pub(crate) fn add_handler(&mut self, handler: HandlerPtr<Event>) {
        self.any_event_handlers.push(handler)
    }

    fn add_logging_handlers(&mut self) {
        self.update_gradient_view_handlers
            .push(UpdateGradientViewEvent::get_logger());
        self.evict_peer_handlers.push(EvictPeerEvent::get_logger());
        self.start_election_handlers
            .push(StartElectionEvent::get_logger());
        self.become_leader_handlers.push(BecomeLeaderEvent::get_logger());
        self.demote_handlers.push(DemoteEvent::get_logger());
        self.update_leader_handlers.push(UpdateLeaderEvent::get_logger());
        self.heartbeat_timeout_handlers
            .push(HeartbeatTimeoutEvent::get_logger());
        self.initiate_index_add_handlers
            .push(InitiateIndexAddEvent::get_logger());
        self.route_index_add_handlers
            .push(RouteIndexAddEvent::get_logger());
        self.append_at_leader_handlers
            .push(AppendAtLeaderEvent::get_logger());
        self.send_leader_response_handlers
            .push(SendLeaderResponseEvent::get_logger());
        self.complete_index_add_handlers
            .push(CompleteIndexAddEvent::get_logger());
        self.index_add_timeout_handlers
            .push(IndexAddTimeoutEvent::get_logger());
        self.send_index_exchange_request_handlers
            .push(SendIndexExchangeRequestEvent::get_logger());
        self.send_index_exchange_response_handlers
            .push(SendIndexExchangeResponseEvent::get_logger());
        self.receive_index_entries_handlers
            .push(ReceiveIndexEntriesEvent::get_logger());
    }

    pub(crate) fn fire_handlers(&self, event: &Event) {
        match event {
            Event::UpdateGradientView(update_gradient_view_event) => self
                .update_gradient_view_handlers
                .iter()
                .for_each(|handler| handler(update_gradient_view_event)),

            Event::EvictPeer(evict_peer_event) => self
                .evict_peer_handlers
                .iter()
                .for_each(|handler| handler(evict_peer_event)),

            Event::StartElection(start_election_event) => self
                .start_election_handlers
                .iter()
                .for_each(|handler| handler(start_election_event)),

            Event::BecomeLeader(become_leader_event) => self
                .become_leader_handlers
                .iter()
                .for_each(|handler| handler(become_leader_event)),

            Event::Demote(demote_event) => self
                .demote_handlers
                .iter()
                .for_each(|handler| handler(demote_event)),

            Event::UpdateLeader(update_leader_event) => self
                .update_leader_handlers
                .iter()
                .for_each(|handler| handler(update_leader_event)),

            Event::HeartbeatTimeout(heartbeat_timeout_event) => self
                .heartbeat_timeout_handlers
                .iter()
                .for_each(|handler| handler(heartbeat_timeout_event)),

            Event::InitiateIndexAdd(initiate_index_add_event) => self
                .initiate_index_add_handlers
                .iter()
                .for_each(|handler| handler(initiate_index_add_event)),

            Event::RouteIndexAdd(route_index_add_event) => self
                .route_index_add_handlers
                .iter()
                .for_each(|handler| handler(route_index_add_event)),

            Event::AppendAtLeader(append_at_leader_event) => self
                .append_at_leader_handlers
                .iter()
                .for_each(|handler| handler(append_at_leader_event)),

            Event::SendLeaderResponse(send_leader_response_event) => self
                .send_leader_response_handlers
                .iter()
                .for_each(|handler| handler(send_leader_response_event)),

            Event::CompleteIndexAdd(complete_index_add_event) => self
                .complete_index_add_handlers
                .iter()
                .for_each(|handler| handler(complete_index_add_event)),

            Event::IndexAddTimeout(index_add_timeout_event) => self
                .index_add_timeout_handlers
                .iter()
                .for_each(|handler| handler(index_add_timeout_event)),

            Event::SendIndexExchangeRequest(send_index_exchange_request_event) => self
                .send_index_exchange_request_handlers
                .iter()
                .for_each(|handler| handler(send_index_exchange_request_event)),

            Event::SendIndexExchangeResponse(send_index_exchange_response_event) => self
                .send_index_exchange_response_handlers
                .iter()
                .for_each(|handler| handler(send_index_exchange_response_event)),

            Event::ReceiveIndexEntries(receive_index_entries_event) => self
                .receive_index_entries_handlers
                .iter()
                .for_each(|handler| handler(receive_index_entries_event)),
        }

        self.any_event_handlers
            .iter()
            .for_each(|handler| handler(event));
    }
}

/// Drain every event currently in `event_subscriber`, in publication order.
pub(crate) fn drain_events(event_subscriber: &Receiver<Event>) -> Vec<Event> {
    event_subscriber.try_iter().collect()
}
