/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! An in-memory network and timer stub for driving a single protocol instance in unit tests.

use std::{cell::RefCell, rc::Rc};

use crate::{
    timer::{Timeout, Timer},
    types::peer_address::PeerAddress,
};

use super::{messages::Message, network::Network};

/// Records every message sent and every timeout scheduled, instead of delivering them.
#[derive(Clone, Default)]
pub(crate) struct NetworkStub {
    sent: Rc<RefCell<Vec<(PeerAddress, Message)>>>,
    scheduled: Rc<RefCell<Vec<(u64, Timeout)>>>,
}

impl NetworkStub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take all messages sent since the last call.
    pub(crate) fn take_sent(&self) -> Vec<(PeerAddress, Message)> {
        self.sent.borrow_mut().drain(..).collect()
    }

    /// Take all timeouts scheduled since the last call.
    pub(crate) fn take_scheduled(&self) -> Vec<(u64, Timeout)> {
        self.scheduled.borrow_mut().drain(..).collect()
    }
}

impl Network for NetworkStub {
    fn send(&mut self, peer: PeerAddress, message: Message) {
        self.sent.borrow_mut().push((peer, message))
    }
}

impl Timer for NetworkStub {
    fn schedule(&mut self, delay: u64, timeout: Timeout) {
        self.scheduled.borrow_mut().push((delay, timeout))
    }
}

/// A peer address on the stub network with the given id.
pub(crate) fn peer(id: u64) -> PeerAddress {
    use crate::types::{data_types::PeerId, peer_address::NetworkAddress};

    PeerAddress::new(
        NetworkAddress::new([10, 0, (id >> 8) as u8, id as u8], 8058),
        PeerId::new(id),
    )
}

/// Peer addresses with the given ids, in order.
pub(crate) fn peers(ids: &[u64]) -> Vec<PeerAddress> {
    ids.iter().map(|id| peer(*id)).collect()
}
