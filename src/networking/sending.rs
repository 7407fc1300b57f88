/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions and types for sending messages to the P2P network.

use crate::types::peer_address::PeerAddress;

use super::{messages::Message, network::Network};

/// Handle for sending messages to the [`Network`].
///
/// It can be used to send instances of any type that implement the [`Into<Message>`] trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn send<S: Into<Message>>(&mut self, peer: PeerAddress, msg: S) {
        self.network.send(peer, msg.into())
    }

    /// Send a copy of `msg` to each of `peers`.
    pub(crate) fn send_all<'a, S, I>(&mut self, peers: I, msg: S)
    where
        S: Into<Message>,
        I: IntoIterator<Item = &'a PeerAddress>,
    {
        let message = msg.into();
        for peer in peers {
            self.network.send(*peer, message.clone())
        }
    }
}
