/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::peer_address::PeerAddress;

use super::messages::Message;

/// Trait for the peer-to-peer transport that carries [`Message`]s between peers.
///
/// Sending never blocks and never reports failure: a message to a peer that has left is simply lost,
/// and the protocols rely on their own timeouts to notice.
pub trait Network: Clone {
    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: PeerAddress, message: Message);
}
