/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identity of a peer in the overlay.
//!
//! A [`PeerAddress`] pairs the [`PeerId`] a peer occupies in the identifier space with the
//! [`NetworkAddress`] messages for it are delivered to. Equality, hashing, and ordering all look at the
//! `PeerId` only, so a `PeerAddress` can be used as a map key and sorted consistently by every
//! component.

use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::PeerId;

/// Simulated transport address of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct NetworkAddress {
    ip: [u8; 4],
    port: u16,
}

impl NetworkAddress {
    pub const fn new(ip: [u8; 4], port: u16) -> Self {
        Self { ip, port }
    }

    pub const fn ip(&self) -> [u8; 4] {
        self.ip
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Display for NetworkAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.ip;
        write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port)
    }
}

impl Debug for NetworkAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Immutable identity of a peer: its id in the identifier space and its network address.
#[derive(Clone, Copy, BorshDeserialize, BorshSerialize)]
pub struct PeerAddress {
    address: NetworkAddress,
    id: PeerId,
}

impl PeerAddress {
    pub const fn new(address: NetworkAddress, id: PeerId) -> Self {
        Self { address, id }
    }

    pub const fn address(&self) -> NetworkAddress {
        self.address
    }

    pub const fn id(&self) -> PeerId {
        self.id
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerAddress {}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for PeerAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PeerAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

impl Debug for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
