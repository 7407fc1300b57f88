/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Greedy routing towards the lowest peer.

use crate::types::peer_address::PeerAddress;

/// Bounded cache of the lowest peers seen in membership samples. Complements the gradient view, which
/// may not yet contain the lowest peers while the overlay is converging.
#[derive(Clone, Debug)]
pub struct TopmostPartners {
    capacity: usize,
    partners: Vec<PeerAddress>,
}

impl TopmostPartners {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            partners: Vec::with_capacity(capacity),
        }
    }

    /// Offer every peer in `sample` to the cache. A newcomer is kept if there is room, or if it is lower
    /// than the highest cached peer, which it then replaces.
    pub fn insert_sample(&mut self, me: PeerAddress, sample: &[PeerAddress]) {
        for peer in sample {
            if *peer == me || self.partners.contains(peer) {
                continue;
            }
            if self.partners.len() < self.capacity {
                self.partners.push(*peer);
                continue;
            }
            if let Some((worst_index, worst)) = self
                .partners
                .iter()
                .enumerate()
                .max_by_key(|(_, partner)| **partner)
            {
                if peer < worst {
                    self.partners[worst_index] = *peer;
                }
            }
        }
    }

    pub fn remove(&mut self, peer: &PeerAddress) {
        self.partners.retain(|partner| partner != peer)
    }

    pub fn partners(&self) -> &[PeerAddress] {
        &self.partners
    }
}

/// The next hop towards the leader: the lowest peer known from either `topmost` or `view`, if it is
/// lower than `me`. `None` means that no peer closer to the leader is known.
pub fn next_hop(
    me: PeerAddress,
    topmost: &TopmostPartners,
    view: &[PeerAddress],
) -> Option<PeerAddress> {
    topmost
        .partners()
        .iter()
        .chain(view.iter())
        .min()
        .filter(|lowest| **lowest < me)
        .copied()
}
