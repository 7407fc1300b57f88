/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The gradient ranking function and the selection functions built on it.

use std::cmp::Ordering;

use rand::Rng;

use crate::types::{data_types::PeerId, peer_address::PeerAddress};

/// Compare `left` and `right` from the point of view of the peer `me`. [`Ordering::Less`] means that
/// `left` ranks better.
///
/// 1. If both ids exceed `me`, the lower (closer) one ranks better.
/// 2. If only one id exceeds `me`, the other one ranks better.
/// 3. If neither exceeds `me`, the higher (closer) one ranks better.
pub fn compare(me: PeerId, left: &PeerAddress, right: &PeerAddress) -> Ordering {
    let left_above = left.id() > me;
    let right_above = right.id() > me;
    match (left_above, right_above) {
        (true, true) => left.cmp(right),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => right.cmp(left),
    }
}

/// Sort `peers` from the best to the worst ranked, from the point of view of `me`.
pub fn sort_by_rank(me: PeerId, peers: &mut [PeerAddress]) {
    peers.sort_by(|left, right| compare(me, left, right))
}

/// Pick an exchange partner: a uniformly random choice among the better-ranked half of `view`
/// (indices `0..=len/2` after sorting). Returns `None` if `view` is empty.
pub fn select_peer<R: Rng + ?Sized>(
    me: PeerId,
    view: &[PeerAddress],
    rng: &mut R,
) -> Option<PeerAddress> {
    if view.is_empty() {
        return None;
    }
    let mut sorted = view.to_vec();
    sort_by_rank(me, &mut sorted);
    let half = sorted.len() / 2;
    let index = rng.gen_range(0, half + 1);
    sorted.get(index).copied()
}

/// Keep the `view_size` best-ranked peers of `candidates`, best first.
pub fn select_view(me: PeerId, candidates: &[PeerAddress], view_size: usize) -> Vec<PeerAddress> {
    let mut sorted = candidates.to_vec();
    sort_by_rank(me, &mut sorted);
    sorted.truncate(view_size);
    sorted
}
