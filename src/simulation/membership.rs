/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Random peer sampling, standing in for a Cyclon membership layer.

use rand::{seq::SliceRandom, Rng};

use crate::types::peer_address::PeerAddress;

/// Draws uniform samples of live peers for the gradient and index add protocols.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MembershipSampler {
    sample_size: usize,
}

impl MembershipSampler {
    pub(crate) fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    /// Up to `sample_size` distinct peers of `live`, other than `me`, in random order.
    pub(crate) fn sample<R: Rng + ?Sized>(
        &self,
        me: PeerAddress,
        live: &[PeerAddress],
        rng: &mut R,
    ) -> Vec<PeerAddress> {
        let candidates: Vec<PeerAddress> = live.iter().filter(|peer| **peer != me).copied().collect();
        let mut sample: Vec<PeerAddress> = candidates
            .choose_multiple(rng, self.sample_size)
            .copied()
            .collect();
        sample.shuffle(rng);
        sample
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::networking::stub::{peer, peers};

    #[test]
    fn samples_are_distinct_bounded_and_exclude_self() {
        let sampler = MembershipSampler::new(4);
        let live = peers(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..50 {
            let mut sample = sampler.sample(peer(5), &live, &mut rng);
            assert_eq!(sample.len(), 4);
            assert!(!sample.contains(&peer(5)));
            sample.sort();
            sample.dedup();
            assert_eq!(sample.len(), 4);
        }

        let small = sampler.sample(peer(1), &peers(&[1, 2]), &mut rng);
        assert_eq!(small, peers(&[2]));
    }
}
