/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store numbers or bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign},
};

use borsh::{BorshDeserialize, BorshSerialize};
use rand::Rng;
use uuid::{Builder, Uuid};

/// Position of a peer in the identifier space.
///
/// The total order on `PeerId` is the order that the gradient converges towards: the peer with the
/// lowest `PeerId` sits at the top of the gradient and is the rightful leader.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct PeerId(u64);

impl PeerId {
    /// Create a new `PeerId` with an `int` value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the `u64` value of this `PeerId`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Sequence number of an entry in the replicated index.
///
/// Sequence numbers are assigned by the leader only, starting at 1. A sequence number of 0 means
/// "no entries".
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Create a new `SequenceNumber` with an `int` value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// The sequence number of an empty index.
    pub const fn init() -> Self {
        Self(0)
    }

    /// Get the `u64` value of this `SequenceNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for SequenceNumber {
    type Output = SequenceNumber;
    fn add(self, rhs: u64) -> Self::Output {
        SequenceNumber::new(self.0 + rhs)
    }
}

impl AddAssign<u64> for SequenceNumber {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

/// A point in simulated time.
///
/// One tick is the smallest unit of time the [simulation](crate::simulation) distinguishes. All
/// periods, latencies and timeouts are expressed as a number of ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(u64);

impl Tick {
    /// Create a new `Tick` with an `int` value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the `u64` value of this `Tick`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Number of ticks elapsed between `earlier` and `self`, or 0 if `earlier` is later than `self`.
    pub const fn saturating_since(&self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Display for Tick {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for Tick {
    type Output = Tick;
    fn add(self, rhs: u64) -> Self::Output {
        Tick::new(self.0.saturating_add(rhs))
    }
}

/// Correlation id of a request/response pair (an index add request, a heartbeat, or a gradient
/// exchange).
///
/// Request ids are random (version 4) UUIDs. They are drawn from the generating peer's seeded random
/// number generator so that a simulation run can be reproduced exactly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct RequestId([u8; 16]);

impl RequestId {
    /// Draw a new random `RequestId` from `rng`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let uuid = Builder::from_random_bytes(rng.gen()).into_uuid();
        Self(*uuid.as_bytes())
    }

    /// Create a new `RequestId` wrapping `bytes`.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 16]` value of this `RequestId`.
    pub const fn bytes(&self) -> [u8; 16] {
        self.0
    }
}

impl From<Uuid> for RequestId {
    fn from(value: Uuid) -> Self {
        Self(*value.as_bytes())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&Uuid::from_bytes(self.0).hyphenated(), f)
    }
}

impl Debug for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn request_ids_are_reproducible_from_a_seed() {
        let mut first = StdRng::seed_from_u64(7);
        let mut second = StdRng::seed_from_u64(7);

        let ids: Vec<RequestId> = (0..4).map(|_| RequestId::random(&mut first)).collect();
        let again: Vec<RequestId> = (0..4).map(|_| RequestId::random(&mut second)).collect();
        assert_eq!(ids, again);
        assert_ne!(ids[0], ids[1]);

        let uuid = Uuid::from_bytes(ids[0].bytes());
        assert_eq!(uuid.get_version_num(), 4);
    }

    #[test]
    fn tick_arithmetic_saturates() {
        let start = Tick::new(10);
        assert_eq!((start + 5).int(), 15);
        assert_eq!(Tick::new(15).saturating_since(start), 5);
        assert_eq!(start.saturating_since(Tick::new(15)), 0);
    }
}
