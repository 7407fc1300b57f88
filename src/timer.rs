/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable one-shot timers.
//!
//! Waiting for a reply is never a blocking call. A protocol that expects a reply stores the request
//! under its [`RequestId`](crate::types::data_types::RequestId), schedules a [`Timeout`] carrying the
//! same id, and returns. Whichever of the reply and the timeout is delivered first drives a separate,
//! later invocation. A timeout whose request is no longer outstanding is ignored, which is how a
//! successful reply cancels its timeout.

use crate::{
    gradient::messages::ExchangeTimeout, index_add::messages::IndexAddTimeout,
    leader_election::messages::HeartbeatTimeout,
};

/// Trait for the timer service that delivers [`Timeout`]s back to the peer that scheduled them.
pub trait Timer: Clone {
    /// Schedule `timeout` to be delivered back to this peer after `delay` ticks.
    fn schedule(&mut self, delay: u64, timeout: Timeout);
}

/// All timeout variants used by the protocols of a peer.
#[derive(Clone, Debug)]
pub enum Timeout {
    /// See: [`ExchangeTimeout`].
    ExchangeTimeout(ExchangeTimeout),

    /// See: [`HeartbeatTimeout`].
    HeartbeatTimeout(HeartbeatTimeout),

    /// See: [`IndexAddTimeout`].
    IndexAddTimeout(IndexAddTimeout),
}

impl From<ExchangeTimeout> for Timeout {
    fn from(value: ExchangeTimeout) -> Self {
        Timeout::ExchangeTimeout(value)
    }
}

impl From<HeartbeatTimeout> for Timeout {
    fn from(value: HeartbeatTimeout) -> Self {
        Timeout::HeartbeatTimeout(value)
    }
}

impl From<IndexAddTimeout> for Timeout {
    fn from(value: IndexAddTimeout) -> Self {
        Timeout::IndexAddTimeout(value)
    }
}

/// Handle for scheduling instances of any type that implement [`Into<Timeout>`] on a [`Timer`].
#[derive(Clone)]
pub(crate) struct TimerHandle<T: Timer> {
    timer: T,
}

impl<T: Timer> TimerHandle<T> {
    pub(crate) fn new(timer: T) -> Self {
        Self { timer }
    }

    pub(crate) fn schedule<S: Into<Timeout>>(&mut self, delay: u64, timeout: S) {
        self.timer.schedule(delay, timeout.into())
    }
}
