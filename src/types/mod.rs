/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple protocols or components of a peer.
//!
//! Types specific to a single protocol can be found in the `messages` submodule of that protocol,
//! e.g., [`crate::gradient::messages`].

pub mod data_types;

pub mod peer_address;
