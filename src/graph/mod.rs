/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The concurrent per-node adjacency structure.

mod neighbor_set;
pub use neighbor_set::{ConcurrentNeighborSet, NodeIterator, SelfLoop};

mod score_cache;
pub(crate) use score_cache::ScoreCache;
