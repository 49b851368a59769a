/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use hashbrown::HashMap;

use crate::{HnswResult, NodeId, ScoreFunction};

/// Memoizes pairwise scores over a single pruning pass.
///
/// Diversity pruning revisits the same node pairs repeatedly; the cache
/// avoids redundant similarity calls (each of which may load a vector).
/// One cache is owned by one pass, used single-threaded, and discarded
/// afterwards.
///
/// Keys are deliberately asymmetric: the node whose bound scorer the
/// caller holds goes in the high half. Callers must anchor consistently
/// per scorer.
#[derive(Debug, Default)]
pub(crate) struct ScoreCache {
    scores: HashMap<u64, f32>,
}

impl ScoreCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the memoized score for `(node, other)`, computing it
    /// through `scorer` (which must be bound to `node`) on a miss.
    pub(crate) fn get<F>(
        &mut self,
        node: NodeId,
        other: NodeId,
        scorer: &mut F,
    ) -> HnswResult<f32>
    where
        F: ScoreFunction,
    {
        let key = (u64::from(node) << 32) | u64::from(other);
        if let Some(&score) = self.scores.get(&key) {
            return Ok(score);
        }
        let score = scorer.apply(other)?;
        self.scores.insert(key, score);
        Ok(score)
    }
}

///////////
// Tests //
///////////
