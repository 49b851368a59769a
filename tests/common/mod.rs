/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use hnsw_neighbors::{
    HnswResult, NeighborArray, NeighborSimilarity, NodeId, ScoreFunction,
};

/// A similarity provider backed by an explicit table of pairwise scores.
///
/// Lookups are symmetric; pairs absent from the table score `0.0`.
pub struct TableSimilarity {
    scores: HashMap<(NodeId, NodeId), f32>,
}

impl TableSimilarity {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((NodeId, NodeId), f32)>,
    {
        Self {
            scores: entries.into_iter().collect(),
        }
    }

    /// Every distinct pair scores `0.0` (all edges diverse).
    pub fn zero() -> Self {
        Self::new([])
    }

    fn lookup(&self, a: NodeId, b: NodeId) -> f32 {
        self.scores
            .get(&(a, b))
            .or_else(|| self.scores.get(&(b, a)))
            .copied()
            .unwrap_or(0.0)
    }
}

impl NeighborSimilarity for TableSimilarity {
    type Scorer<'a> = TableScorer<'a>;

    fn score_provider(&self, node1: NodeId) -> HnswResult<Self::Scorer<'_>> {
        Ok(TableScorer {
            table: self,
            anchor: node1,
        })
    }
}

pub struct TableScorer<'a> {
    table: &'a TableSimilarity,
    anchor: NodeId,
}

impl ScoreFunction for TableScorer<'_> {
    fn apply(&mut self, node: NodeId) -> HnswResult<f32> {
        Ok(self.table.lookup(self.anchor, node))
    }
}

/// Build a descending-ordered candidate array from literal entries.
pub fn descending(entries: &[(NodeId, f32)]) -> NeighborArray {
    let mut array = NeighborArray::new(entries.len(), true);
    for &(node, score) in entries {
        array.add_in_order(node, score).unwrap();
    }
    array
}
