//! Innovation bookkeeping for NEAT.
//!
//! Crossover aligns genes by innovation id, so two genomes that independently
//! grow the same edge must tag it with the same id. The [`InnovationLedger`]
//! records every `(source, target)` pair ever assigned and hands the recorded
//! id back on later requests.
//!
//! The ledger lives for the whole run. It is not reset between generations,
//! so an edge rediscovered many generations later still maps to its first id.

use std::collections::HashMap;

use log::trace;

use crate::gene::{InnovationId, NodeId};

/// Run-long table mapping structural edges to innovation ids.
///
/// Owned by the population and passed by `&mut` into every operation that
/// may create genes.
#[derive(Debug, Clone, Default)]
pub struct InnovationLedger {
    next_innovation: InnovationId,
    records: HashMap<(NodeId, NodeId), InnovationId>,
}

impl InnovationLedger {
    /// Create an empty ledger. The first id handed out is `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the innovation id for `source -> target`, assigning the next
    /// free id if this edge has never been seen.
    pub fn innovation_for(&mut self, source: NodeId, target: NodeId) -> InnovationId {
        if let Some(&innovation) = self.records.get(&(source, target)) {
            return innovation;
        }

        let innovation = self.next_innovation;
        self.next_innovation += 1;
        self.records.insert((source, target), innovation);
        trace!("new innovation {innovation}: {source} -> {target}");
        innovation
    }

    /// Innovation id already recorded for `source -> target`, if any.
    #[must_use]
    pub fn get(&self, source: NodeId, target: NodeId) -> Option<InnovationId> {
        self.records.get(&(source, target)).copied()
    }

    /// The id the next new edge will receive.
    #[must_use]
    pub const fn next_innovation(&self) -> InnovationId {
        self.next_innovation
    }

    /// Number of recorded edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
