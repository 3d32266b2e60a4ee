//! Gene types for NEAT genomes.
//!
//! A genome is a set of [`Gene`]s, one per directed connection. Nodes have no
//! record of their own: a node exists because some gene references its id,
//! and its role ([`NodeKind`]) follows from where the id falls relative to the
//! genome's input and output counts.

use serde::{Deserialize, Serialize};

/// Identifier of a node within a genome.
///
/// `[0, inputs)` are inputs, `[inputs, inputs + outputs)` are outputs and
/// every other id is a hidden node.
pub type NodeId = usize;

/// Identifier shared by every gene that represents the same structural edge.
pub type InnovationId = usize;

/// The role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Receives external values, no activation applied.
    Input,
    /// Produces the network output.
    Output,
    /// Internal node added through mutation.
    Hidden,
}

impl NodeKind {
    /// Classify a node id for a genome with the given input and output counts.
    #[inline]
    #[must_use]
    pub fn of(node: NodeId, input_count: usize, output_count: usize) -> Self {
        if node < input_count {
            Self::Input
        } else if node < input_count + output_count {
            Self::Output
        } else {
            Self::Hidden
        }
    }
}

/// A connection gene: a weighted, directed edge between two nodes.
///
/// The endpoints and innovation id are fixed at creation. Only `enabled` and
/// `weight` change afterwards, written by mutation and crossover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    source: NodeId,
    target: NodeId,
    innovation: InnovationId,
    /// Whether this connection is active.
    /// Disabled connections are skipped during evaluation but preserved for crossover.
    pub enabled: bool,
    /// The connection weight.
    pub weight: f64,
}

impl Gene {
    /// Create a new enabled connection.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId, innovation: InnovationId, weight: f64) -> Self {
        Self {
            source,
            target,
            innovation,
            enabled: true,
            weight,
        }
    }

    /// Node this connection reads from.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> NodeId {
        self.source
    }

    /// Node this connection feeds into.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    #[inline]
    #[must_use]
    pub const fn innovation(&self) -> InnovationId {
        self.innovation
    }
}
