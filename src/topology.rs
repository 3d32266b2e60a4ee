//! Graph view of a genome.
//!
//! [`GraphTopology`] is rebuilt from a genome whenever its structure has to
//! be inspected: to pick a legal new connection, to check ancestry, or to
//! compute the order in which a compiled network evaluates its nodes.
//!
//! Disabled genes stay in the graph with an infinite weight. They still
//! block duplicate edges and still count as ancestry links, so a disabled
//! edge can never be re-added or closed into a cycle.
//!
//! All traversals are iterative with explicit stacks, so deep topologies do
//! not grow the call stack.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::Rng;

use crate::gene::NodeId;
use crate::genome::Genome;

/// An incoming edge of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomingEdge {
    /// Node the edge comes from.
    pub source: NodeId,
    /// Gene weight, or `f64::INFINITY` if the gene is disabled.
    pub weight: f64,
}

impl IncomingEdge {
    /// Whether the underlying gene is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.weight.is_finite()
    }
}

/// Snapshot of a genome's graph, keyed by incoming edges.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    inputs: BTreeSet<NodeId>,
    outputs: BTreeSet<NodeId>,
    /// Inputs, outputs and every node referenced by a gene.
    nodes: BTreeSet<NodeId>,
    /// `target -> [(source, weight)]`. Every node has an entry.
    incoming: BTreeMap<NodeId, Vec<IncomingEdge>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl GraphTopology {
    /// Build the graph of a genome, including disabled genes.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let input_count = genome.input_count();
        let output_count = genome.output_count();

        let inputs: BTreeSet<NodeId> = (0..input_count).collect();
        let outputs: BTreeSet<NodeId> = (input_count..input_count + output_count).collect();
        let mut nodes: BTreeSet<NodeId> = inputs.union(&outputs).copied().collect();
        let mut incoming: BTreeMap<NodeId, Vec<IncomingEdge>> =
            nodes.iter().map(|&node| (node, Vec::new())).collect();

        for gene in genome.genes() {
            nodes.insert(gene.source());
            nodes.insert(gene.target());
            incoming.entry(gene.source()).or_default();
            incoming.entry(gene.target()).or_default().push(IncomingEdge {
                source: gene.source(),
                weight: if gene.enabled {
                    gene.weight
                } else {
                    f64::INFINITY
                },
            });
        }

        Self {
            inputs,
            outputs,
            nodes,
            incoming,
        }
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &BTreeSet<NodeId> {
        &self.inputs
    }

    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &BTreeSet<NodeId> {
        &self.outputs
    }

    /// Number of nodes in the graph.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Incoming edges of `node`, in innovation order. Empty for unknown nodes.
    #[must_use]
    pub fn incoming(&self, node: NodeId) -> &[IncomingEdge] {
        self.incoming.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether a gene `source -> target` exists, enabled or not.
    #[must_use]
    pub fn connection_exists(&self, source: NodeId, target: NodeId) -> bool {
        self.incoming(target).iter().any(|edge| edge.source == source)
    }

    /// Every node with a path into `node`.
    #[must_use]
    pub fn ancestors(&self, node: NodeId) -> BTreeSet<NodeId> {
        let mut ancestors = BTreeSet::new();
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            for edge in self.incoming(current) {
                if ancestors.insert(edge.source) {
                    stack.push(edge.source);
                }
            }
        }

        ancestors
    }

    /// Check if adding an edge from `source` to `target` would create a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, source: NodeId, target: NodeId) -> bool {
        source == target || self.ancestors(source).contains(&target)
    }

    /// Pick a random legal new connection.
    ///
    /// Sources are non-output nodes. For a source, targets are non-input
    /// nodes other than the source and its ancestors. Pairs that already
    /// have a gene are eliminated one at a time until a free pair is found.
    ///
    /// Returns `None` when no legal pair is left.
    pub fn random_new_connection<R: Rng>(&self, rng: &mut R) -> Option<(NodeId, NodeId)> {
        let mut sources: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|node| !self.outputs.contains(node))
            .collect();

        while !sources.is_empty() {
            let index = rng.random_range(0..sources.len());
            let source = sources[index];
            if let Some(target) = self.random_new_target(source, rng) {
                return Some((source, target));
            }
            sources.remove(index);
        }

        None
    }

    fn random_new_target<R: Rng>(&self, source: NodeId, rng: &mut R) -> Option<NodeId> {
        let ancestors = self.ancestors(source);
        let mut targets: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|&node| {
                node != source && !self.inputs.contains(&node) && !ancestors.contains(&node)
            })
            .collect();

        while !targets.is_empty() {
            let index = rng.random_range(0..targets.len());
            let target = targets[index];
            if !self.connection_exists(source, target) {
                return Some(target);
            }
            targets.remove(index);
        }

        None
    }

    /// Order in which nodes can be evaluated.
    ///
    /// Depth-first post-order over incoming edges, seeded at every output in
    /// ascending id order. A node is emitted once all of its sources have
    /// been emitted. Outputs are held back and appended last, ascending.
    /// Nodes no output depends on are visited after the outputs' trees so
    /// the order covers the whole graph.
    ///
    /// Returns `None` if the graph contains a cycle.
    #[must_use]
    pub fn evaluation_order(&self) -> Option<Vec<NodeId>> {
        let mut marks: HashMap<NodeId, Mark> = self
            .nodes
            .iter()
            .map(|&node| (node, Mark::Unvisited))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        let seeds = self.outputs.iter().chain(
            self.nodes
                .iter()
                .filter(|node| !self.outputs.contains(*node)),
        );

        for &seed in seeds {
            if marks.get(&seed) != Some(&Mark::Unvisited) {
                continue;
            }

            // (node, position of the next incoming edge to follow)
            let mut stack: Vec<(NodeId, usize)> = vec![(seed, 0)];
            marks.insert(seed, Mark::InProgress);

            while let Some(frame) = stack.last_mut() {
                let (node, position) = *frame;
                match self.incoming(node).get(position) {
                    Some(edge) => {
                        frame.1 += 1;
                        match marks.get(&edge.source).copied() {
                            Some(Mark::Unvisited) => {
                                marks.insert(edge.source, Mark::InProgress);
                                stack.push((edge.source, 0));
                            }
                            Some(Mark::InProgress) => return None,
                            Some(Mark::Done) | None => {}
                        }
                    }
                    None => {
                        stack.pop();
                        marks.insert(node, Mark::Done);
                        if !self.outputs.contains(&node) {
                            order.push(node);
                        }
                    }
                }
            }
        }

        order.extend(self.outputs.iter().copied());
        Some(order)
    }

    /// Detect if the graph contains any cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.evaluation_order().is_none()
    }

    /// Group the evaluation order into layers.
    ///
    /// Walking the evaluation order, a node opens a new layer when it depends
    /// on a node of the current last layer and joins that layer otherwise.
    ///
    /// Returns `None` if the graph contains a cycle.
    #[must_use]
    pub fn layers(&self) -> Option<Vec<Vec<NodeId>>> {
        let order = self.evaluation_order()?;
        let mut layers: Vec<Vec<NodeId>> = vec![Vec::new()];

        for node in order {
            let ancestors = self.ancestors(node);
            let depends_on_last = layers
                .last()
                .is_some_and(|layer| layer.iter().any(|n| ancestors.contains(n)));
            if depends_on_last {
                layers.push(vec![node]);
            } else if let Some(layer) = layers.last_mut() {
                layer.push(node);
            }
        }

        Some(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::Gene;
    use crate::innovation::InnovationLedger;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn position(order: &[NodeId], node: NodeId) -> usize {
        order
            .iter()
            .position(|&n| n == node)
            .expect("node should be in the order")
    }

    #[test]
    fn test_topology_basic() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);

        let topo = GraphTopology::from_genome(&genome);

        // 2 inputs + 1 output = 3 nodes
        assert_eq!(topo.node_count(), 3);
        assert_eq!(topo.incoming(2).len(), 2);
        assert!(topo.incoming(0).is_empty());
        assert!(!topo.has_cycle());
    }

    #[test]
    fn test_disabled_edges_stay_in_graph() {
        let mut genome = Genome::from_genes(1, 1, [Gene::new(0, 1, 0, 0.5)]);
        genome.gene_mut(0).unwrap().enabled = false;

        let topo = GraphTopology::from_genome(&genome);
        assert!(topo.connection_exists(0, 1));
        assert_eq!(topo.incoming(1)[0].weight, f64::INFINITY);
        assert!(!topo.incoming(1)[0].is_enabled());
        assert!(topo.ancestors(1).contains(&0));
    }

    #[test]
    fn test_ancestors_follow_chains() {
        // 0 -> 3 -> 4 -> 2, 1 -> 2
        let genome = Genome::from_genes(
            2,
            1,
            [
                Gene::new(0, 3, 0, 1.0),
                Gene::new(3, 4, 1, 1.0),
                Gene::new(4, 2, 2, 1.0),
                Gene::new(1, 2, 3, 1.0),
            ],
        );
        let topo = GraphTopology::from_genome(&genome);

        assert_eq!(topo.ancestors(4), BTreeSet::from([0, 3]));
        assert_eq!(topo.ancestors(2), BTreeSet::from([0, 1, 3, 4]));
        assert!(topo.ancestors(0).is_empty());
    }

    #[test]
    fn test_would_create_cycle() {
        let genome = Genome::from_genes(
            1,
            1,
            [
                Gene::new(0, 2, 0, 1.0),
                Gene::new(2, 3, 1, 1.0),
                Gene::new(3, 1, 2, 1.0),
            ],
        );
        let topo = GraphTopology::from_genome(&genome);

        assert!(topo.would_create_cycle(3, 2));
        assert!(topo.would_create_cycle(2, 2));
        assert!(!topo.would_create_cycle(2, 1));
        assert!(!topo.would_create_cycle(0, 3));
    }

    #[test]
    fn test_no_new_connection_when_saturated() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(3, 2, &mut ledger, 1.0, &mut rng);

        let topo = GraphTopology::from_genome(&genome);
        assert_eq!(topo.random_new_connection(&mut rng), None);
    }

    #[test]
    fn test_new_connection_is_legal() {
        // 0 -> 2 -> 3 -> 1 plus 0 -> 1. The only free legal pairs are 0 -> 3 and 2 -> 1.
        let genome = Genome::from_genes(
            1,
            1,
            [
                Gene::new(0, 2, 0, 1.0),
                Gene::new(2, 3, 1, 1.0),
                Gene::new(3, 1, 2, 1.0),
                Gene::new(0, 1, 3, 1.0),
            ],
        );
        let topo = GraphTopology::from_genome(&genome);
        let mut rng = test_rng();

        for _ in 0..20 {
            let (source, target) = topo
                .random_new_connection(&mut rng)
                .expect("two legal pairs remain");
            assert!(
                (source, target) == (0, 3) || (source, target) == (2, 1),
                "unexpected pair {source} -> {target}"
            );
        }
    }

    #[test]
    fn test_evaluation_order_respects_edges() {
        let genome = Genome::from_genes(
            2,
            2,
            [
                Gene::new(0, 5, 0, 1.0),
                Gene::new(5, 4, 1, 1.0),
                Gene::new(4, 2, 2, 1.0),
                Gene::new(1, 3, 3, 1.0),
                Gene::new(5, 3, 4, 1.0),
                Gene::new(1, 4, 5, 1.0),
            ],
        );
        let topo = GraphTopology::from_genome(&genome);
        let order = topo.evaluation_order().expect("acyclic");

        assert_eq!(order.len(), topo.node_count());
        for gene in genome.genes() {
            assert!(position(&order, gene.source()) < position(&order, gene.target()));
        }
        // Outputs last, ascending.
        assert_eq!(&order[order.len() - 2..], &[2, 3]);
    }

    #[test]
    fn test_evaluation_order_post_order_from_first_output() {
        // Output 1 depends on 2, which depends on 0.
        let genome = Genome::from_genes(1, 1, [Gene::new(0, 2, 0, 1.0), Gene::new(2, 1, 1, 1.0)]);
        let topo = GraphTopology::from_genome(&genome);
        assert_eq!(topo.evaluation_order(), Some(vec![0, 2, 1]));
    }

    #[test]
    fn test_cycle_detected() {
        let genome = Genome::from_genes(
            1,
            1,
            [
                Gene::new(0, 2, 0, 1.0),
                Gene::new(2, 3, 1, 1.0),
                Gene::new(3, 2, 2, 1.0),
                Gene::new(3, 1, 3, 1.0),
            ],
        );
        let topo = GraphTopology::from_genome(&genome);
        assert!(topo.has_cycle());
        assert_eq!(topo.evaluation_order(), None);
        assert_eq!(topo.layers(), None);
    }

    #[test]
    fn test_layers() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let mut genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);

        let topo = GraphTopology::from_genome(&genome);
        assert_eq!(topo.layers(), Some(vec![vec![0, 1], vec![2]]));

        genome.add_node(&mut ledger, &mut rng);
        let layers = GraphTopology::from_genome(&genome)
            .layers()
            .expect("acyclic");
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1], vec![3]);
        assert_eq!(layers[2], vec![2]);
    }
}
