//! NEAT genome: an ordered set of connection genes keyed by innovation id.
//!
//! The [`Genome`] stores its genes in a `BTreeMap`, so iteration always runs
//! in innovation order. That order is what crossover and compatibility
//! distance align on, and it fixes the summation order of compiled networks.
//!
//! Structural mutations draw innovation ids from the population's
//! [`InnovationLedger`], which is passed in explicitly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::trace;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::NeatConfig;
use crate::gene::{Gene, InnovationId, NodeId, NodeKind};
use crate::innovation::InnovationLedger;
use crate::topology::GraphTopology;

/// A NEAT genome describing one candidate feed-forward network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genome {
    input_count: usize,
    output_count: usize,
    genes: BTreeMap<InnovationId, Gene>,
    /// Fitness assigned by the evaluator, later shared within the species.
    pub fitness: f64,
}

impl Genome {
    /// Create a genome connecting every input to every output.
    ///
    /// Gene ids come from `ledger`; weights are drawn from
    /// `[-weight_range, weight_range]`.
    ///
    /// # Panics
    ///
    /// Panics if `input_count` or `output_count` is zero.
    pub fn fully_connected<R: Rng>(
        input_count: usize,
        output_count: usize,
        ledger: &mut InnovationLedger,
        weight_range: f64,
        rng: &mut R,
    ) -> Self {
        assert!(
            input_count > 0 && output_count > 0,
            "genome needs at least one input and one output"
        );

        let mut genome = Self {
            input_count,
            output_count,
            genes: BTreeMap::new(),
            fitness: 0.0,
        };

        for input in 0..input_count {
            for output in input_count..input_count + output_count {
                let weight = random_weight(weight_range, rng);
                genome.insert_gene(ledger, input, output, weight);
            }
        }

        genome
    }

    /// Build a genome from explicit genes.
    ///
    /// # Panics
    ///
    /// Panics if `genes` is empty, if two genes share an innovation id, if a
    /// gene starts at an output node or if a gene ends at an input node.
    pub fn from_genes(
        input_count: usize,
        output_count: usize,
        genes: impl IntoIterator<Item = Gene>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for gene in genes {
            assert_ne!(
                NodeKind::of(gene.source(), input_count, output_count),
                NodeKind::Output,
                "gene {} starts at output node {}",
                gene.innovation(),
                gene.source()
            );
            assert_ne!(
                NodeKind::of(gene.target(), input_count, output_count),
                NodeKind::Input,
                "gene {} ends at input node {}",
                gene.innovation(),
                gene.target()
            );
            let previous = map.insert(gene.innovation(), gene);
            assert!(
                previous.is_none(),
                "duplicate innovation id {}",
                gene.innovation()
            );
        }
        assert!(!map.is_empty(), "genome must contain at least one gene");

        Self {
            input_count,
            output_count,
            genes: map,
            fitness: 0.0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn input_count(&self) -> usize {
        self.input_count
    }

    #[inline]
    #[must_use]
    pub const fn output_count(&self) -> usize {
        self.output_count
    }

    /// Genes in ascending innovation order.
    pub fn genes(&self) -> impl Iterator<Item = &Gene> + '_ {
        self.genes.values()
    }

    /// Gene with the given innovation id.
    #[must_use]
    pub fn gene(&self, innovation: InnovationId) -> Option<&Gene> {
        self.genes.get(&innovation)
    }

    /// Mutable access to the weight and enabled flag of a gene.
    pub fn gene_mut(&mut self, innovation: InnovationId) -> Option<&mut Gene> {
        self.genes.get_mut(&innovation)
    }

    #[must_use]
    pub fn contains(&self, innovation: InnovationId) -> bool {
        self.genes.contains_key(&innovation)
    }

    /// Number of genes, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Get the number of enabled genes.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.genes.values().filter(|g| g.enabled).count()
    }

    /// Highest innovation id in this genome.
    ///
    /// # Panics
    ///
    /// Panics if the genome has no genes.
    #[must_use]
    pub fn max_innovation(&self) -> InnovationId {
        match self.genes.keys().next_back() {
            Some(&innovation) => innovation,
            None => panic!("genome must contain at least one gene"),
        }
    }

    /// Role of `node` in this genome.
    #[inline]
    #[must_use]
    pub fn node_kind(&self, node: NodeId) -> NodeKind {
        NodeKind::of(node, self.input_count, self.output_count)
    }

    /// Every node id referenced by a gene.
    #[must_use]
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.genes
            .values()
            .flat_map(|g| [g.source(), g.target()])
            .collect()
    }

    /// Number of distinct nodes referenced by the genes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_ids().len()
    }

    /// Get all hidden node ids, ascending.
    #[must_use]
    pub fn hidden_ids(&self) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|&node| self.node_kind(node) == NodeKind::Hidden)
            .collect()
    }

    /// Largest node id referenced by a gene.
    ///
    /// # Panics
    ///
    /// Panics if the genome has no genes.
    #[must_use]
    pub fn max_node_id(&self) -> NodeId {
        match self
            .genes
            .values()
            .map(|g| g.source().max(g.target()))
            .max()
        {
            Some(node) => node,
            None => panic!("genome must contain at least one gene"),
        }
    }

    /// Smallest hidden node id not referenced by any gene.
    ///
    /// The search starts at `input_count + output_count`: input and output
    /// ids are reserved even when no gene references them. Gaps left in the
    /// hidden id range are reused before growing past the largest id.
    #[must_use]
    pub fn first_available_node_id(&self) -> NodeId {
        let mut candidate = self.input_count + self.output_count;
        for &node in self.node_ids().range(candidate..) {
            if node != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    /// Add a uniform offset from `[-range, range]` to a random gene's weight.
    ///
    /// Returns the innovation id of the mutated gene.
    pub fn perturb_weight<R: Rng>(&mut self, range: f64, rng: &mut R) -> InnovationId {
        let innovation = self.random_innovation(rng);
        let offset = random_weight(range, rng);
        if let Some(gene) = self.genes.get_mut(&innovation) {
            gene.weight += offset;
        }
        innovation
    }

    /// Replace a random gene's weight with a fresh value from `[-range, range]`.
    ///
    /// Returns the innovation id of the mutated gene.
    pub fn reset_weight<R: Rng>(&mut self, range: f64, rng: &mut R) -> InnovationId {
        let innovation = self.random_innovation(rng);
        let weight = random_weight(range, rng);
        if let Some(gene) = self.genes.get_mut(&innovation) {
            gene.weight = weight;
        }
        innovation
    }

    /// Reset one weight with probability `set_weight_chance`, otherwise perturb one.
    pub fn mutate_weight<R: Rng>(&mut self, config: &NeatConfig, rng: &mut R) -> InnovationId {
        if rng.random::<f64>() < config.set_weight_chance {
            self.reset_weight(config.weight_range, rng)
        } else {
            self.perturb_weight(config.perturbation_range, rng)
        }
    }

    /// Add a random legal connection.
    ///
    /// Returns `None` when the network is already maximally connected: every
    /// remaining pair would duplicate an edge, close a cycle, leave an output
    /// or enter an input.
    pub fn add_connection<R: Rng>(
        &mut self,
        ledger: &mut InnovationLedger,
        weight_range: f64,
        rng: &mut R,
    ) -> Option<InnovationId> {
        let (source, target) = GraphTopology::from_genome(self).random_new_connection(rng)?;
        let weight = random_weight(weight_range, rng);
        let innovation = self.insert_gene(ledger, source, target, weight);
        trace!("add connection {source} -> {target} (innovation {innovation})");
        Some(innovation)
    }

    /// Split a random enabled connection with a new hidden node.
    ///
    /// The original connection is disabled, and two new connections are created:
    /// source -> new_node (weight 1.0) and new_node -> target (original weight).
    ///
    /// Returns the new node id, or `None` if no gene is enabled.
    pub fn add_node<R: Rng>(
        &mut self,
        ledger: &mut InnovationLedger,
        rng: &mut R,
    ) -> Option<NodeId> {
        let enabled: Vec<InnovationId> = self
            .genes
            .values()
            .filter(|g| g.enabled)
            .map(Gene::innovation)
            .collect();
        let &split = enabled.choose(rng)?;

        let node = self.first_available_node_id();
        let gene = self.genes.get_mut(&split)?;
        gene.enabled = false;
        let (source, target, weight) = (gene.source(), gene.target(), gene.weight);

        self.insert_gene(ledger, source, node, 1.0);
        self.insert_gene(ledger, node, target, weight);
        trace!("add node {node} splitting {source} -> {target}");
        Some(node)
    }

    /// Enable a random gene. Already enabled genes stay enabled.
    ///
    /// Returns the innovation id of the chosen gene.
    pub fn enable_random_connection<R: Rng>(&mut self, rng: &mut R) -> InnovationId {
        let innovation = self.random_innovation(rng);
        if let Some(gene) = self.genes.get_mut(&innovation) {
            gene.enabled = true;
        }
        innovation
    }

    /// Apply one round of mutation.
    ///
    /// Weight, add-connection, add-node and re-enable mutations each roll
    /// independently against their configured chance, in that order.
    pub fn mutate<R: Rng>(
        &mut self,
        config: &NeatConfig,
        ledger: &mut InnovationLedger,
        rng: &mut R,
    ) {
        if rng.random::<f64>() < config.weight_mutation_chance {
            self.mutate_weight(config, rng);
        }
        if rng.random::<f64>() < config.add_connection_mutation_chance {
            self.add_connection(ledger, config.weight_range, rng);
        }
        if rng.random::<f64>() < config.add_node_mutation_chance {
            self.add_node(ledger, rng);
        }
        if rng.random::<f64>() < config.enable_connection_mutation_chance {
            self.enable_random_connection(rng);
        }
    }

    /// NEAT crossover with `self` as the fitter parent.
    ///
    /// Matching genes come from either parent with equal probability;
    /// disjoint and excess genes come from `self` only. Each inherited gene is
    /// then force-enabled with probability `enable_gene_chance`.
    ///
    /// # Panics
    ///
    /// Panics if the parents differ in input or output count.
    #[must_use]
    pub fn crossover<R: Rng>(&self, other: &Self, enable_gene_chance: f64, rng: &mut R) -> Self {
        assert_eq!(
            (self.input_count, self.output_count),
            (other.input_count, other.output_count),
            "crossover parents must have the same inputs and outputs"
        );

        let mut genes = BTreeMap::new();
        for (&innovation, gene) in &self.genes {
            let mut inherited = match other.genes.get(&innovation) {
                Some(other_gene) if rng.random::<f64>() >= 0.5 => *other_gene,
                _ => *gene,
            };
            if rng.random::<f64>() < enable_gene_chance {
                inherited.enabled = true;
            }
            genes.insert(innovation, inherited);
        }

        Self {
            input_count: self.input_count,
            output_count: self.output_count,
            genes,
            fitness: 0.0,
        }
    }

    /// Compatibility distance for speciation.
    ///
    /// Ids below the smaller of the two maximum innovation ids are compared:
    /// ids present in one genome only are disjoint, ids present in both are
    /// matching. The id equal to that smaller maximum is not compared. Excess is the gap between the two maxima. Both counts are
    /// normalised by the larger gene count.
    ///
    /// # Panics
    ///
    /// Panics if either genome has no genes.
    #[must_use]
    pub fn compatibility_distance(&self, other: &Self, c1: f64, c2: f64, c3: f64) -> f64 {
        let self_max = self.max_innovation();
        let other_max = other.max_innovation();
        let shared_max = self_max.min(other_max);

        let mut matching = 0usize;
        let mut disjoint = 0usize;
        let mut weight_diff_sum = 0.0;

        for (innovation, gene) in self.genes.range(..shared_max) {
            match other.genes.get(innovation) {
                Some(other_gene) => {
                    matching += 1;
                    weight_diff_sum += (gene.weight - other_gene.weight).abs();
                }
                None => disjoint += 1,
            }
        }
        disjoint += other
            .genes
            .range(..shared_max)
            .filter(|(innovation, _)| !self.genes.contains_key(*innovation))
            .count();

        let excess = self_max.abs_diff(other_max);
        let n = self.genes.len().max(other.genes.len()) as f64;
        let avg_weight_diff = if matching > 0 {
            weight_diff_sum / matching as f64
        } else {
            0.0
        };

        c1 * excess as f64 / n + c2 * disjoint as f64 / n + c3 * avg_weight_diff
    }

    fn insert_gene(
        &mut self,
        ledger: &mut InnovationLedger,
        source: NodeId,
        target: NodeId,
        weight: f64,
    ) -> InnovationId {
        let innovation = ledger.innovation_for(source, target);
        self.genes
            .insert(innovation, Gene::new(source, target, innovation, weight));
        innovation
    }

    fn random_innovation<R: Rng>(&self, rng: &mut R) -> InnovationId {
        assert!(!self.genes.is_empty(), "genome must contain at least one gene");
        let index = rng.random_range(0..self.genes.len());
        match self.genes.keys().nth(index) {
            Some(&innovation) => innovation,
            None => unreachable!("index drawn below the gene count"),
        }
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for gene in self.genes.values() {
            write!(f, "{}--[{}]->{}", gene.source(), gene.weight, gene.target())?;
            if !gene.enabled {
                write!(f, " (disabled)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Uniform value in `[-range, range]`.
fn random_weight<R: Rng>(range: f64, rng: &mut R) -> f64 {
    rng.random::<f64>() * 2.0 * range - range
}
