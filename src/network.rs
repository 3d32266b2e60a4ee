//! Feed-forward evaluation of NEAT genomes.
//!
//! A [`CompiledNetwork`] is built once per genome and can be evaluated any
//! number of times without allocating. Nodes are laid out densely: inputs
//! first in id order, hidden nodes in evaluation order, outputs last in id
//! order. Incoming connections are stored in Compressed Sparse Row (CSR)
//! form so each node's weighted sum walks contiguous memory.

use std::collections::HashMap;

use crate::activation::steepened_sigmoid;
use crate::gene::NodeId;
use crate::genome::Genome;
use crate::topology::GraphTopology;

/// A compiled, evaluation-ready representation of a NEAT genome.
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    input_count: usize,
    output_count: usize,
    /// Node values, indexed densely.
    values: Vec<f64>,
    // For node i, incoming connections are at indices [csr_offsets[i]..csr_offsets[i+1]).
    /// CSR: offsets into csr_sources/csr_weights for each node (len = num_nodes + 1).
    csr_offsets: Vec<usize>,
    /// CSR: dense source index of every enabled connection.
    csr_sources: Vec<usize>,
    /// CSR: weights, parallel to csr_sources.
    csr_weights: Vec<f64>,
}

/// Error type for network compilation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The genome's graph has a cycle, so no evaluation order exists.
    #[error("genome contains cycles; feed-forward evaluation requires an acyclic graph")]
    CyclicGenome,
}

impl CompiledNetwork {
    /// Compile a genome.
    ///
    /// # Panics
    ///
    /// Panics if the genome contains cycles. Use [`try_new`](Self::try_new)
    /// for non-panicking construction.
    #[must_use]
    pub fn new(genome: &Genome) -> Self {
        Self::try_new(genome).expect("genome contains cycles; use try_new()")
    }

    /// Try to compile a genome.
    ///
    /// Only enabled genes become connections. Each node's incoming
    /// connections keep innovation order, which fixes the floating-point
    /// summation order.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::CyclicGenome`] if the genome contains cycles.
    pub fn try_new(genome: &Genome) -> Result<Self, NetworkError> {
        let topo = GraphTopology::from_genome(genome);
        let order = topo.evaluation_order().ok_or(NetworkError::CyclicGenome)?;

        let input_count = genome.input_count();
        let output_count = genome.output_count();

        let mut dense: HashMap<NodeId, usize> = HashMap::with_capacity(order.len());
        for input in 0..input_count {
            dense.insert(input, input);
        }
        for node in order
            .iter()
            .copied()
            .filter(|&node| node >= input_count + output_count)
        {
            let index = dense.len();
            dense.insert(node, index);
        }
        for output in input_count..input_count + output_count {
            let index = dense.len();
            dense.insert(output, index);
        }

        let node_count = dense.len();
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        for gene in genome.genes().filter(|g| g.enabled) {
            if let (Some(&source), Some(&target)) =
                (dense.get(&gene.source()), dense.get(&gene.target()))
            {
                incoming[target].push((source, gene.weight));
            }
        }

        let mut csr_offsets = Vec::with_capacity(node_count + 1);
        let mut csr_sources = Vec::new();
        let mut csr_weights = Vec::new();
        csr_offsets.push(0);
        for edges in incoming {
            for (source, weight) in edges {
                csr_sources.push(source);
                csr_weights.push(weight);
            }
            csr_offsets.push(csr_sources.len());
        }

        Ok(Self {
            input_count,
            output_count,
            values: vec![0.0; node_count],
            csr_offsets,
            csr_sources,
            csr_weights,
        })
    }

    /// Evaluate the network and return its outputs.
    ///
    /// Inputs are copied through unmodified; every other node takes the
    /// steepened sigmoid of its weighted input sum. The returned slice
    /// borrows the network's own buffer.
    ///
    /// # Panics
    ///
    /// Panics if `inputs.len()` differs from the genome's input count.
    pub fn evaluate(&mut self, inputs: &[f64]) -> &[f64] {
        assert_eq!(
            inputs.len(),
            self.input_count,
            "Input length mismatch: expected {}, got {}",
            self.input_count,
            inputs.len()
        );

        self.values[..self.input_count].copy_from_slice(inputs);

        for node in self.input_count..self.values.len() {
            let start = self.csr_offsets[node];
            let end = self.csr_offsets[node + 1];
            let mut sum = 0.0;
            for i in start..end {
                sum += self.values[self.csr_sources[i]] * self.csr_weights[i];
            }
            self.values[node] = steepened_sigmoid(sum);
        }

        &self.values[self.values.len() - self.output_count..]
    }

    /// Evaluate the network, writing results to a provided buffer.
    ///
    /// # Panics
    ///
    /// Panics if input or output length doesn't match the network.
    pub fn evaluate_into(&mut self, inputs: &[f64], outputs: &mut [f64]) {
        assert_eq!(
            outputs.len(),
            self.output_count,
            "Output length mismatch: expected {}, got {}",
            self.output_count,
            outputs.len()
        );
        outputs.copy_from_slice(self.evaluate(inputs));
    }

    #[must_use]
    pub const fn input_count(&self) -> usize {
        self.input_count
    }

    #[must_use]
    pub const fn output_count(&self) -> usize {
        self.output_count
    }

    /// Number of dense nodes, inputs and outputs included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.values.len()
    }

    /// Number of enabled connections compiled into the network.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.csr_sources.len()
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

    #[test]
    fn test_network_basic() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);

        let mut network = CompiledNetwork::new(&genome);
        assert_eq!(network.input_count(), 2);
        assert_eq!(network.output_count(), 1);
        assert_eq!(network.node_count(), 3);
        assert_eq!(network.connection_count(), 2);

        let outputs = network.evaluate(&[0.5, 0.5]);
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_single_input_drives_output() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);
        let w0 = genome.gene(0).unwrap().weight;

        let mut network = CompiledNetwork::new(&genome);
        let output = network.evaluate(&[1.0, 0.0])[0];

        let expected = 1.0 / (1.0 + (-4.9 * w0).exp());
        assert!((output - expected).abs() < 1e-9, "expected {expected}, got {output}");
    }

    #[test]
    fn test_network_deterministic() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);

        let mut network = CompiledNetwork::new(&genome);
        let first = network.evaluate(&[0.5, -0.5])[0];
        let second = network.evaluate(&[0.5, -0.5])[0];
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_hidden_node_chain() {
        // 0 -> 2 (w=1) -> 1 (w=2)
        let genome = Genome::from_genes(1, 1, [Gene::new(0, 2, 0, 1.0), Gene::new(2, 1, 1, 2.0)]);
        let mut network = CompiledNetwork::new(&genome);

        let hidden = steepened_sigmoid(0.3);
        let expected = steepened_sigmoid(2.0 * hidden);
        let output = network.evaluate(&[0.3])[0];
        assert!((output - expected).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_genes_are_skipped() {
        let mut genome = Genome::from_genes(1, 1, [Gene::new(0, 1, 0, 3.0)]);
        genome.gene_mut(0).unwrap().enabled = false;

        let mut network = CompiledNetwork::new(&genome);
        assert_eq!(network.connection_count(), 0);
        // No incoming connections: sigmoid(0) = 0.5 regardless of input.
        assert!((network.evaluate(&[10.0])[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_split_node_keeps_network_finite() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let mut genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);
        genome.add_node(&mut ledger, &mut rng);

        let mut network = CompiledNetwork::new(&genome);
        assert_eq!(network.node_count(), 4);
        assert_eq!(network.connection_count(), 3);

        let mut outputs = [0.0];
        network.evaluate_into(&[1.0, 0.0], &mut outputs);
        assert!(outputs[0].is_finite());
        assert!((0.0..=1.0).contains(&outputs[0]));
    }

    #[test]
    fn test_try_new_rejects_cycle() {
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
        assert_eq!(
            CompiledNetwork::try_new(&genome).unwrap_err(),
            NetworkError::CyclicGenome
        );
    }

    #[test]
    #[should_panic(expected = "Input length mismatch")]
    fn test_network_input_mismatch() {
        let mut ledger = InnovationLedger::new();
        let mut rng = test_rng();
        let genome = Genome::fully_connected(2, 1, &mut ledger, 1.0, &mut rng);

        let mut network = CompiledNetwork::new(&genome);
        network.evaluate(&[1.0]);
    }

    #[test]
    fn test_network_error_display() {
        let msg = NetworkError::CyclicGenome.to_string();
        assert!(msg.contains("cycle"), "Error message should mention cycles: {msg}");
    }
}
