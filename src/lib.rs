//! # NEAT DAG
//!
//! `NeuroEvolution` of Augmenting Topologies (NEAT) for feed-forward networks.
//!
//! Genomes are sets of connection genes keyed by innovation id. A
//! [`Population`] mutates them structurally and parametrically, groups them
//! into [`Species`] by compatibility distance, scores them through a
//! caller-supplied [`Evaluator`] and breeds the next generation.
//!
//! ## Features
//!
//! - **Run-long innovation ledger**: every `(source, target)` edge keeps the
//!   innovation id it was first given, so crossover aligns genes across the
//!   whole run
//! - **Acyclic by construction**: new connections never close a cycle, and
//!   disabled genes still count when checking ancestry
//! - **CSR evaluation**: genomes compile to a [`CompiledNetwork`] with
//!   contiguous incoming-edge arrays and owned value buffers
//! - **Reproducible**: all randomness comes from a `ChaCha8Rng` seeded from
//!   [`NeatConfig::seed`]
//!
//! ## Quick Start
//!
//! ```rust
//! use neat_dag::{CompiledNetwork, Genome, NeatConfig, Population};
//!
//! // XOR with a constant bias input.
//! fn xor_fitness(genomes: &mut [Genome]) {
//!     let cases = [
//!         ([0.0, 0.0, 1.0], 0.0),
//!         ([0.0, 1.0, 1.0], 1.0),
//!         ([1.0, 0.0, 1.0], 1.0),
//!         ([1.0, 1.0, 1.0], 0.0),
//!     ];
//!     for genome in genomes.iter_mut() {
//!         let mut network = CompiledNetwork::new(genome);
//!         let error: f64 = cases
//!             .iter()
//!             .map(|(inputs, expected)| (network.evaluate(inputs)[0] - expected).abs())
//!             .sum();
//!         genome.fitness = (4.0 - error).powi(2);
//!     }
//! }
//!
//! let config = NeatConfig {
//!     seed: 7,
//!     ..NeatConfig::new(50, 3, 1)
//! };
//! let mut population = Population::new(config, xor_fitness)?;
//! for _ in 0..10 {
//!     population.evolution_step();
//! }
//!
//! let best = population.best().expect("evaluated population has a best genome");
//! println!("best fitness {:.3}\n{best}", population.best_fitness());
//! # Ok::<(), neat_dag::ConfigError>(())
//! ```
//!
//! ## Node ids
//!
//! Nodes have no records of their own. For a genome with `i` inputs and `o`
//! outputs, ids `[0, i)` are inputs, `[i, i + o)` are outputs and every other
//! id is a hidden node. A new hidden node takes the smallest free id.

pub mod activation;
pub mod config;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod network;
pub mod population;
pub mod species;
pub mod topology;

// Re-exports for convenience
pub use activation::steepened_sigmoid;
pub use config::{ConfigError, NeatConfig};
pub use gene::{Gene, InnovationId, NodeId, NodeKind};
pub use genome::Genome;
pub use innovation::InnovationLedger;
pub use network::{CompiledNetwork, NetworkError};
pub use population::{Evaluator, Population};
pub use species::Species;
pub use topology::{GraphTopology, IncomingEdge};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_serialization_roundtrip() {
        let mut ledger = InnovationLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let mut genome = Genome::fully_connected(3, 2, &mut ledger, 1.0, &mut rng);
        genome.add_node(&mut ledger, &mut rng);

        let json = serde_json::to_string(&genome).expect("Serialization failed");
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored.len(), genome.len());
        for (a, b) in genome.genes().zip(restored.genes()) {
            assert_eq!(
                (a.source(), a.target(), a.innovation(), a.enabled),
                (b.source(), b.target(), b.innovation(), b.enabled)
            );
            assert!((a.weight - b.weight).abs() < 1e-12);
        }
        assert_eq!(restored.input_count(), 3);
        assert_eq!(restored.output_count(), 2);
    }

    #[test]
    fn test_compiled_genome_is_unchanged() {
        let mut ledger = InnovationLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut genome = Genome::fully_connected(2, 2, &mut ledger, 1.0, &mut rng);
        genome.add_node(&mut ledger, &mut rng);
        let before = genome.to_string();

        let mut network = CompiledNetwork::new(&genome);
        network.evaluate(&[0.25, -0.75]);

        assert_eq!(genome.to_string(), before);
    }
}
