//! Population-level configuration.
//!
//! All mutation, selection and speciation constants live in [`NeatConfig`].
//! Genomes carry no configuration of their own; the population passes the
//! relevant values into every operator.

use serde::{Deserialize, Serialize};

/// Configuration for a NEAT run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatConfig {
    /// Number of genomes bred each generation.
    pub population_size: usize,
    /// Number of input nodes per genome.
    pub input_count: usize,
    /// Number of output nodes per genome.
    pub output_count: usize,
    /// Chance that a gene inherited through crossover is force-enabled.
    pub enable_gene_chance: f64,
    /// Chance of mutating one connection weight.
    pub weight_mutation_chance: f64,
    /// Share of weight mutations that replace the weight instead of perturbing it.
    pub set_weight_chance: f64,
    /// Chance of splitting a connection with a new hidden node.
    pub add_node_mutation_chance: f64,
    /// Chance of adding a new connection.
    pub add_connection_mutation_chance: f64,
    /// Chance of re-enabling a random connection.
    pub enable_connection_mutation_chance: f64,
    /// Share of a species' offspring that are copies rather than crossovers.
    pub non_crossover_breeding_rate: f64,
    /// Share of each species that survives truncation.
    pub selection_rate: f64,
    /// Maximum compatibility distance to a species' representative.
    pub compatibility_threshold: f64,
    /// Compatibility coefficient for excess genes.
    pub c1: f64,
    /// Compatibility coefficient for disjoint genes.
    pub c2: f64,
    /// Compatibility coefficient for the mean weight difference of matching genes.
    pub c3: f64,
    /// Range for initial and replaced weights: `[-weight_range, weight_range]`.
    pub weight_range: f64,
    /// Range for weight perturbation: `[-perturbation_range, perturbation_range]`.
    pub perturbation_range: f64,
    /// Generations a species may go without improving before it is dropped.
    pub stagnation_limit: u32,
    /// Species with at least this many members keep their champion unchanged.
    pub elite_species_min_size: usize,
    /// Seed of the population's random stream.
    pub seed: u64,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            population_size: 150,
            input_count: 2,
            output_count: 1,
            enable_gene_chance: 0.25,
            weight_mutation_chance: 0.8,
            set_weight_chance: 0.1,
            add_node_mutation_chance: 0.03,
            add_connection_mutation_chance: 0.05,
            enable_connection_mutation_chance: 0.0,
            non_crossover_breeding_rate: 0.25,
            selection_rate: 0.25,
            compatibility_threshold: 3.0,
            c1: 1.0,
            c2: 1.0,
            c3: 0.4,
            weight_range: 1.0,
            perturbation_range: 0.1,
            stagnation_limit: 15,
            elite_species_min_size: 5,
            seed: 0,
        }
    }
}

impl NeatConfig {
    /// Default configuration for the given population size and network shape.
    #[must_use]
    pub fn new(population_size: usize, input_count: usize, output_count: usize) -> Self {
        Self {
            population_size,
            input_count,
            output_count,
            ..Default::default()
        }
    }

    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.input_count == 0 || self.output_count == 0 {
            return Err(ConfigError::MissingTerminals {
                inputs: self.input_count,
                outputs: self.output_count,
            });
        }

        let probabilities = [
            ("enable_gene_chance", self.enable_gene_chance),
            ("weight_mutation_chance", self.weight_mutation_chance),
            ("set_weight_chance", self.set_weight_chance),
            ("add_node_mutation_chance", self.add_node_mutation_chance),
            ("add_connection_mutation_chance", self.add_connection_mutation_chance),
            (
                "enable_connection_mutation_chance",
                self.enable_connection_mutation_chance,
            ),
            ("non_crossover_breeding_rate", self.non_crossover_breeding_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }

        if !(self.selection_rate > 0.0 && self.selection_rate <= 1.0) {
            return Err(ConfigError::InvalidSelectionRate(self.selection_rate));
        }

        let coefficients = [
            ("compatibility_threshold", self.compatibility_threshold),
            ("c1", self.c1),
            ("c2", self.c2),
            ("c3", self.c3),
            ("weight_range", self.weight_range),
            ("perturbation_range", self.perturbation_range),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidCoefficient { name, value });
            }
        }

        if self.stagnation_limit == 0 {
            return Err(ConfigError::ZeroStagnationLimit);
        }

        Ok(())
    }
}

/// Reasons a [`NeatConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("population size must be positive")]
    EmptyPopulation,

    #[error("genomes need at least one input and one output, got {inputs} inputs and {outputs} outputs")]
    MissingTerminals { inputs: usize, outputs: usize },

    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("selection_rate must be in (0, 1], got {0}")]
    InvalidSelectionRate(f64),

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidCoefficient { name: &'static str, value: f64 },

    #[error("stagnation_limit must be at least one generation")]
    ZeroStagnationLimit,
}
