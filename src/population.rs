//! The generational NEAT loop.
//!
//! [`Population`] owns everything that lives for a whole run: the genome
//! table, the species list, the innovation ledger, the configuration and the
//! seeded random stream. Fitness comes from an [`Evaluator`] supplied at
//! construction.

use log::{debug, info};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ConfigError, NeatConfig};
use crate::genome::Genome;
use crate::innovation::InnovationLedger;
use crate::species::Species;

/// Scores genomes by writing their `fitness` field.
///
/// Called once per generation with the whole genome table. Implementations
/// may score genomes in parallel but must return only once every genome has
/// been scored.
pub trait Evaluator {
    fn evaluate(&mut self, genomes: &mut [Genome]);
}

impl<F> Evaluator for F
where
    F: FnMut(&mut [Genome]),
{
    fn evaluate(&mut self, genomes: &mut [Genome]) {
        self(genomes);
    }
}

/// A population of genomes evolving under NEAT.
pub struct Population<E> {
    config: NeatConfig,
    genomes: Vec<Genome>,
    species: Vec<Species>,
    ledger: InnovationLedger,
    rng: ChaCha8Rng,
    evaluator: E,
    /// Index of the fittest genome at the last evaluation.
    best: Option<usize>,
    best_fitness: f64,
    average_fitness: f64,
    generation: usize,
}

impl<E: Evaluator> Population<E> {
    /// Build, mutate, speciate and evaluate an initial population of fully
    /// connected genomes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn new(config: NeatConfig, evaluator: E) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut ledger = InnovationLedger::new();
        let genomes = (0..config.population_size)
            .map(|_| {
                Genome::fully_connected(
                    config.input_count,
                    config.output_count,
                    &mut ledger,
                    config.weight_range,
                    &mut rng,
                )
            })
            .collect();

        let mut population = Self {
            config,
            genomes,
            species: Vec::new(),
            ledger,
            rng,
            evaluator,
            best: None,
            best_fitness: 0.0,
            average_fitness: 0.0,
            generation: 0,
        };

        population.mutate();
        population.speciate();
        population.evaluate();

        info!(
            "population of {} genomes ({} inputs, {} outputs), {} species, best fitness {:.4}",
            population.genomes.len(),
            population.config.input_count,
            population.config.output_count,
            population.species.len(),
            population.best_fitness
        );

        Ok(population)
    }

    /// Mutate every genome once.
    pub fn mutate(&mut self) {
        let Self {
            config,
            genomes,
            ledger,
            rng,
            ..
        } = self;
        for genome in genomes.iter_mut() {
            genome.mutate(config, ledger, rng);
        }
    }

    /// Rebuild species membership from scratch.
    ///
    /// Each genome joins the first existing species it is compatible with,
    /// in species creation order, or founds a new one. Species left empty
    /// are dropped.
    pub fn speciate(&mut self) {
        for species in &mut self.species {
            species.clear();
        }

        for (index, genome) in self.genomes.iter().enumerate() {
            let placed = self
                .species
                .iter_mut()
                .any(|species| species.insert(index, genome, &self.config));
            if !placed {
                self.species
                    .push(Species::new(index, genome, self.config.stagnation_limit));
            }
        }

        self.species.retain(|species| !species.is_empty());
        debug!("{} species after speciation", self.species.len());
    }

    /// Score every genome, update the statistics and share fitness within
    /// each species.
    ///
    /// `best_fitness` and `average_fitness` are taken from the raw scores,
    /// before sharing.
    pub fn evaluate(&mut self) {
        self.evaluator.evaluate(&mut self.genomes);

        self.best = None;
        self.best_fitness = 0.0;
        let mut total = 0.0;
        for (index, genome) in self.genomes.iter().enumerate() {
            if self.best.is_none() || genome.fitness > self.best_fitness {
                self.best = Some(index);
                self.best_fitness = genome.fitness;
            }
            total += genome.fitness;
        }
        self.average_fitness = total / self.genomes.len() as f64;

        for species in &mut self.species {
            species.normalise_fitness(&mut self.genomes);
        }
    }

    /// Replace the genome table with the next generation.
    ///
    /// The overall best genome and the best member of every species with at
    /// least `elite_species_min_size` members survive unchanged. Each
    /// species is truncated and breeds a share of the remaining slots in
    /// proportion to its fitness. Slots still free are filled with
    /// crossovers of parents drawn fitness-proportionately from the whole
    /// table. All new genomes are mutated, then the elites are placed in
    /// front of them.
    ///
    /// Species memberships refer to the old table afterwards; call
    /// [`speciate`](Self::speciate) before using them again.
    pub fn next_generation(&mut self) {
        let mut elite_indices: Vec<usize> = self.best.into_iter().collect();
        for species in &self.species {
            if species.len() < self.config.elite_species_min_size {
                continue;
            }
            if let Some(index) = species.best_member(&self.genomes) {
                if !elite_indices.contains(&index) {
                    elite_indices.push(index);
                }
            }
        }

        let remaining = self
            .config
            .population_size
            .saturating_sub(elite_indices.len());
        let total_fitness: f64 = self.species.iter().map(Species::fitness).sum();

        let mut offspring = Vec::with_capacity(self.config.population_size);
        {
            let Self {
                config,
                genomes,
                species,
                rng,
                ..
            } = self;

            for species in species.iter_mut() {
                species.reduce_population(genomes, config.selection_rate);
                let share = if total_fitness > 0.0 && total_fitness.is_finite() {
                    (remaining as f64 * species.fitness() / total_fitness).round() as usize
                } else {
                    0
                };
                let n = share.min(remaining - offspring.len());
                species.get_offspring(n, genomes, config, rng, &mut offspring);
            }

            let shortfall = remaining - offspring.len();
            if shortfall > 0 {
                debug!("filling {shortfall} slots from the whole population");
                let weights = WeightedIndex::new(genomes.iter().map(|g| g.fitness)).ok();
                while offspring.len() < remaining {
                    let first = sample_parent(weights.as_ref(), genomes.len(), rng);
                    let second = sample_parent(weights.as_ref(), genomes.len(), rng);
                    offspring.push(genomes[first].crossover(
                        &genomes[second],
                        config.enable_gene_chance,
                        rng,
                    ));
                }
            }
        }

        let mut next: Vec<Genome> = elite_indices
            .iter()
            .map(|&index| self.genomes[index].clone())
            .collect();
        self.genomes = offspring;
        self.mutate();
        next.append(&mut self.genomes);
        self.genomes = next;
        self.best = None;
    }

    /// Run one full generation.
    ///
    /// Stagnation counters advance first. When more than one species exists,
    /// stagnant species are dropped; if every species is stagnant only the
    /// fittest survives. Then the next generation is bred, speciated and
    /// evaluated.
    pub fn evolution_step(&mut self) {
        let limit = self.config.stagnation_limit;
        for species in &mut self.species {
            species.update_stagnation(&self.genomes, limit);
        }

        if self.species.len() > 1 {
            let before = self.species.len();
            if self.species.iter().all(Species::is_stagnant) {
                let fittest = self
                    .species
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.fitness().total_cmp(&b.fitness()))
                    .map(|(index, _)| index);
                if let Some(index) = fittest {
                    let kept = self.species.swap_remove(index);
                    self.species = vec![kept];
                }
            } else {
                self.species.retain(|species| !species.is_stagnant());
            }
            if self.species.len() < before {
                debug!("dropped {} stagnant species", before - self.species.len());
            }
        }

        self.next_generation();
        self.speciate();
        self.evaluate();
        self.generation += 1;

        info!(
            "generation {}: best fitness {:.4}, average {:.4}, {} species",
            self.generation,
            self.best_fitness,
            self.average_fitness,
            self.species.len()
        );
    }

    #[must_use]
    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    /// The current genome table.
    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    #[must_use]
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// The fittest genome of the last evaluation.
    ///
    /// `None` between [`next_generation`](Self::next_generation) and the
    /// following [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn best(&self) -> Option<&Genome> {
        self.best.and_then(|index| self.genomes.get(index))
    }

    /// Raw fitness of the best genome at the last evaluation.
    #[must_use]
    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Mean raw fitness at the last evaluation.
    #[must_use]
    pub fn average_fitness(&self) -> f64 {
        self.average_fitness
    }

    /// Number of completed [`evolution_step`](Self::evolution_step) calls.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    #[must_use]
    pub fn ledger(&self) -> &InnovationLedger {
        &self.ledger
    }
}

/// Draw a parent index, fitness-proportionately when the weights are usable
/// and uniformly otherwise.
fn sample_parent<R: Rng>(weights: Option<&WeightedIndex<f64>>, len: usize, rng: &mut R) -> usize {
    match weights {
        Some(weights) => weights.sample(rng),
        None => rng.random_range(0..len),
    }
}
