//! Species: clusters of structurally similar genomes.
//!
//! A [`Species`] stores indices into the population's genome table plus a
//! frozen copy of the genome that founded it. Membership is decided by
//! compatibility distance to that representative. Within a species, fitness
//! is shared among members.

use log::trace;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::NeatConfig;
use crate::genome::Genome;

/// A cluster of compatible genomes.
#[derive(Debug, Clone)]
pub struct Species {
    /// Snapshot of the founding genome. It does not follow later changes to
    /// the genome it was copied from.
    representative: Genome,
    /// Indices into the population's genome table.
    members: Vec<usize>,
    /// Mean raw fitness of the members at the last normalisation.
    fitness: f64,
    /// Best member fitness seen so far.
    max_fitness: f64,
    /// Generations left before the species counts as stagnant.
    generations_left: u32,
}

impl Species {
    /// Found a species with `genome` (stored at `index`) as its representative
    /// and only member.
    #[must_use]
    pub fn new(index: usize, genome: &Genome, stagnation_limit: u32) -> Self {
        Self {
            representative: genome.clone(),
            members: vec![index],
            fitness: 0.0,
            max_fitness: 0.0,
            generations_left: stagnation_limit,
        }
    }

    #[must_use]
    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    /// Member indices into the population's genome table.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Mean member fitness computed by [`normalise_fitness`](Self::normalise_fitness).
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    #[must_use]
    pub fn max_fitness(&self) -> f64 {
        self.max_fitness
    }

    #[must_use]
    pub fn generations_left(&self) -> u32 {
        self.generations_left
    }

    /// Whether the stagnation counter has run out.
    #[must_use]
    pub fn is_stagnant(&self) -> bool {
        self.generations_left == 0
    }

    /// Drop every member. The representative is kept.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Whether `genome` is within the compatibility threshold of the representative.
    #[must_use]
    pub fn genome_compatible(&self, genome: &Genome, config: &NeatConfig) -> bool {
        genome.compatibility_distance(&self.representative, config.c1, config.c2, config.c3)
            <= config.compatibility_threshold
    }

    /// Add the genome at `index` if it is compatible.
    ///
    /// Returns `false` and leaves the species unchanged otherwise.
    pub fn insert(&mut self, index: usize, genome: &Genome, config: &NeatConfig) -> bool {
        if !self.genome_compatible(genome, config) {
            return false;
        }
        self.members.push(index);
        true
    }

    /// Apply fitness sharing.
    ///
    /// The species' fitness becomes the mean member fitness, then each
    /// member's fitness is divided by the member count.
    pub fn normalise_fitness(&mut self, genomes: &mut [Genome]) {
        if self.members.is_empty() {
            self.fitness = 0.0;
            return;
        }

        let size = self.members.len() as f64;
        let mut total = 0.0;
        for &index in &self.members {
            let genome = &mut genomes[index];
            total += genome.fitness;
            genome.fitness /= size;
        }
        self.fitness = total / size;
    }

    /// Keep only the fittest `ceil(selection_rate * len)` members.
    pub fn reduce_population(&mut self, genomes: &[Genome], selection_rate: f64) {
        self.members
            .sort_by(|&a, &b| genomes[b].fitness.total_cmp(&genomes[a].fitness));
        let survivors = (self.members.len() as f64 * selection_rate).ceil() as usize;
        self.members.truncate(survivors);
    }

    /// Index of the fittest member; the first one on ties.
    #[must_use]
    pub fn best_member(&self, genomes: &[Genome]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for &index in &self.members {
            match best {
                Some(current) if genomes[index].fitness <= genomes[current].fitness => {}
                _ => best = Some(index),
            }
        }
        best
    }

    /// Uniformly random member index.
    pub fn random_member<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        self.members.choose(rng).copied()
    }

    /// Append `n` offspring of the current members to `out`.
    ///
    /// `floor(n * non_crossover_breeding_rate)` are copies of random members;
    /// the rest are crossovers of two independently drawn members, the first
    /// draw acting as the fitter parent. Appends nothing without members.
    pub fn get_offspring<R: Rng>(
        &self,
        n: usize,
        genomes: &[Genome],
        config: &NeatConfig,
        rng: &mut R,
        out: &mut Vec<Genome>,
    ) {
        if self.members.is_empty() {
            return;
        }

        let copies = (n as f64 * config.non_crossover_breeding_rate).floor() as usize;
        let copies = copies.min(n);

        for _ in 0..copies {
            if let Some(index) = self.random_member(rng) {
                let mut child = genomes[index].clone();
                child.fitness = 0.0;
                out.push(child);
            }
        }

        for _ in copies..n {
            if let (Some(a), Some(b)) = (self.random_member(rng), self.random_member(rng)) {
                out.push(genomes[a].crossover(&genomes[b], config.enable_gene_chance, rng));
            }
        }
    }

    /// Advance the stagnation counter by one generation.
    ///
    /// The counter drops by one. If a member beats the best fitness seen so
    /// far, that fitness is recorded and the counter resets to `limit`.
    pub fn update_stagnation(&mut self, genomes: &[Genome], limit: u32) {
        self.generations_left = self.generations_left.saturating_sub(1);

        let best = self
            .members
            .iter()
            .map(|&index| genomes[index].fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        if best > self.max_fitness {
            trace!("species improved {:.4} -> {:.4}", self.max_fitness, best);
            self.max_fitness = best;
            self.generations_left = limit;
        }
    }
}
