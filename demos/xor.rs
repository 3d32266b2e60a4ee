//! XOR example using the NEAT population loop.
//!
//! This example demonstrates evolving a neural network to solve the XOR problem,
//! a classic benchmark for neuroevolution algorithms. Genomes are scored in
//! parallel with rayon.
//!
//! Run with: `RUST_LOG=info cargo run --example xor`

use neat_dag::{CompiledNetwork, Genome, NeatConfig, Population};
use rayon::prelude::*;

/// XOR truth table. The third input is a constant bias.
const TEST_CASES: [([f64; 3], f64); 4] = [
    ([0.0, 0.0, 1.0], 0.0),
    ([0.0, 1.0, 1.0], 1.0),
    ([1.0, 0.0, 1.0], 1.0),
    ([1.0, 1.0, 1.0], 0.0),
];

/// Maximum fitness is 16.0 (perfect solution).
fn xor_fitness(genome: &Genome) -> f64 {
    let mut network = CompiledNetwork::new(genome);
    let mut total_error = 0.0;

    for (inputs, expected) in &TEST_CASES {
        let output = network.evaluate(inputs)[0];
        total_error += (output - expected).abs();
    }

    (4.0 - total_error).powi(2)
}

fn main() {
    env_logger::init();

    println!("NEAT XOR Example");
    println!("================\n");

    let config = NeatConfig {
        seed: 42,
        add_connection_mutation_chance: 0.1,
        add_node_mutation_chance: 0.05,
        ..NeatConfig::new(150, 3, 1)
    };
    let generations = 200;

    println!("Population: {}", config.population_size);
    println!("Generations: {}", generations);
    println!();

    let mut population = match Population::new(config, |genomes: &mut [Genome]| {
        genomes
            .par_iter_mut()
            .for_each(|genome| genome.fitness = xor_fitness(genome));
    }) {
        Ok(population) => population,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let mut solution_generation = None;

    for gen in 0..generations {
        population.evolution_step();

        // Check for solution (fitness >= 15.0 is close enough)
        if population.best_fitness() >= 15.0 && solution_generation.is_none() {
            solution_generation = Some(gen);
        }

        if gen % 10 == 0 || gen == generations - 1 {
            let (nodes, connections) = population
                .best()
                .map_or((0, 0), |best| (best.node_count(), best.enabled_count()));
            println!(
                "Gen {:3}: best={:.4}, avg={:.4}, species={}, nodes={}, connections={}",
                gen,
                population.best_fitness(),
                population.average_fitness(),
                population.species().len(),
                nodes,
                connections
            );
        }

        if solution_generation.is_some() {
            break;
        }
    }

    println!();

    let Some(champion) = population.best() else {
        println!("No champion evaluated.");
        return;
    };

    println!("Evolution Complete!");
    println!("==================");
    println!("Best fitness: {:.4}", population.best_fitness());
    println!("Nodes: {}", champion.node_count());
    println!("Connections: {}", champion.enabled_count());
    println!("Hidden nodes: {}", champion.hidden_ids().len());

    if let Some(gen) = solution_generation {
        println!("Solution found at generation: {}", gen);
    }

    println!("\nChampion genome:\n{champion}");

    println!("Champion XOR outputs:");
    let mut network = CompiledNetwork::new(champion);
    for (inputs, expected) in &TEST_CASES {
        let output = network.evaluate(inputs)[0];
        let rounded = if output > 0.5 { 1.0 } else { 0.0 };
        let status = if (rounded - expected).abs() < 0.1 {
            "✓"
        } else {
            "✗"
        };
        println!(
            "  {} XOR {} = {:.4} (expected {}) {}",
            inputs[0] as i32, inputs[1] as i32, output, *expected as i32, status
        );
    }
}
