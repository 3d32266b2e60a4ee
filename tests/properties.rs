//! Property tests for genome invariants under random mutation.

use std::collections::HashSet;

use neat_dag::{Genome, GraphTopology, InnovationLedger, NeatConfig, NodeKind};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Grow a genome with `steps` rounds of aggressive mutation.
fn grown_genome(
    seed: u64,
    inputs: usize,
    outputs: usize,
    steps: usize,
    ledger: &mut InnovationLedger,
) -> Genome {
    let config = NeatConfig {
        add_node_mutation_chance: 0.4,
        add_connection_mutation_chance: 0.7,
        enable_connection_mutation_chance: 0.2,
        ..NeatConfig::new(1, inputs, outputs)
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut genome = Genome::fully_connected(inputs, outputs, ledger, 1.0, &mut rng);
    for _ in 0..steps {
        genome.mutate(&config, ledger, &mut rng);
    }
    genome
}

proptest! {
    #[test]
    fn gene_endpoints_respect_node_roles(
        seed in any::<u64>(),
        inputs in 1usize..4,
        outputs in 1usize..3,
        steps in 0usize..30,
    ) {
        let mut ledger = InnovationLedger::new();
        let genome = grown_genome(seed, inputs, outputs, steps, &mut ledger);

        let mut pairs = HashSet::new();
        for gene in genome.genes() {
            prop_assert_ne!(genome.node_kind(gene.source()), NodeKind::Output);
            prop_assert_ne!(genome.node_kind(gene.target()), NodeKind::Input);
            prop_assert!(pairs.insert((gene.source(), gene.target())), "duplicate edge");
        }
    }

    #[test]
    fn evaluation_order_is_topological(
        seed in any::<u64>(),
        inputs in 1usize..4,
        outputs in 1usize..3,
        steps in 0usize..30,
    ) {
        let mut ledger = InnovationLedger::new();
        let genome = grown_genome(seed, inputs, outputs, steps, &mut ledger);
        let topo = GraphTopology::from_genome(&genome);

        prop_assert!(!topo.has_cycle());
        let order = topo.evaluation_order().expect("mutation keeps the graph acyclic");
        prop_assert_eq!(order.len(), topo.node_count());

        let position = |node: usize| order.iter().position(|&n| n == node);
        for gene in genome.genes().filter(|g| g.enabled) {
            prop_assert!(position(gene.source()) < position(gene.target()));
        }

        let tail: Vec<usize> = order[order.len() - outputs..].to_vec();
        let expected: Vec<usize> = (inputs..inputs + outputs).collect();
        prop_assert_eq!(tail, expected);
    }

    #[test]
    fn crossover_stays_within_fitter_parent(
        seed in any::<u64>(),
        steps_a in 0usize..20,
        steps_b in 0usize..20,
    ) {
        let mut ledger = InnovationLedger::new();
        let fitter = grown_genome(seed, 2, 1, steps_a, &mut ledger);
        let other = grown_genome(seed.wrapping_add(1), 2, 1, steps_b, &mut ledger);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let child = fitter.crossover(&other, 0.25, &mut rng);

        prop_assert!(child.max_innovation() <= fitter.max_innovation());
        prop_assert_eq!(child.len(), fitter.len());
        for gene in child.genes() {
            prop_assert!(fitter.contains(gene.innovation()));
        }
    }

    #[test]
    fn self_distance_is_zero(seed in any::<u64>(), steps in 0usize..30) {
        let mut ledger = InnovationLedger::new();
        let genome = grown_genome(seed, 3, 2, steps, &mut ledger);
        prop_assert!(genome.compatibility_distance(&genome, 1.0, 1.0, 0.4).abs() < 1e-12);
    }
}
