//! Search a precomputed table of ternary identities with both strategies.
//!
//! Run with `RUST_LOG=qr_optimizer=info cargo run --example lookup_search`.

use qr_optimizer::*;
use qr_types::{Entry, EntryCollection, SlotKey};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const ELEMENTS: u32 = 12;

/// Every ordered triple of distinct element ids, measured with a bumpy
/// function of the ids.
fn ternary_table() -> EntryCollection<SlotKey> {
    let mut table = EntryCollection::new(vec!["mean".to_string(), "spread".to_string()]);
    for a in 0..ELEMENTS {
        for b in 0..ELEMENTS {
            for c in 0..ELEMENTS {
                if a == b || b == c || a == c {
                    continue;
                }
                let ids = [f64::from(a), f64::from(b), f64::from(c)];
                let mean = ids.iter().sum::<f64>() / 3.0;
                let spread = ids.iter().map(|x| (x - mean).powi(2)).sum::<f64>().sqrt();
                let value = -(mean - 6.5).powi(2) + 2.0 * (spread * 0.7).sin() + 0.1 * ids[0];
                table.add_entry(
                    Entry::new(SlotKey::new(vec![a, b, c]))
                        .with_attributes(vec![mean, spread])
                        .with_measured(value),
                );
            }
        }
    }
    table
}

fn run(
    config: &SearchConfig,
    factory: Option<ModelFactory<SlotKey>>,
    table: &EntryCollection<SlotKey>,
    generations: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = OperatorRegistry::with_defaults();
    let mut engine = SearchEngine::from_config(config, &registry, factory)?;

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    engine.set_initial_data(table.sample(20, &mut rng))?;
    engine.set_oracle(Oracle::new(Box::new(LookupOracle::new(table)?)))?;
    engine.set_search_space(table.clone())?;

    for record in engine.run(generations)? {
        println!(
            "  generation {}: {} of {} entries in {} attempts{}",
            record.index,
            record.produced,
            record.requested,
            record.attempts_used,
            if record.exhausted { " (exhausted)" } else { "" }
        );
    }

    if let Some(best) = engine.best_entry()? {
        println!("  best so far: {} = {:?}", best.key, best.measured);
    }
    println!("{}", engine.statistics_with_top(10)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let table = ternary_table();
    println!("Lookup table holds {} ternary identities", table.len());

    let genetic = SearchConfig::new(
        "ternary_genetic",
        StrategyConfig::Genetic(GeneticConfig {
            number_elite: 5,
            previous_iterations: 2,
            ..GeneticConfig::default()
        }),
    )
    .with_entries_per_generation(25)
    .with_seed(11);
    println!("\nGenetic search:\n{}", genetic.to_json_pretty()?);
    run(&genetic, None, &table, 8)?;

    let active = SearchConfig::new(
        "ternary_active",
        StrategyConfig::ActiveLearning(ActiveLearningConfig {
            random_fraction: 0.1,
            worst_fraction: 0.2,
            ensemble: EnsembleConfig {
                members: 8,
                subsample_fraction: 0.8,
            },
        }),
    )
    .with_entries_per_generation(25)
    .with_seed(11);
    let factory: ModelFactory<SlotKey> =
        Arc::new(|_seed: u64| Box::new(NearestNeighborModel::new(4)) as Box<dyn Model<SlotKey>>);
    println!("\nActive-learning search:");
    run(&active, Some(factory), &table, 8)?;

    Ok(())
}
