//! End-to-end search scenarios driven through the public API.

use qr_optimizer::*;
use qr_types::{Entry, EntryCollection, GenerationHistory, OracleError, QrError, QrResult, SlotKey};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn entry(slots: &[u32], attributes: Vec<f64>, measured: f64) -> Entry<SlotKey> {
    Entry::new(SlotKey::new(slots.to_vec()))
        .with_attributes(attributes)
        .with_measured(measured)
}

/// Every ordered pair of distinct values below `n`, measured with a smooth
/// function of the pair.
fn pair_space(n: u32) -> EntryCollection<SlotKey> {
    let mut entries = Vec::new();
    for a in 0..n {
        for b in 0..n {
            if a != b {
                let (x, y) = (a as f64, b as f64);
                entries.push(entry(&[a, b], vec![x, y], x * 2.0 - (y - 3.0).abs()));
            }
        }
    }
    EntryCollection::from_entries(vec!["a".into(), "b".into()], entries)
}

/// Predicts the first attribute, so it ranks exactly like a space whose
/// first attribute is the measured value.
#[derive(Default)]
struct FirstAttributeModel {
    trained: bool,
}

impl Model<SlotKey> for FirstAttributeModel {
    fn train(&mut self, _data: &EntryCollection<SlotKey>) -> QrResult<()> {
        self.trained = true;
        Ok(())
    }

    fn predict(&self, data: &EntryCollection<SlotKey>) -> QrResult<Vec<f64>> {
        Ok(data
            .iter()
            .map(|e| e.attributes.as_ref().map_or(0.0, |a| a[0]))
            .collect())
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn name(&self) -> &str {
        "first_attribute"
    }
}

fn first_attribute_factory() -> ModelFactory<SlotKey> {
    Arc::new(|_seed: u64| Box::new(FirstAttributeModel::default()) as Box<dyn Model<SlotKey>>)
}

fn knn_factory() -> ModelFactory<SlotKey> {
    Arc::new(|_seed: u64| Box::new(NearestNeighborModel::new(3)) as Box<dyn Model<SlotKey>>)
}

fn genetic_engine(
    genetic: GeneticConfig,
    entries_per_generation: usize,
    initial: EntryCollection<SlotKey>,
    space: EntryCollection<SlotKey>,
    seed: u64,
) -> SearchEngine<SlotKey> {
    let config = SearchConfig::new("genetic_test", StrategyConfig::Genetic(genetic))
        .with_entries_per_generation(entries_per_generation)
        .with_seed(seed);
    let registry = OperatorRegistry::with_defaults();
    let mut engine = SearchEngine::from_config(&config, &registry, None).unwrap();
    engine.set_initial_data(initial).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&space).unwrap())))
        .unwrap();
    engine.set_search_space(space).unwrap();
    engine
}

fn assert_no_duplicates_and_contained(engine: &SearchEngine<SlotKey>) {
    let history = engine.history().unwrap();
    let space = engine.search_space().unwrap();
    let mut seen = HashSet::new();
    for (g, generation) in history.iter().enumerate() {
        for e in generation {
            assert!(seen.insert(e.key.clone()), "duplicate {} in generation {g}", e.key);
            if g > 0 {
                assert!(space.contains_key(&e.key), "{} outside search space", e.key);
            }
        }
    }
}

#[test]
fn pure_exploitation_returns_best_measured() {
    init_tracing();
    // First attribute is the measured value; values are a permutation of 0..10
    let space = EntryCollection::from_entries(
        vec!["value".into()],
        (0..10u32).map(|i| {
            let value = ((i * 7) % 10) as f64;
            entry(&[i, 100 + i], vec![value], value)
        }),
    );
    let initial = EntryCollection::from_entries(
        vec!["value".into()],
        vec![entry(&[50, 150], vec![4.5], 4.5), entry(&[51, 151], vec![0.5], 0.5)],
    );

    let config = SearchConfig::new(
        "exploit",
        StrategyConfig::ActiveLearning(ActiveLearningConfig {
            random_fraction: 0.0,
            worst_fraction: 0.0,
            ensemble: EnsembleConfig {
                members: 3,
                subsample_fraction: 1.0,
            },
        }),
    )
    .with_entries_per_generation(3)
    .with_seed(1);
    let registry = OperatorRegistry::with_defaults();
    let mut engine =
        SearchEngine::from_config(&config, &registry, Some(first_attribute_factory())).unwrap();
    engine.set_initial_data(initial).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&space).unwrap())))
        .unwrap();
    engine.set_search_space(space).unwrap();

    let batch = engine.step().unwrap();
    let keys: Vec<String> = batch.entries.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["7-107", "4-104", "1-101"]);
    assert!(!batch.exhausted);
}

#[test]
fn attempt_exhaustion_returns_partial_batch() {
    init_tracing();
    let initial = EntryCollection::from_entries(
        vec!["a".into(), "b".into()],
        vec![entry(&[0, 1], vec![0.0, 1.0], 1.0), entry(&[2, 0], vec![2.0, 0.0], 2.0)],
    );
    let space = EntryCollection::from_entries(
        vec!["a".into(), "b".into()],
        vec![entry(&[0, 2], vec![0.0, 2.0], 3.0), entry(&[2, 1], vec![2.0, 1.0], 4.0)],
    );
    let genetic = GeneticConfig {
        attempts_per_entry: 200,
        mutation_probability: 0.5,
        ..GeneticConfig::default()
    };
    let mut engine = genetic_engine(genetic, 5, initial, space, 2);

    let batch = engine.step().unwrap();
    assert!(batch.len() <= 2);
    assert!(batch.exhausted);
    assert_eq!(batch.attempts_used, 5 * 200);

    // The short batch is still a valid generation
    engine.submit(batch).unwrap();
    let index = engine.evaluate_pending().unwrap();
    assert_eq!(index, 1);
    assert!(engine.records()[0].exhausted);
}

#[test]
fn elite_carryover_reaches_past_the_window() {
    let names = vec!["a".into(), "b".into()];
    let mut history = GenerationHistory::new(EntryCollection::from_entries(
        names.clone(),
        vec![entry(&[0, 1], vec![0.0, 1.0], 100.0), entry(&[1, 2], vec![1.0, 2.0], 1.0)],
    ));
    history.push(EntryCollection::from_entries(
        names.clone(),
        vec![entry(&[2, 3], vec![2.0, 3.0], 5.0)],
    ));
    history.push(EntryCollection::from_entries(
        names,
        vec![entry(&[3, 4], vec![3.0, 4.0], 6.0), entry(&[4, 5], vec![4.0, 5.0], 7.0)],
    ));
    let full = history.all();
    let ranker = EntryRanker::simple(ObjectiveDirection::Maximize);
    let registry = OperatorRegistry::with_defaults();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let pool_for = |number_elite: usize, rng: &mut ChaCha8Rng| {
        let genetic = GeneticConfig {
            number_elite,
            previous_iterations: 1,
            ..GeneticConfig::default()
        };
        let search = GeneticSearch::from_registry(genetic, &registry).unwrap();
        let ctx = SearchContext {
            iteration: history.len(),
            history: &history,
            full_dataset: &full,
            search_space: None,
            ranker: &ranker,
            entries_per_generation: 4,
            rng,
        };
        search.breeding_pool(&ctx).unwrap()
    };

    let best = SlotKey::new(vec![0, 1]);
    let without_elite = pool_for(0, &mut rng);
    assert_eq!(without_elite.len(), 2);
    assert!(!without_elite.contains_key(&best));

    let with_elite = pool_for(1, &mut rng);
    assert_eq!(with_elite.len(), 3);
    assert!(with_elite.contains_key(&best));
    assert!(with_elite.contains_key(&SlotKey::new(vec![3, 4])));
}

#[test]
fn first_generation_breeds_from_seed_data() {
    let initial = pair_space(4).sample(5, &mut ChaCha8Rng::seed_from_u64(4));
    let history = GenerationHistory::new(initial.clone());
    let full = history.all();
    let ranker = EntryRanker::simple(ObjectiveDirection::Maximize);
    let genetic = GeneticConfig {
        previous_iterations: 0,
        number_elite: 3,
        ..GeneticConfig::default()
    };
    let search =
        GeneticSearch::from_registry(genetic, &OperatorRegistry::with_defaults()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let ctx = SearchContext {
        iteration: 1,
        history: &history,
        full_dataset: &full,
        search_space: None,
        ranker: &ranker,
        entries_per_generation: 4,
        rng: &mut rng,
    };
    let pool = search.breeding_pool(&ctx).unwrap();
    assert_eq!(pool.len(), initial.len());
}

#[test]
fn genetic_runs_never_repeat_or_leave_the_space() {
    init_tracing();
    let space = pair_space(8);
    let initial = space.sample(6, &mut ChaCha8Rng::seed_from_u64(6));
    let genetic = GeneticConfig {
        number_elite: 2,
        previous_iterations: 2,
        mutation_probability: 0.3,
        ..GeneticConfig::default()
    };
    let mut engine = genetic_engine(genetic, 5, initial, space, 7);

    let records = engine.run(5).unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.produced <= 5));
    assert_no_duplicates_and_contained(&engine);

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.len(), 6);
    let best: Vec<f64> = stats.generations.iter().filter_map(|g| g.best_so_far).collect();
    assert!(best.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn genetic_without_search_space_only_avoids_repeats() {
    let space = pair_space(6);
    let initial = space.sample(8, &mut ChaCha8Rng::seed_from_u64(8));
    let config = SearchConfig::new("open", StrategyConfig::default())
        .with_entries_per_generation(4)
        .with_seed(9);
    let mut engine: SearchEngine<SlotKey> =
        SearchEngine::from_config(&config, &OperatorRegistry::with_defaults(), None).unwrap();
    engine.set_initial_data(initial).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(ComputeOracle::new(
            |e: &Entry<SlotKey>| -> QrResult<f64> {
                Ok(e.key.slots().iter().map(|v| f64::from(*v)).sum())
            },
        ))))
        .unwrap();

    engine.run(3).unwrap();
    let all = engine.full_dataset(4).unwrap();
    let unique: HashSet<_> = all.keys().cloned().collect();
    assert_eq!(unique.len(), all.len());
    assert!(all.iter().all(|e| e.key.has_distinct_values()));
}

#[test]
fn active_learning_runs_never_repeat_or_leave_the_space() {
    init_tracing();
    let space = pair_space(7);
    let initial = space.sample(8, &mut ChaCha8Rng::seed_from_u64(10));
    let config = SearchConfig::new(
        "active",
        StrategyConfig::ActiveLearning(ActiveLearningConfig {
            random_fraction: 0.25,
            worst_fraction: 0.25,
            ensemble: EnsembleConfig {
                members: 4,
                subsample_fraction: 0.7,
            },
        }),
    )
    .with_entries_per_generation(8)
    .with_seed(11);
    let mut engine =
        SearchEngine::from_config(&config, &OperatorRegistry::with_defaults(), Some(knn_factory()))
            .unwrap();
    engine.set_initial_data(initial).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&space).unwrap())))
        .unwrap();
    engine.set_search_space(space.clone()).unwrap();

    // 42 identities, 8 seeds: four full generations, then a short one
    let records = engine.run(5).unwrap();
    assert!(records[..4].iter().all(|r| r.produced == 8 && !r.exhausted));
    assert_eq!(records[4].produced, 2);
    assert!(records[4].exhausted);
    assert_no_duplicates_and_contained(&engine);
    assert_eq!(engine.full_dataset(6).unwrap().len(), space.len());
}

#[test]
fn active_learning_requires_search_space() {
    let config = SearchConfig::new(
        "no_space",
        StrategyConfig::ActiveLearning(ActiveLearningConfig::default()),
    );
    let mut engine: SearchEngine<SlotKey> =
        SearchEngine::from_config(&config, &OperatorRegistry::with_defaults(), Some(knn_factory()))
            .unwrap();
    let space = pair_space(4);
    engine.set_initial_data(space.sample(3, &mut ChaCha8Rng::seed_from_u64(12))).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&space).unwrap())))
        .unwrap();
    let err = engine.step().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("search space"));
}

#[test]
fn lookup_miss_is_fatal_for_the_generation() {
    let space = pair_space(5);
    let initial = space.sample(4, &mut ChaCha8Rng::seed_from_u64(13));
    // The oracle only knows the seed data
    let mut engine = genetic_engine(GeneticConfig::default(), 3, initial.clone(), space, 14);
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&initial).unwrap())))
        .unwrap();

    let batch = engine.step().unwrap();
    assert!(!batch.is_empty());
    engine.submit(batch).unwrap();
    match engine.evaluate_pending() {
        Err(QrError::Oracle(OracleError::MissingEntry { .. })) => {}
        other => panic!("expected missing entry, got {other:?}"),
    }
    assert_eq!(engine.current_iteration(), 0);
    assert_eq!(engine.state(), SearchState::AwaitingEvaluation);
}

#[test]
fn seeded_runs_are_reproducible() {
    let space = pair_space(8);
    let initial = space.sample(6, &mut ChaCha8Rng::seed_from_u64(15));
    let keys = |seed: u64| {
        let mut engine = genetic_engine(
            GeneticConfig::default(),
            6,
            initial.clone(),
            space.clone(),
            seed,
        );
        engine.run(2).unwrap();
        engine
            .full_dataset(3)
            .unwrap()
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(16), keys(16));
}

#[test]
fn config_file_drives_engine() {
    let json = r#"{
        "name": "from_json",
        "entries_per_generation": 4,
        "seed": 17,
        "direction": "minimize",
        "objective": {"name": "target", "target": 5.0},
        "strategy": {"type": "genetic", "crossover": "pooled", "mutation": "pooled", "number_elite": 1}
    }"#;
    let config = SearchConfig::from_json_str(json).unwrap();
    let mut engine: SearchEngine<SlotKey> =
        SearchEngine::from_config(&config, &OperatorRegistry::with_defaults(), None).unwrap();
    assert_eq!(engine.name(), "from_json");
    assert_eq!(engine.strategy_name(), "genetic");
    assert_eq!(engine.ranker().unwrap().objective_name(), "target");

    let space = pair_space(6);
    engine.set_initial_data(space.sample(5, &mut ChaCha8Rng::seed_from_u64(18))).unwrap();
    engine
        .set_oracle(Oracle::new(Box::new(LookupOracle::new(&space).unwrap())))
        .unwrap();
    engine.set_search_space(space).unwrap();
    engine.run(2).unwrap();
    assert_no_duplicates_and_contained(&engine);

    // Closest to the target under the target objective
    let best = engine.best_entry().unwrap().unwrap();
    let all = engine.full_dataset(3).unwrap();
    let distance = |e: &Entry<SlotKey>| (e.measured.unwrap() - 5.0).abs();
    assert!(all.iter().all(|e| distance(e) >= distance(&best)));
}

#[test]
fn unknown_operator_is_reported() {
    let config = SearchConfig::new(
        "bad",
        StrategyConfig::Genetic(GeneticConfig {
            crossover: "uniform".to_string(),
            ..GeneticConfig::default()
        }),
    );
    let err =
        SearchEngine::<SlotKey>::from_config(&config, &OperatorRegistry::with_defaults(), None)
            .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("positional"));
}
