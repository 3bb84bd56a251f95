use qr_types::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Quarry basic usage example");

    // Create a few ternary candidates (three distinct element ids each)
    let keys = [[1u32, 8, 26], [1, 8, 27], [3, 8, 26], [1, 9, 26]];
    let mut seed = EntryCollection::new(vec!["mean_z".to_string()]);
    for (i, slots) in keys.iter().enumerate() {
        let key = SlotKey::new(slots.to_vec());
        let mean_z = slots.iter().map(|z| f64::from(*z)).sum::<f64>() / 3.0;
        let entry = Entry::new(key)
            .with_attributes(vec![mean_z])
            .with_measured(i as f64 * 0.5);
        seed.add_entry(entry);
    }
    println!("Created seed collection with {} entries", seed.len());

    // Duplicates by identity are ignored
    let duplicate = Entry::new(SlotKey::new(vec![1, 8, 26])).with_measured(99.0);
    println!("Duplicate inserted: {}", seed.add_entry(duplicate));

    // Build a generation history
    let mut history = GenerationHistory::new(seed.clone());
    let next = EntryCollection::from_entries(
        seed.attribute_names().to_vec(),
        vec![Entry::new(SlotKey::new(vec![5, 8, 26])).with_measured(2.5)],
    );
    history.push(next);
    println!(
        "History holds {} generations, {} entries in total",
        history.len(),
        history.all().len()
    );

    // Random subsets are drawn without replacement
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let subset = history.all().sample(2, &mut rng);
    for entry in &subset {
        println!("  sampled {} (measured {:?})", entry.key, entry.measured);
    }

    // Error handling
    let result: QrResult<()> = Err(ConfigError::out_of_range("random_fraction", 1.5, "[0, 1]").into());
    if let Err(e) = result {
        println!("Error handling works: {}", e);
    }

    Ok(())
}
