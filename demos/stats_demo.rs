use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use treebin_hash::Config;
use treebin_hash::HashTable;
use treebin_hash::TableError;
use treebin_hash::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "items", default_value_t = 1000)]
    items: usize,

    /// Keep only the low bits of every hash, so keys pile up in a few
    /// buckets.
    #[arg(long = "collide")]
    collide: bool,

    /// Largest bucket count the table may grow to. Must be a power of two.
    #[arg(short = 'm', long = "max_buckets", default_value_t = 1 << 30)]
    max_buckets: usize,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    let args = Args::parse();

    let config = Config::default().max_buckets(args.max_buckets);
    let mut table: HashTable<u64> = match HashTable::with_config(config) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    println!(
        "Filling table with {} u64 values{}...",
        args.items,
        if args.collide { " (colliding hashes)" } else { "" }
    );

    let mut num_failures = 0;
    let mut last_error: Option<TableError> = None;
    for i in 0..args.items {
        let value = i as u64;
        let hash = if args.collide {
            hash_u64(value) & 0x3F
        } else {
            hash_u64(value)
        };

        match table.entry(hash, |&v| v == value) {
            Entry::Vacant(entry) => {
                if let Err(err) = entry.try_insert(value) {
                    num_failures += 1;
                    last_error = Some(err);
                }
            }
            Entry::Occupied(_) => {
                panic!("Value already exists in table: {}", value);
            }
        }
    }

    println!("Inserted {} values into table", table.len());
    println!(
        "Final load factor: {:.2}%",
        (table.len() as f64 / table.bucket_count() as f64) * 100.0
    );

    table.bucket_stats().print();
    table.print_bucket_histogram();
    println!(
        "Number of inserts over capacity: {} ({:.02}%)",
        num_failures,
        num_failures as f64 / args.items.max(1) as f64 * 100.0
    );
    if let Some(err) = last_error {
        println!("Last growth error: {err}");
    }
}
