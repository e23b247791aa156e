//! Walkthrough of the sequence API: sources, laziness, single-use handles,
//! sequential vs parallel evaluation, and the common terminals and stages.
//!
//! Run with: cargo run --bin sequence_demo
//! Set RUST_LOG=seqflow=debug to watch terminals and chunking.

use colored::Colorize;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seqflow::{sequence, EngineConfig, Sequence, SequenceError};
use tracing_subscriber::EnvFilter;

fn heading(title: &str) {
    println!("\n{}", format!("=== {title} ===").bold().cyan());
}

fn print_element(value: i32) {
    let thread = std::thread::current();
    println!("  {} {}", value, thread.name().unwrap_or("unnamed").dimmed());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seqflow=info".parse()?))
        .init();

    tracing::info!(config = ?EngineConfig::global(), "engine configuration");

    let int_list = vec![1, 2, 3, 4, 5];

    heading("Sources");
    println!("from_collection: {}", Sequence::from_collection(int_list.clone()).count()?);
    println!("of(1, 2, 3):     {}", Sequence::of([1, 2, 3]).count()?);
    println!("of(5):           {}", sequence![5].count()?);
    println!("of():            {}", Sequence::<String>::of([]).count()?);
    println!("empty():         {}", Sequence::<String>::empty().count()?);

    heading("Sequential vs parallel");
    println!("Sequential:");
    Sequence::of([5, 6, 7]).for_each(print_element)?;
    println!("Parallel:");
    Sequence::of([5, 6, 7]).parallel()?.for_each(print_element)?;

    heading("Unbounded sources");
    // The random source is handed to the supplier, not kept in a global.
    let mut rng = StdRng::from_entropy();
    let random = Sequence::generate(move || rng.gen::<i32>())
        .limit(5)?
        .to_list()?;
    println!("generate(random).limit(5): {}", random.iter().join(", "));

    let mut infinite = Sequence::iterate(10, |x| x + 2);
    let mut twenty = infinite.limit(20)?;
    println!("iterate(10, +2).limit(20): {}", twenty.iter()?.join(" "));
    match twenty.count() {
        Err(SequenceError::ClosedSequence) => println!(
            "{}",
            "count() on the consumed handle: sequence already closed".yellow()
        ),
        other => println!("unexpected: {other:?}"),
    }
    if let Err(err) = infinite.limit(5) {
        println!("{}", format!("limit() on the linked handle: {err}").yellow());
    }

    let bounded = Sequence::iterate_while(10, |x| *x <= 48, |x| x + 2).to_list()?;
    println!("iterate(10, <=48, +2): {}", bounded.iter().join(" "));

    heading("Terminal operations");
    // count() on Sequence::iterate(0, +2) would never return; bound it first.
    if let Some(max) = Sequence::from_collection(int_list.clone()).max_by(|a, b| a.cmp(b))? {
        println!("Max value in int_list is: {max}");
    }
    println!("find_first: {:?}", Sequence::iterate(10, |x| x + 2).find_first()?);
    println!("find_any:   {:?}", Sequence::iterate(10, |x| x + 2).find_any()?);
    println!(
        "any_match(== 20): {}",
        Sequence::iterate(10, |x| x + 2).any_match(|x| *x == 20)?
    );

    let sum = Sequence::from_collection(int_list.clone()).reduce(|a, b| a + b)?;
    let product = Sequence::from_collection(int_list.clone()).reduce(|a, b| a * b)?;
    println!("reduce(+): {sum:?}");
    println!("reduce(*): {product:?}");

    let copy: Vec<i32> = Sequence::from_collection(int_list.clone()).collect()?;
    println!("collect: {copy:?}");

    heading("Intermediate operations");
    let evens = Sequence::from_collection(int_list.clone())
        .filter(|x| x % 2 == 0)?
        .to_list()?;
    println!("filter(even): {evens:?}");

    let words = vec!["hello", "world", "hello", "duck", "whatever", "hello"];
    let set = Sequence::from_collection(words.clone()).to_set()?;
    println!("to_set:   {}", set.iter().sorted().join(", "));
    let unique = Sequence::from_collection(words).distinct()?.to_list()?;
    println!("distinct: {}", unique.join(", "));

    print!("iterate(1, +1).skip(5).limit(5): ");
    Sequence::iterate(1, |x| x + 1)
        .skip(5)?
        .limit(5)?
        .for_each_ordered(|x| print!("{x}"))?;
    println!();

    Ok(())
}
