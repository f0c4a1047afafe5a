// Sample input for the tiny-highlight demo
//
// Run with `cargo run -- assets/sample.rs` and try `--async` or
// `--theme monokai`. The demo comments out the first line inside the first
// block to show the edit being re-highlighted.

use std::collections::HashMap;

/// Counts words in a line of text
#[derive(Debug, Default)]
struct WordCount {
    counts: HashMap<String, usize>,
}

impl WordCount {
    fn add(&mut self, line: &str) {
        for word in line.split_whitespace() {
            *self.counts.entry(word.to_lowercase()).or_insert(0) += 1;
        }
    }
}

fn main() {
    let mut words = WordCount::default();
    words.add("the quick brown fox jumps over the lazy dog");

    let total: usize = words.counts.values().sum();
    println!("{} words, {} distinct", total, words.counts.len());
}
