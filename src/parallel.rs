//! Dictionary sharding across a fixed-size thread pool.
//!
//! Every extraction operation is a pure function over one entry's text, so a
//! batch run shards the entry dictionary into contiguous chunks, processes
//! each chunk on its own thread, and merges the keyed results. Keys are
//! unique, so the merge is commutative and worker completion order never
//! affects the output.

use std::collections::BTreeMap;
use std::thread;

use crate::pipeline::{map_filter, StageOutput, StageValue};

/// Worker-pool sizing for batch extraction.
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use
    pub num_threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        // Detect CPU count using std
        let cpus = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self { num_threads: cpus }
    }
}

/// Parallel counterpart of [`map_filter`](crate::pipeline::map_filter):
/// contiguous key shards, one scoped thread per shard, merged hit/miss maps.
pub fn map_filter_parallel<V>(
    entries: &BTreeMap<String, String>,
    f: impl Fn(&str) -> V + Sync,
    config: &ParallelConfig,
) -> StageOutput<V>
where
    V: StageValue + Send,
{
    if entries.is_empty() || config.num_threads <= 1 {
        return map_filter(entries, f);
    }

    let pairs: Vec<(&String, &String)> = entries.iter().collect();
    let num_threads = config.num_threads.min(pairs.len()).max(1);
    let chunk_size = (pairs.len() + num_threads - 1) / num_threads;

    let f = &f;
    let shards: Vec<StageOutput<V>> = thread::scope(|scope| {
        let handles: Vec<_> = pairs
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    let mut shard = StageOutput::default();
                    for &(word, text) in chunk {
                        let value = f(text);
                        if value.is_miss() {
                            shard.misses.insert(word.clone(), text.clone());
                        } else {
                            shard.hits.insert(word.clone(), value);
                        }
                    }
                    shard
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("extraction worker panicked"))
            .collect()
    });

    let mut merged = StageOutput::default();
    for shard in shards {
        merged.hits.extend(shard.hits);
        merged.misses.extend(shard.misses);
    }
    merged
}
