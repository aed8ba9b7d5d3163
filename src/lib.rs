use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

pub mod config;
pub mod mapped;
pub mod measurement;
pub mod parse;
pub mod profile;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod shard;

pub use config::{Config, Engine, ParseMode, ProfileConfig};
pub use measurement::Measurement;
pub use report::Merged;
pub use scheduler::RunStats;
pub use shard::Shard;

pub struct Aggregation {
    pub shards: Vec<Shard>,
    pub stats: RunStats
}

impl Aggregation {
    pub fn merged(&self) -> Merged<'_> {
        Merged::from_shards(&self.shards)
    }
}

pub fn aggregate<R: Read>(reader: R, config: &Config) -> Result<Aggregation> {
    let (shards, stats) = scheduler::aggregate_stream(reader, config)?;
    Ok(Aggregation { shards, stats })
}

pub fn aggregate_file(path: &Path, config: &Config) -> Result<Aggregation> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let (shards, stats) = match config.engine {
        Engine::Pipeline => scheduler::aggregate_stream(file, config),
        Engine::Mapped => mapped::aggregate_mapped(&file, config),
    }
    .with_context(|| format!("failed to aggregate {}", path.display()))?;
    Ok(Aggregation { shards, stats })
}

pub fn run<W: Write>(path: &Path, config: &Config, out: &mut W) -> Result<RunStats> {
    let profiler = profile::Profiler::start(&config.profile)?;

    let started = Instant::now();
    let aggregation = aggregate_file(path, config)?;

    let merge_start = Instant::now();
    aggregation.merged().write_output(out).context("failed to write summary")?;
    let timings = profile::Timings { total: started.elapsed(), merge: merge_start.elapsed() };

    profiler.finish(&aggregation.stats, &timings, &aggregation.shards)?;
    Ok(aggregation.stats)
}
