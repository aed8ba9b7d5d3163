use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::ProfileConfig;
use crate::scheduler::RunStats;
use crate::shard::{Shard, ShardStats};

pub struct Profiler {
    cpu: Option<Artifact>,
    memory: Option<Artifact>
}

struct Artifact {
    path: PathBuf,
    file: File
}

impl Artifact {
    fn create(path: &Path, kind: &str) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("could not create {kind} profile {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), file })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub total: Duration,
    pub merge: Duration
}

impl Profiler {
    pub fn start(config: &ProfileConfig) -> Result<Self> {
        let cpu = config
            .cpu
            .as_deref()
            .map(| path | Artifact::create(path, "CPU"))
            .transpose()?;
        let memory = config
            .memory
            .as_deref()
            .map(| path | Artifact::create(path, "memory"))
            .transpose()?;
        Ok(Self { cpu, memory })
    }

    pub fn finish(self, stats: &RunStats, timings: &Timings, shards: &[Shard]) -> Result<()> {
        if let Some(artifact) = self.cpu {
            let mut out = BufWriter::new(&artifact.file);
            write_cpu_profile(&mut out, stats, timings)
                .with_context(|| format!("could not write CPU profile {}", artifact.path.display()))?;
        }
        if let Some(artifact) = self.memory {
            let mut out = BufWriter::new(&artifact.file);
            write_memory_profile(&mut out, shards)
                .with_context(|| format!("could not write memory profile {}", artifact.path.display()))?;
        }
        Ok(())
    }
}

fn write_cpu_profile<W: Write>(out: &mut W, stats: &RunStats, timings: &Timings) -> Result<()> {
    let aggregate = timings.total.saturating_sub(timings.merge);
    writeln!(out, "phase\tmillis")?;
    writeln!(out, "total\t{:.3}", millis(timings.total))?;
    writeln!(out, "aggregate\t{:.3}", millis(aggregate))?;
    writeln!(out, "read\t{:.3}", millis(stats.read_time))?;
    writeln!(out, "barrier_wait\t{:.3}", millis(stats.wait_time))?;
    writeln!(out, "merge_and_report\t{:.3}", millis(timings.merge))?;
    writeln!(out)?;
    writeln!(out, "blocks\t{}", stats.blocks)?;
    writeln!(out, "batches\t{}", stats.batches)?;
    writeln!(out, "bytes\t{}", stats.bytes)?;
    writeln!(out, "newlines\t{}", stats.newlines)?;
    out.flush()?;
    Ok(())
}

fn write_memory_profile<W: Write>(out: &mut W, shards: &[Shard]) -> Result<()> {
    let mut total = ShardStats::default();
    writeln!(out, "shard\tkeys\tarena_bytes\tarena_capacity\ttable_capacity")?;
    for (index, shard) in shards.iter().enumerate() {
        let stats = shard.stats();
        writeln!(
            out,
            "{index}\t{}\t{}\t{}\t{}",
            stats.keys, stats.arena_bytes, stats.arena_capacity, stats.table_capacity
        )?;
        total.keys += stats.keys;
        total.arena_bytes += stats.arena_bytes;
        total.arena_capacity += stats.arena_capacity;
        total.table_capacity += stats.table_capacity;
    }
    writeln!(
        out,
        "total\t{}\t{}\t{}\t{}",
        total.keys, total.arena_bytes, total.arena_capacity, total.table_capacity
    )?;
    out.flush()?;
    Ok(())
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseMode;

    #[test]
    fn unwritable_path_fails_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProfileConfig {
            cpu: Some(dir.path().join("missing").join("cpu.prof")),
            memory: None
        };
        assert!(Profiler::start(&config).is_err());
    }

    #[test]
    fn writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProfileConfig {
            cpu: Some(dir.path().join("cpu.prof")),
            memory: Some(dir.path().join("mem.prof"))
        };
        let profiler = Profiler::start(&config).unwrap();

        let mut shard = Shard::new();
        shard.parse_and_add_lines(b"a;1.0\nb;2.0\n", ParseMode::Lenient).unwrap();
        let stats = RunStats { blocks: 1, batches: 1, bytes: 12, newlines: 2, ..Default::default() };
        profiler.finish(&stats, &Timings::default(), &[shard]).unwrap();

        let cpu = std::fs::read_to_string(dir.path().join("cpu.prof")).unwrap();
        assert!(cpu.contains("blocks\t1"));
        let memory = std::fs::read_to_string(dir.path().join("mem.prof")).unwrap();
        assert!(memory.lines().any(| line | line.starts_with("total\t2\t2\t")));
    }
}
