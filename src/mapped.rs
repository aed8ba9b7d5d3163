use std::fs::File;
use std::time::Instant;

use anyhow::{Context, Result};
use bstr::ByteSlice;
use memmap2::MmapOptions;
use rayon::prelude::*;
use tracing::debug;

use crate::config::Config;
use crate::parse::NEWLINE;
use crate::scheduler::RunStats;
use crate::shard::Shard;

pub fn aggregate_mapped(file: &File, config: &Config) -> Result<(Vec<Shard>, RunStats)> {
    let size = file.metadata().context("failed to stat input")?.len() as usize;
    if size == 0 {
        return Ok((Vec::new(), RunStats::default()));
    }

    let started = Instant::now();
    let mmap = unsafe { MmapOptions::new().map(file).context("failed to map input")? };
    let regions = find_chunk_boundaries(&mmap, config.workers.max(1));
    debug!(size, regions = regions.len(), "mapped input");

    let mode = config.parse_mode;
    let shards = regions
        .par_iter()
        .map(
            | (start, end) | {
                let mut shard = Shard::new();
                shard.parse_and_add_lines(&mmap[*start..*end], mode)?;
                Ok(shard)
            }
        )
        .collect::<Result<Vec<_>>>()?;

    let stats = RunStats {
        blocks: 1,
        batches: regions.len() as u64,
        bytes: size as u64,
        newlines: bytecount(&mmap),
        read_time: started.elapsed(),
        wait_time: Default::default()
    };
    Ok((shards, stats))
}

pub fn find_chunk_boundaries(buffer: &[u8], parts: usize) -> Vec<(usize, usize)> {
    let size = buffer.len();
    let chunk_size = size / parts;

    let mut starts: Vec<usize> = vec![0];
    for part in 1..parts {
        let start = find_next_newline(part * chunk_size, buffer);
        if start > *starts.last().unwrap_or(&0) && start < size {
            starts.push(start);
        }
    }

    let mut ends: Vec<usize> = starts[1..].to_vec();
    ends.push(size);
    starts.into_iter().zip(ends).collect()
}

fn find_next_newline(start: usize, buffer: &[u8]) -> usize {
    match buffer[start..].find_byte(NEWLINE) {
        Some(position) => start + position + 1,
        None => buffer.len()
    }
}

fn bytecount(buffer: &[u8]) -> u64 {
    memchr::memchr_iter(NEWLINE, buffer).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn regions_start_after_newlines() {
        let data = b"aa;1.0\nbbbb;2.0\nc;3.0\ndddddd;4.0\ne;5.0\n";
        let regions = find_chunk_boundaries(data, 4);
        assert_eq!(regions.first().map(| r | r.0), Some(0));
        assert_eq!(regions.last().map(| r | r.1), Some(data.len()));
        for window in regions.windows(2) {
            assert_eq!(window[0].1, window[1].0);
            assert_eq!(data[window[1].0 - 1], b'\n');
        }
    }

    #[test]
    fn more_parts_than_lines() {
        let data = b"a;1.0\n";
        assert_eq!(find_chunk_boundaries(data, 8), vec![(0, data.len())]);
    }

    #[test]
    fn mapped_counts_every_record() {
        let mut file = tempfile::tempfile().unwrap();
        for i in 0..1_000 {
            writeln!(file, "s{};{}.5", i % 17, i % 40).unwrap();
        }
        let config = Config::default().with_workers(4);
        let (shards, stats) = aggregate_mapped(&file, &config).unwrap();
        let total: u64 = shards
            .iter()
            .flat_map(| shard | shard.iter())
            .map(| (_, m) | m.count)
            .sum();
        assert_eq!(total, 1_000);
        assert_eq!(stats.newlines, 1_000);
    }

    #[test]
    fn empty_file_is_not_mapped() {
        let file = tempfile::tempfile().unwrap();
        let (shards, stats) = aggregate_mapped(&file, &Config::default()).unwrap();
        assert!(shards.is_empty());
        assert_eq!(stats, RunStats::default());
    }
}
