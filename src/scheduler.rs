use std::io::Read;
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use memchr::memchr_iter;
use tracing::{debug, info};

use crate::config::{Config, ParseMode};
use crate::parse::NEWLINE;
use crate::scanner::BlockReader;
use crate::shard::Shard;

const MIN_BATCH_LINES: usize = 10;

pub struct Batch {
    block: Arc<Vec<u8>>,
    range: Range<usize>
}

impl Batch {
    pub fn bytes(&self) -> &[u8] {
        &self.block[self.range.clone()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub blocks: u64,
    pub batches: u64,
    pub bytes: u64,
    pub newlines: u64,
    pub read_time: Duration,
    pub wait_time: Duration
}

pub fn batch_step(lines: usize, workers: usize) -> usize {
    (lines + 1).min(MIN_BATCH_LINES.max((lines + 1) / workers.max(1) + 1))
}

// Every `step`-th newline closes a batch; the tail is always emitted, even when empty.
pub fn split_block(data: &[u8], workers: usize) -> Vec<Range<usize>> {
    let lines = memchr_iter(NEWLINE, data).count();
    let step = batch_step(lines, workers);

    let mut batches = Vec::with_capacity(lines / step + 1);
    let mut batch_start = 0;
    for (n, position) in memchr_iter(NEWLINE, data).enumerate() {
        if (n + 1) % step == 0 {
            batches.push(batch_start..position);
            batch_start = position + 1;
        }
    }
    batches.push(batch_start..data.len());
    batches
}

pub fn aggregate_stream<R: Read>(reader: R, config: &Config) -> Result<(Vec<Shard>, RunStats)> {
    let workers = config.workers.max(1);
    let (batch_tx, batch_rx) = crossbeam_channel::bounded::<Batch>(0);
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<Result<()>>();

    info!(workers, buffer_size = config.buffer_size, mode = ?config.parse_mode, "starting worker pool");

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let batches = batch_rx.clone();
        let done = done_tx.clone();
        let mode = config.parse_mode;
        let handle = thread::Builder::new()
            .name(format!("brc-worker-{id}"))
            .spawn(move || work(batches, done, mode))
            .context("failed to spawn worker thread")?;
        handles.push(handle);
    }
    drop(batch_rx);
    drop(done_tx);

    let scheduled = schedule(reader, config, workers, &batch_tx, &done_rx);
    drop(batch_tx);

    let mut shards = Vec::with_capacity(workers);
    for handle in handles {
        let shard = handle.join().map_err(| _ | anyhow!("worker thread panicked"))?;
        shards.push(shard);
    }

    let stats = scheduled?;
    info!(
        blocks = stats.blocks,
        batches = stats.batches,
        bytes = stats.bytes,
        "input exhausted"
    );
    Ok((shards, stats))
}

fn schedule<R: Read>(
    reader: R,
    config: &Config,
    workers: usize,
    batch_tx: &Sender<Batch>,
    done_rx: &Receiver<Result<()>>
) -> Result<RunStats> {
    let mut blocks = BlockReader::with_capacity(config.buffer_size, reader);
    let mut stats = RunStats::default();

    loop {
        let read_start = Instant::now();
        let Some(range) = blocks.next_block()? else {
            break;
        };
        stats.read_time += read_start.elapsed();

        let shared = blocks.shared();
        let batches = split_block(&shared[range.clone()], workers);
        let newlines = memchr_iter(NEWLINE, &shared[range.clone()]).count();
        debug!(
            block = stats.blocks,
            bytes = range.len(),
            newlines,
            batches = batches.len(),
            "dispatching block"
        );

        for batch in &batches {
            let batch = Batch {
                block: Arc::clone(&shared),
                range: range.start + batch.start..range.start + batch.end
            };
            batch_tx.send(batch).map_err(| _ | anyhow!("worker pool shut down early"))?;
        }
        drop(shared);

        let wait_start = Instant::now();
        let mut failure = None;
        for _ in 0..batches.len() {
            let outcome = done_rx.recv().context("worker pool shut down early")?;
            if let Err(err) = outcome {
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
        stats.wait_time += wait_start.elapsed();

        if let Some(err) = failure {
            return Err(err.context(format!("failed to aggregate block {}", stats.blocks)));
        }

        stats.blocks += 1;
        stats.batches += batches.len() as u64;
        stats.newlines += newlines as u64;
    }

    stats.bytes = blocks.bytes_read();
    Ok(stats)
}

/// Acknowledges one batch when dropped, also while unwinding.
struct Ack<'a> {
    done: &'a Sender<Result<()>>,
    outcome: Option<Result<()>>
}

impl Drop for Ack<'_> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err(anyhow!("worker panicked while parsing")));
        // The scheduler only stops listening once it is already failing.
        let _ = self.done.send(outcome);
    }
}

fn work(batches: Receiver<Batch>, done: Sender<Result<()>>, mode: ParseMode) -> Shard {
    let mut shard = Shard::new();
    for batch in batches {
        let mut ack = Ack { done: &done, outcome: None };
        ack.outcome = Some(shard.parse_and_add_lines(batch.bytes(), mode));
        drop(batch);
        drop(ack);
    }
    shard
}
