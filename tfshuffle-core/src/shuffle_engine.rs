//! Decides the output shard and the position within that shard of every input record.
//!
//! Two strategies, selected by `step`:
//!
//! * `Unconstrained` (`step = -1`): the whole dataset is loaded into one window, permuted
//!   uniformly, then handed off. Every one of the `T!` orders is equally likely.
//! * `Windowed(Y)` (`step = Y > 0`): consecutive runs of `Y` source records are loaded,
//!   permuted and handed off one window at a time. At most `Y` records are resident.
//!
//! The windowed strategy is an approximation of a global shuffle. Records are uniformly
//! mixed inside a window, but windows are handed off in source order and never interleave:
//! every record of window `k` is assigned a cursor position before any record of window
//! `k + 1`. A dataset whose input shards are sorted stays coarsely sorted at the scale of
//! `Y`. Use the largest `step` that fits in memory.
//!
//! The output shard is chosen by the `ShardCursor` alone, so shard sizes are balanced the
//! same way in both strategies.

use anyhow::Result;
use coarsetime::Instant;
use log::info;
use rand::Rng;
use std::num::NonZeroUsize;

use crate::error::{raise, ShuffleError};
use crate::error_bail;
use crate::record::{Record, RecordSink};
use crate::shard_cursor::ShardCursor;
use crate::tool::{percent, progress_interval};
use crate::window::Window;

/// `step` value selecting the unconstrained strategy.
pub const STEP_ALL: i64 = -1;

/// How many records may be resident at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleStrategy {
    /// Load everything, uniform global shuffle.
    Unconstrained,

    /// Shuffle consecutive windows of at most this many records.
    Windowed(NonZeroUsize),
}

impl ShuffleStrategy {
    /// Parse the `step` option. Anything other than `-1` or a positive integer is rejected.
    pub fn from_step(step: i64) -> Result<Self> {
        if step == STEP_ALL {
            return Ok(ShuffleStrategy::Unconstrained);
        }

        let window = usize::try_from(step).ok().and_then(NonZeroUsize::new);

        match window {
            Some(window) => Ok(ShuffleStrategy::Windowed(window)),
            None => raise(ShuffleError::config(format!(
                "step must be {} or a positive integer, got: {}",
                STEP_ALL, step
            ))),
        }
    }

    /// Max number of records in one window, `None` when unbounded.
    pub fn window_limit(&self) -> Option<usize> {
        match self {
            ShuffleStrategy::Unconstrained => None,
            ShuffleStrategy::Windowed(window) => Some(window.get()),
        }
    }
}

impl std::fmt::Display for ShuffleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShuffleStrategy::Unconstrained => write!(f, "unconstrained (whole dataset in memory)"),
            ShuffleStrategy::Windowed(window) => write!(f, "windowed (step = {})", window),
        }
    }
}

/// Outcome of one `ShuffleEngine::run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleStats {
    /// Total number of records handed off.
    pub total: u64,

    /// Number of windows shuffled and flushed.
    pub windows: u64,

    /// Largest number of records resident at once.
    pub max_window_len: usize,

    /// Records handed off per output shard.
    pub shard_counts: Vec<u64>,
}

/// The shuffle engine.
///
/// The random generator is injected so that a run can be reproduced from a seed.
pub struct ShuffleEngine<R: Rng> {
    strategy: ShuffleStrategy,

    rng: R,

    cursor: ShardCursor,
}

impl<R: Rng> ShuffleEngine<R> {
    pub fn new(strategy: ShuffleStrategy, num_shards: usize, rng: R) -> Result<Self> {
        let num_shards = match NonZeroUsize::new(num_shards) {
            Some(num_shards) => num_shards,
            None => {
                return raise(ShuffleError::config(
                    "number of output shards must be at least 1",
                ))
            }
        };

        Ok(Self {
            strategy,
            rng,
            cursor: ShardCursor::new(num_shards),
        })
    }

    /// Drain `source`, handing every record to `sink` in shuffled order.
    ///
    /// The first source or sink error stops the run and is returned as is. Records already
    /// handed off stay in the sink.
    pub fn run<I, S>(&mut self, source: I, sink: &mut S) -> Result<ShuffleStats>
    where
        I: IntoIterator<Item = Result<Record>>,
        S: RecordSink + ?Sized,
    {
        if sink.num_shards() != self.cursor.num_shards() {
            error_bail!(
                "sink has {} shards, but the engine assigns {} shards",
                sink.num_shards(),
                self.cursor.num_shards()
            );
        }

        info!("-> Shuffling records, strategy: {}", self.strategy);

        let mut stats = ShuffleStats {
            shard_counts: vec![0; self.cursor.num_shards()],
            ..Default::default()
        };

        let mut window = Window::new(self.strategy.window_limit());

        if self.strategy == ShuffleStrategy::Unconstrained {
            info!("-> Reading input");
        }

        for record in source {
            window.push(record?)?;

            if window.is_full() {
                self.flush_window(&mut window, sink, &mut stats)?;
            }
        }

        if !window.is_empty() {
            self.flush_window(&mut window, sink, &mut stats)?;
        }

        info!(
            "-> Shuffled {} records in {} window(s), largest window: {}",
            stats.total, stats.windows, stats.max_window_len
        );

        Ok(stats)
    }

    fn flush_window<S>(
        &mut self,
        window: &mut Window,
        sink: &mut S,
        stats: &mut ShuffleStats,
    ) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        let start = Instant::now();
        let window_len = window.len();

        stats.max_window_len = stats.max_window_len.max(window_len);

        window.shuffle(&mut self.rng);

        // Only the unconstrained strategy knows the total before writing.
        let interval = progress_interval(window_len as u64);
        let log_progress = self.strategy == ShuffleStrategy::Unconstrained;

        if log_progress {
            info!("-> Writing {} shuffled records to output", window_len);
        }

        for (i, record) in window.drain().enumerate() {
            let shard = self.cursor.assign();
            sink.append(shard, record)?;

            stats.shard_counts[shard] += 1;
            stats.total += 1;

            let written = i as u64 + 1;
            if log_progress && written % interval == 0 {
                info!(
                    "--> Written {} / {} records ({})",
                    written,
                    window_len,
                    percent(written, window_len as u64)
                );
            }
        }

        stats.windows += 1;

        if !log_progress {
            info!(
                "--> Flushed window {}, {} records, {} records written so far, took {:.3}s",
                stats.windows,
                window_len,
                stats.total,
                start.elapsed().as_f64()
            );
        }

        Ok(())
    }
}
