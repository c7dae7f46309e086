use anyhow::{anyhow, Context, Result};
use likely_stable::unlikely;
use log::{error, info, warn};
use std::path::PathBuf;

use crate::error::{raise, ShuffleError};
use crate::error_bail;
use crate::record::{Record, RecordSink};
use crate::record_codec::{Compression, ShardStream, TfRecordWriter};

/// Name of output shard `index` out of `num_shards`.
///
/// Example: `out/train-00001-of-00004.tfrecord.gz`.
pub fn shard_filename(
    prefix: &str,
    index: usize,
    num_shards: usize,
    compression: Compression,
) -> PathBuf {
    PathBuf::from(format!(
        "{}-{:05}-of-{:05}{}",
        prefix,
        index,
        num_shards,
        compression.extension()
    ))
}

/// Glob-like pattern matching every output shard, as written in the dataset summary.
pub fn shard_pattern(prefix: &str, compression: Compression) -> String {
    format!("{}-?????-of-?????{}", prefix, compression.extension())
}

/// One finalized output shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub filename: PathBuf,
    pub count: u64,
}

/// All output shards of a successful run, in shard index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    pub shards: Vec<ShardInfo>,
}

impl ShardReport {
    pub fn total(&self) -> u64 {
        self.shards.iter().map(|s| s.count).sum()
    }
}

/// Owns one output stream per shard for the whole run.
///
/// All streams are opened by `create` and stay open until `finish`. Records are appended in
/// hand-off order, nothing is buffered across shards. If the writer is dropped without
/// `finish`, for example while an error propagates, every stream still open is finalized
/// so no shard is left with a missing gzip trailer.
pub struct ShardWriter {
    /// Output file names, index is the shard index.
    filenames: Vec<PathBuf>,

    /// `None` once the stream is finalized.
    writers: Vec<Option<TfRecordWriter<ShardStream>>>,

    /// Records appended per shard.
    counts: Vec<u64>,
}

impl ShardWriter {
    /// Create `num_shards` output files named after `prefix`.
    ///
    /// If a file cannot be created, the ones created before it are finalized and the error
    /// names the offending file.
    pub fn create(prefix: &str, num_shards: usize, compression: Compression) -> Result<Self> {
        if unlikely(num_shards == 0) {
            return raise(ShuffleError::config("number of output shards must be at least 1"));
        }

        if unlikely(prefix.is_empty()) {
            return raise(ShuffleError::config("output_pattern_prefix is empty"));
        }

        let mut writer = Self {
            filenames: Vec::with_capacity(num_shards),
            writers: Vec::with_capacity(num_shards),
            counts: vec![0; num_shards],
        };

        for index in 0..num_shards {
            let filename = shard_filename(prefix, index, num_shards, compression);

            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create output directory {:?}", parent))?;
                }
            }

            let stream = ShardStream::create(&filename, compression)
                .with_context(|| format!("create output shard {:?}", filename))?;

            writer.filenames.push(filename);
            writer.writers.push(Some(TfRecordWriter::new(stream)));
        }

        info!(
            "Opened {} output shards, first: {:?}",
            num_shards,
            writer.filenames.first()
        );

        Ok(writer)
    }

    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Finalize every stream, even after a failure on one of them.
    ///
    /// Returns the indices of the finalized shards and the failures.
    fn finish_all(&mut self) -> (Vec<usize>, Vec<(usize, String)>) {
        let mut finalized = Vec::with_capacity(self.writers.len());
        let mut failed = Vec::new();

        for (index, slot) in self.writers.iter_mut().enumerate() {
            if let Some(writer) = slot.take() {
                match writer.into_inner().finish() {
                    Ok(()) => finalized.push(index),
                    Err(e) => {
                        error!(
                            "finalize output shard failed, filename: {:?}, error: {}",
                            self.filenames[index], e
                        );
                        failed.push((index, e.to_string()));
                    }
                }
            }
        }

        (finalized, failed)
    }

    /// Finalize all shards and report their names and record counts.
    pub fn finish(mut self) -> Result<ShardReport> {
        let (finalized, failed) = self.finish_all();

        if !failed.is_empty() {
            return raise(ShuffleError::PartialWrite { finalized, failed });
        }

        let shards = self
            .filenames
            .iter()
            .zip(self.counts.iter())
            .map(|(filename, count)| ShardInfo {
                filename: filename.clone(),
                count: *count,
            })
            .collect::<Vec<_>>();

        info!("Finalized {} output shards", shards.len());

        Ok(ShardReport { shards })
    }

    /// Finalize all shards after `err` stopped the run, and attach the finalize state to it.
    ///
    /// The output must be treated as unusable either way.
    pub fn abort(mut self, err: anyhow::Error) -> anyhow::Error {
        let (finalized, failed) = self.finish_all();

        warn!(
            "run failed, output shards are incomplete. finalized: {:?}, failed: {:?}",
            finalized, failed
        );

        if failed.is_empty() {
            err.context(format!(
                "all {} output shards were finalized but are incomplete",
                finalized.len()
            ))
        } else {
            err.context(ShuffleError::PartialWrite { finalized, failed })
        }
    }
}

impl RecordSink for ShardWriter {
    fn num_shards(&self) -> usize {
        self.writers.len()
    }

    fn append(&mut self, shard: usize, record: Record) -> Result<()> {
        let filename = match self.filenames.get(shard) {
            Some(filename) => filename,
            None => {
                error_bail!(
                    "shard index out of range, shard: {}, num_shards: {}",
                    shard,
                    self.filenames.len()
                );
            }
        };

        let writer = self.writers[shard]
            .as_mut()
            .ok_or_else(|| anyhow!("output shard {:?} is already finalized", filename))?;

        writer
            .write_record(record.as_bytes())
            .with_context(|| format!("write record to output shard {:?}", filename))?;

        self.counts[shard] += 1;

        Ok(())
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if self.writers.iter().any(|w| w.is_some()) {
            let (finalized, failed) = self.finish_all();
            warn!(
                "shard writer dropped before finish, finalized: {:?}, failed: {:?}",
                finalized, failed
            );
        }
    }
}
