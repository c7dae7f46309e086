//! One shuffle run: record source -> shuffle engine -> shard writer -> dataset summary.
//!
//! Strictly sequential, on the calling thread. Configuration errors are raised before any
//! file is opened. The summary is written only after every output shard was finalized.

use anyhow::{Context, Result};
use coarsetime::Instant;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

use crate::config::ShuffleConfig;
use crate::error_bail;
use crate::input::resolve_input_files;
use crate::local_file_reader::LocalRecordReader;
use crate::shard_writer::{shard_pattern, ShardReport, ShardWriter};
use crate::shuffle_engine::{ShuffleEngine, ShuffleStats, ShuffleStrategy};
use crate::summary::{absolute, absolute_patterns, warn_unlabeled, DatasetSummary, LabelCounter};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Input shards, in the order they were read.
    pub inputs: Vec<PathBuf>,

    /// Seed the random generator was created from, when `run` created it.
    pub seed: Option<u64>,

    pub stats: ShuffleStats,

    pub shards: ShardReport,

    /// Path of the dataset summary, if one was written.
    pub summary: Option<PathBuf>,
}

/// Run a shuffle as described by `config`.
///
/// Without a configured seed, one is drawn from OS entropy and logged, so the run can be
/// reproduced with `--seed`.
pub fn run(config: &ShuffleConfig) -> Result<RunReport> {
    let strategy = config.validate()?;
    let inputs = resolve_input_files(&config.patterns())?;

    let seed = match config.seed {
        Some(seed) => seed,
        None => rand::thread_rng().gen(),
    };

    info!("Random seed: {}", seed);

    let report = shuffle_files(config, strategy, &inputs, StdRng::seed_from_u64(seed))?;

    Ok(RunReport {
        seed: Some(seed),
        ..report
    })
}

/// Shuffle `inputs` with the given generator. `config` must be validated already.
pub fn shuffle_files<R: Rng>(
    config: &ShuffleConfig,
    strategy: ShuffleStrategy,
    inputs: &[PathBuf],
    rng: R,
) -> Result<RunReport> {
    let start = Instant::now();
    let num_shards = config.num_shards();

    let reader = LocalRecordReader::new(inputs, config.compression)?;
    let mut engine = ShuffleEngine::new(strategy, num_shards, rng)?;

    // A summary left by an earlier run would describe shards this run overwrites.
    if let Some(path) = &config.output_dataset_config {
        remove_stale_summary(Path::new(path))?;
    }

    let mut writer =
        ShardWriter::create(&config.output_pattern_prefix, num_shards, config.compression)?;

    let mut label_counter = LabelCounter::new(&config.label_feature);

    let source = reader.inspect(|record| {
        if let Ok(record) = record {
            label_counter.observe(record);
        }
    });

    let stats = match engine.run(source, &mut writer) {
        Ok(stats) => stats,
        Err(e) => return Err(writer.abort(e)),
    };

    let shards = writer.finish()?;

    if shards.total() != stats.total {
        error_bail!(
            "output shards hold {} records, but {} records were shuffled",
            shards.total(),
            stats.total
        );
    }

    let summary = match &config.output_dataset_config {
        Some(path) => {
            info!("-> Create dataset summary file");

            warn_unlabeled(&label_counter);

            let prefix = absolute(&config.output_pattern_prefix)?;

            let summary = DatasetSummary {
                name: config.output_dataset_name.clone().unwrap_or_default(),
                tfrecord_path: shard_pattern(&prefix, config.compression),
                num_examples: stats.total,
                input_pattern_list: absolute_patterns(&config.patterns())?,
                output_pattern_prefix: prefix,
                shards: shards.shards.clone(),
                label_counts: label_counter.counts().clone(),
            };

            let path = Path::new(path);
            summary.write(path)?;

            Some(path.to_path_buf())
        }
        None => None,
    };

    info!(
        "Shuffled {} records from {} input shards into {} output shards, took {:.3}s",
        stats.total,
        inputs.len(),
        num_shards,
        start.elapsed().as_f64()
    );

    Ok(RunReport {
        inputs: inputs.to_vec(),
        seed: None,
        stats,
        shards,
        summary,
    })
}

/// Remove the summary file at `path` if it exists.
fn remove_stale_summary(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Removed summary of a previous run: {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove previous dataset summary {:?}", path)),
    }
}
