//! Command line surface of `tfshuffle`.
//!
//! Every option can come from a TOML file given with `--config`; flags on the command line
//! override the file.
//!
//! ```text
//! tfshuffle --input_pattern_list='data/part-*.tfrecord.gz' \
//!           --output_pattern_prefix=out/shuffled \
//!           --output_dataset_config=out/shuffled.dataset_config.pbtxt \
//!           --output_dataset_name=training_set \
//!           --direct_num_workers=16 \
//!           --step=2000000
//! ```
//!
//! `--step=-1` (the default) loads the whole dataset in memory, about 1.2 times the size
//! of the compressed input, and gives a uniform shuffle. A positive `--step` bounds memory
//! to that many records but only mixes records within consecutive windows of that size.
//! If a `--step=-1` run runs out of memory, re-run with a positive `--step`.

use anyhow::Result;
use clap::Parser;
use log::info;

use tfshuffle_core::config::ShuffleConfig;
use tfshuffle_core::pipeline::{run, RunReport};
use tfshuffle_core::record_codec::Compression;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML file providing default values for the options below.
    #[arg(long)]
    pub config: Option<String>,

    /// Comma separated list of TFRecord file patterns.
    #[arg(long = "input_pattern_list")]
    pub input_pattern_list: Option<String>,

    /// File name prefix of the output TFRecords.
    #[arg(long = "output_pattern_prefix")]
    pub output_pattern_prefix: Option<String>,

    /// If set, write a human readable dataset summary to this file.
    #[arg(long = "output_dataset_config", alias = "output_dataset_config_pbtxt")]
    pub output_dataset_config: Option<String>,

    /// Dataset name in the summary. Required with --output_dataset_config.
    #[arg(long = "output_dataset_name")]
    pub output_dataset_name: Option<String>,

    /// Number of output files. Defaults to 1.
    #[arg(long = "direct_num_workers", allow_negative_numbers = true)]
    pub direct_num_workers: Option<i64>,

    /// How many records can be held in memory at once. -1 is all of them, the default.
    #[arg(long, allow_negative_numbers = true)]
    pub step: Option<i64>,

    /// Seed of the random generator, for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Compression of input and output files: gzip (default) or none.
    #[arg(long)]
    pub compression: Option<Compression>,

    /// Int64 feature counted per class in the summary. Defaults to "label".
    #[arg(long = "label_feature")]
    pub label_feature: Option<String>,
}

impl Args {
    /// Build the run configuration: config file first, then command line overrides.
    pub fn into_config(self) -> Result<ShuffleConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Load config file {}", path);
                ShuffleConfig::from_config_file(path)?
            }
            None => ShuffleConfig::default(),
        };

        if let Some(v) = self.input_pattern_list {
            config.input_pattern_list = v;
        }
        if let Some(v) = self.output_pattern_prefix {
            config.output_pattern_prefix = v;
        }
        if let Some(v) = self.output_dataset_config {
            config.output_dataset_config = Some(v);
        }
        if let Some(v) = self.output_dataset_name {
            config.output_dataset_name = Some(v);
        }
        if let Some(v) = self.direct_num_workers {
            config.direct_num_workers = v;
        }
        if let Some(v) = self.step {
            config.step = v;
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
        if let Some(v) = self.compression {
            config.compression = v;
        }
        if let Some(v) = self.label_feature {
            config.label_feature = v;
        }

        Ok(config)
    }
}

/// Parse-independent entry point of the binary.
pub fn run_with_args(args: Args) -> Result<RunReport> {
    let config = args.into_config()?;

    info!("Config: {:?}", config);

    run(&config)
}
