use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{raise, ShuffleError};
use crate::record_codec::Compression;
use crate::shuffle_engine::{ShuffleStrategy, STEP_ALL};

/// Default name of the int64 feature counted per class in the dataset summary.
pub const DEFAULT_LABEL_FEATURE: &str = "label";

/// All options of a shuffle run.
///
/// Can be loaded from a TOML file, every field is optional there:
///
/// ```toml
/// input_pattern_list = "data/examples-*.tfrecord.gz,extra/*.tfrecord.gz"
/// output_pattern_prefix = "out/shuffled"
/// output_dataset_config = "out/shuffled.dataset_config.pbtxt"
/// output_dataset_name = "training_set"
/// direct_num_workers = 8
/// step = 1000000
/// seed = 2021
/// compression = "gzip"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShuffleConfig {
    /// Comma separated glob patterns of the input shards.
    pub input_pattern_list: String,

    /// Prefix of the output shard file names.
    pub output_pattern_prefix: String,

    /// Where to write the dataset summary. No summary when `None`.
    pub output_dataset_config: Option<String>,

    /// Dataset name written in the summary. Required with `output_dataset_config`.
    pub output_dataset_name: Option<String>,

    /// Number of output shards.
    pub direct_num_workers: i64,

    /// `-1` to shuffle the whole dataset in memory, or the max number of records in memory.
    pub step: i64,

    /// Seed of the random generator. Drawn from OS entropy when `None`.
    pub seed: Option<u64>,

    /// Compression of both input and output shards.
    pub compression: Compression,

    /// Feature counted per class in the summary.
    pub label_feature: String,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            input_pattern_list: String::new(),
            output_pattern_prefix: String::new(),
            output_dataset_config: None,
            output_dataset_name: None,
            direct_num_workers: 1,
            step: STEP_ALL,
            seed: None,
            compression: Compression::default(),
            label_feature: DEFAULT_LABEL_FEATURE.to_string(),
        }
    }
}

impl ShuffleConfig {
    /// Parse a TOML config file.
    pub fn from_config_file(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();

        let content = match std::fs::read_to_string(filename) {
            Ok(content) => content,
            Err(e) => {
                return raise(ShuffleError::config(format!(
                    "read config file {:?}: {}",
                    filename, e
                )))
            }
        };

        Self::from_config_str(&content).with_context(|| format!("parse config file {:?}", filename))
    }

    /// Parse TOML content.
    pub fn from_config_str(content: &str) -> Result<Self> {
        match toml::from_str::<ShuffleConfig>(content) {
            Ok(config) => Ok(config),
            Err(e) => raise(ShuffleError::config(e.to_string())),
        }
    }

    /// The input patterns, split on commas, blanks removed.
    pub fn patterns(&self) -> Vec<String> {
        self.input_pattern_list
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    /// Number of output shards. Only meaningful after `validate`.
    pub fn num_shards(&self) -> usize {
        usize::try_from(self.direct_num_workers).unwrap_or(0)
    }

    /// Check every option and return the shuffle strategy selected by `step`.
    ///
    /// Runs before any I/O.
    pub fn validate(&self) -> Result<ShuffleStrategy> {
        if self.patterns().is_empty() {
            return raise(ShuffleError::config("input_pattern_list is required"));
        }

        if self.output_pattern_prefix.trim().is_empty() {
            return raise(ShuffleError::config("output_pattern_prefix is required"));
        }

        if self.direct_num_workers < 1 {
            return raise(ShuffleError::config(format!(
                "direct_num_workers must be at least 1, got: {}",
                self.direct_num_workers
            )));
        }

        let strategy = ShuffleStrategy::from_step(self.step)?;

        if self.output_dataset_config.is_some()
            && self
                .output_dataset_name
                .as_deref()
                .map_or(true, |name| name.is_empty())
        {
            return raise(ShuffleError::config(
                "output_dataset_name is required when output_dataset_config is set",
            ));
        }

        if self.label_feature.is_empty() {
            return raise(ShuffleError::config("label_feature is empty"));
        }

        if let ShuffleStrategy::Windowed(_) = strategy {
            info!(
                "step = {}: records are only mixed within windows of {} consecutive records, \
                 the output is not a uniform global shuffle",
                self.step, self.step
            );
        }

        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::setup_log;

    fn valid() -> ShuffleConfig {
        ShuffleConfig {
            input_pattern_list: "in/*.tfrecord.gz".to_string(),
            output_pattern_prefix: "out/shuffled".to_string(),
            ..Default::default()
        }
    }

    fn is_config_error(res: Result<ShuffleStrategy>) -> bool {
        match res {
            Err(e) => matches!(e.downcast_ref::<ShuffleError>(), Some(ShuffleError::Config(_))),
            Ok(_) => false,
        }
    }

    #[test]
    fn test_defaults() {
        let config = ShuffleConfig::default();

        assert_eq!(config.direct_num_workers, 1);
        assert_eq!(config.step, -1);
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.label_feature, "label");
    }

    #[test]
    fn test_validate() -> Result<()> {
        setup_log();

        assert_eq!(valid().validate()?, ShuffleStrategy::Unconstrained);

        let config = ShuffleConfig {
            step: 100,
            direct_num_workers: 4,
            ..valid()
        };
        assert_eq!(config.validate()?.window_limit(), Some(100));
        assert_eq!(config.num_shards(), 4);

        Ok(())
    }

    #[test]
    fn test_validate_errors() {
        setup_log();

        assert!(is_config_error(
            ShuffleConfig { step: 0, ..valid() }.validate()
        ));
        assert!(is_config_error(
            ShuffleConfig { step: -5, ..valid() }.validate()
        ));
        assert!(is_config_error(
            ShuffleConfig { direct_num_workers: 0, ..valid() }.validate()
        ));
        assert!(is_config_error(
            ShuffleConfig { input_pattern_list: " , ".to_string(), ..valid() }.validate()
        ));
        assert!(is_config_error(
            ShuffleConfig { output_pattern_prefix: String::new(), ..valid() }.validate()
        ));
        assert!(is_config_error(
            ShuffleConfig {
                output_dataset_config: Some("summary.pbtxt".to_string()),
                ..valid()
            }
            .validate()
        ));
    }

    #[test]
    fn test_patterns() {
        let config = ShuffleConfig {
            input_pattern_list: "a/*.gz, b/*.gz,,c.gz ".to_string(),
            ..Default::default()
        };

        assert_eq!(config.patterns(), vec!["a/*.gz", "b/*.gz", "c.gz"]);
    }

    #[test]
    fn test_from_config_str() -> Result<()> {
        setup_log();

        let config = ShuffleConfig::from_config_str(
            r#"
            input_pattern_list = "in/*.tfrecord"
            output_pattern_prefix = "out/x"
            direct_num_workers = 3
            step = 1000
            seed = 7
            compression = "none"
            "#,
        )?;

        assert_eq!(config.direct_num_workers, 3);
        assert_eq!(config.step, 1000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.label_feature, "label");

        assert!(ShuffleConfig::from_config_str("unknown_option = 1").is_err());

        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        setup_log();

        let err = ShuffleConfig::from_config_file("/no/such/shuffle.toml").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ShuffleError>(),
            Some(ShuffleError::Config(_))
        ));
        assert!(err.to_string().contains("/no/such/shuffle.toml"));
    }
}
