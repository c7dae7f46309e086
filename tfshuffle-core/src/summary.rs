use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::example_proto::int64_feature;
use crate::record::Record;
use crate::shard_writer::ShardInfo;

/// Counts records per class, reading one int64 feature of each `tf.train.Example`.
///
/// This sits beside the record source, the shuffle engine never sees it.
#[derive(Debug, Clone, Default)]
pub struct LabelCounter {
    /// Feature name.
    feature: String,

    /// Records per label, ascending.
    counts: BTreeMap<i64, u64>,

    /// Records without the feature, or not decodable as `Example`.
    unlabeled: u64,
}

impl LabelCounter {
    pub fn new(feature: &str) -> Self {
        Self {
            feature: feature.to_string(),
            counts: BTreeMap::new(),
            unlabeled: 0,
        }
    }

    pub fn observe(&mut self, record: &Record) {
        match int64_feature(record.as_bytes(), &self.feature) {
            Some(label) => *self.counts.entry(label).or_insert(0) += 1,
            None => self.unlabeled += 1,
        }
    }

    pub fn counts(&self) -> &BTreeMap<i64, u64> {
        &self.counts
    }

    pub fn unlabeled(&self) -> u64 {
        self.unlabeled
    }
}

/// Human readable description of the shuffled dataset.
///
/// Written in the text format of DeepVariant's `DeepVariantDatasetConfig`.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub name: String,

    /// Pattern matching every output shard.
    pub tfrecord_path: String,

    pub num_examples: u64,

    pub input_pattern_list: String,

    pub output_pattern_prefix: String,

    pub shards: Vec<ShardInfo>,

    pub label_counts: BTreeMap<i64, u64>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Generated by tfshuffle")?;
        writeln!(f)?;
        writeln!(f, "name: \"{}\"", self.name)?;
        writeln!(f, "tfrecord_path: \"{}\"", self.tfrecord_path)?;
        writeln!(f, "num_examples: {}", self.num_examples)?;
        writeln!(f, "#")?;
        writeln!(f, "# --input_pattern_list={}", self.input_pattern_list)?;
        writeln!(f, "# --output_pattern_prefix={}", self.output_pattern_prefix)?;
        writeln!(f, "#")?;

        for shard in &self.shards {
            writeln!(f, "# shard {}: {}", shard.filename.display(), shard.count)?;
        }

        for (label, count) in &self.label_counts {
            writeln!(f, "# class{}: {}", label, count)?;
        }

        Ok(())
    }
}

impl DatasetSummary {
    pub fn to_pbtxt(&self) -> String {
        self.to_string()
    }

    /// Write the summary to `path`.
    ///
    /// The content goes to a temporary file first, renamed into place when complete.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create summary directory {:?}", parent))?;
            }
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, self.to_pbtxt())
            .with_context(|| format!("write dataset summary {:?}", tmp))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("rename {:?} to {:?}", tmp, path))?;

        info!("Wrote dataset summary to {:?}", path);

        Ok(())
    }
}

/// Make `path` absolute against the current directory, without touching the filesystem.
pub fn absolute(path: &str) -> Result<String> {
    let p = Path::new(path);

    if p.is_absolute() {
        return Ok(path.to_string());
    }

    let cwd = std::env::current_dir().context("get current directory")?;

    Ok(cwd.join(p).to_string_lossy().to_string())
}

/// `absolute` applied to each comma separated pattern.
pub fn absolute_patterns(patterns: &[String]) -> Result<String> {
    let patterns = patterns
        .iter()
        .map(|p| absolute(p))
        .collect::<Result<Vec<_>>>()?;

    Ok(patterns.join(","))
}

/// Log a warning when some records could not be classified.
pub fn warn_unlabeled(counter: &LabelCounter) {
    if counter.unlabeled() > 0 {
        warn!(
            "{} records have no int64 feature {:?}, they are not counted in any class",
            counter.unlabeled(),
            counter.feature
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_proto::example_with_int64;
    use crate::tool::setup_log;

    fn summary() -> DatasetSummary {
        let mut label_counts = BTreeMap::new();
        label_counts.insert(1, 3);
        label_counts.insert(0, 2);

        DatasetSummary {
            name: "train".to_string(),
            tfrecord_path: "/out/x-?????-of-?????.tfrecord.gz".to_string(),
            num_examples: 5,
            input_pattern_list: "/in/*.tfrecord.gz".to_string(),
            output_pattern_prefix: "/out/x".to_string(),
            shards: vec![
                ShardInfo {
                    filename: PathBuf::from("/out/x-00000-of-00002.tfrecord.gz"),
                    count: 3,
                },
                ShardInfo {
                    filename: PathBuf::from("/out/x-00001-of-00002.tfrecord.gz"),
                    count: 2,
                },
            ],
            label_counts,
        }
    }

    #[test]
    fn test_to_pbtxt() {
        let expected = "# Generated by tfshuffle\n\
                        \n\
                        name: \"train\"\n\
                        tfrecord_path: \"/out/x-?????-of-?????.tfrecord.gz\"\n\
                        num_examples: 5\n\
                        #\n\
                        # --input_pattern_list=/in/*.tfrecord.gz\n\
                        # --output_pattern_prefix=/out/x\n\
                        #\n\
                        # shard /out/x-00000-of-00002.tfrecord.gz: 3\n\
                        # shard /out/x-00001-of-00002.tfrecord.gz: 2\n\
                        # class0: 2\n\
                        # class1: 3\n";

        assert_eq!(summary().to_pbtxt(), expected);
    }

    #[test]
    fn test_write() -> Result<()> {
        setup_log();

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sub/summary.pbtxt");

        summary().write(&path)?;

        assert_eq!(std::fs::read_to_string(&path)?, summary().to_pbtxt());
        assert!(!dir.path().join("sub/summary.pbtxt.tmp").exists());

        Ok(())
    }

    #[test]
    fn test_label_counter() {
        let mut counter = LabelCounter::new("label");

        counter.observe(&Record::new(example_with_int64("label", 1)));
        counter.observe(&Record::new(example_with_int64("label", 0)));
        counter.observe(&Record::new(example_with_int64("label", 1)));
        counter.observe(&Record::new(example_with_int64("other", 1)));

        assert_eq!(counter.counts().get(&1), Some(&2));
        assert_eq!(counter.counts().get(&0), Some(&1));
        assert_eq!(counter.unlabeled(), 1);
    }

    #[test]
    fn test_absolute() -> Result<()> {
        assert_eq!(absolute("/a/b")?, "/a/b");
        assert!(Path::new(&absolute("a/b")?).is_absolute());

        Ok(())
    }
}
