use anyhow::Result;
use log::info;
use std::path::PathBuf;

use crate::error::{raise, ShuffleError};

/// Expand glob `patterns` into the list of input shard files.
///
/// Matches of all patterns are canonicalized, merged, sorted by path and deduplicated, so
/// that the same inputs are always read in the same order and a file matched twice under
/// different spellings is read once.
pub fn resolve_input_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                return raise(ShuffleError::config(format!(
                    "invalid input pattern {:?}: {}",
                    pattern, e
                )))
            }
        };

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => match std::fs::canonicalize(&path) {
                    Ok(path) => files.push(path),
                    Err(e) => {
                        return raise(ShuffleError::config(format!(
                            "cannot resolve input file {:?}: {}",
                            path, e
                        )))
                    }
                },
                Ok(_) => {}
                Err(e) => {
                    return raise(ShuffleError::config(format!(
                        "cannot read {:?} while expanding {:?}: {}",
                        e.path(),
                        pattern,
                        e.error()
                    )))
                }
            }
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        return raise(ShuffleError::config(format!(
            "No file found matching input pattern list {:?}. Shuffling aborted.",
            patterns
        )));
    }

    info!("Found {} input shards", files.len());

    Ok(files)
}
