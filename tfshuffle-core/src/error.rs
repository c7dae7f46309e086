use std::path::PathBuf;

use log::error;
use thiserror::Error;

/// Failure classes of a shuffle run.
///
/// Functions return `anyhow::Result`; a `ShuffleError` is placed at the root of the chain
/// whenever the class matters to the caller, so it can be recovered with `downcast_ref`.
/// There is no transient class: every failure requires a full re-run.
#[derive(Debug, Error)]
pub enum ShuffleError {
    /// Invalid option, detected before any output file is created.
    #[error("configuration error: {0}")]
    Config(String),

    /// Framing or checksum failure inside an input shard.
    #[error("corrupt record in {path:?} at byte offset {offset}: {reason}")]
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// The in-memory window could not grow any further.
    #[error(
        "out of memory after buffering {records} records, re-run with a smaller positive --step"
    )]
    ResourceExhausted { records: usize },

    /// Some output shards could not be finalized.
    #[error("failed to finalize output shards {failed:?}, finalized shards: {finalized:?}")]
    PartialWrite {
        finalized: Vec<usize>,
        failed: Vec<(usize, String)>,
    },
}

impl ShuffleError {
    /// Shortcut for `ShuffleError::Config`.
    pub fn config(msg: impl Into<String>) -> Self {
        ShuffleError::Config(msg.into())
    }

    /// Process exit status for this class of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShuffleError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Log `err` and return it as an `anyhow::Error`.
pub fn raise<T>(err: ShuffleError) -> anyhow::Result<T> {
    error!("{}", err);
    Err(err.into())
}

/// Exit status for any error returned by the pipeline.
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ShuffleError>())
        .map_or(1, |e| e.exit_code())
}
