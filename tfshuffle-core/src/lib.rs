//! Shuffle the records of a sharded TFRecord dataset on a single machine.
//!
//! The records of all input shards are read as one sequence, shuffled, and spread
//! round-robin over a fixed number of output shards. With `step = -1` the whole dataset is
//! held in memory and the shuffle is uniform. With `step = Y` at most `Y` records are held
//! at once and the shuffle is uniform only within consecutive windows of `Y` records, see
//! `shuffle_engine`.
//!
//! Record payloads are opaque to the shuffle. Reading, writing and the dataset summary are
//! thin adapters around the engine.

pub mod config;
pub mod error;
pub mod example_proto;
pub mod input;
pub mod local_file_reader;
pub mod pipeline;
pub mod record;
pub mod record_codec;
pub mod shard_cursor;
pub mod shard_writer;
pub mod shuffle_engine;
pub mod summary;
pub mod tool;
pub mod window;
