use anyhow::Result;
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error_bail;
use crate::record::Record;
use crate::record_codec::{open_input, Compression, TfRecordReader};

/// Reads records from a list of local shard files as one logical sequence.
///
/// Files are visited in the given order and each file's records keep their order. The first
/// error is yielded and ends the iteration: a skipped record would silently lose data.
pub struct LocalRecordReader {
    filenames: Vec<PathBuf>,
    compression: Compression,
    reader: Option<TfRecordReader<Box<dyn Read>>>,
    pos: usize,
    failed: bool,
}

impl LocalRecordReader {
    pub fn new(filenames: &[PathBuf], compression: Compression) -> Result<Self> {
        // Check if all files exist
        for filename in filenames {
            if !Path::new(filename).exists() {
                error_bail!("File not found: {:?}", filename);
            }
        }

        Ok(LocalRecordReader {
            filenames: filenames.to_vec(),
            compression,
            reader: None,
            pos: 0,
            failed: false,
        })
    }

    /// Returns `Ok(false)` when there is no file left.
    fn open_next_file(&mut self) -> Result<bool> {
        if self.pos >= self.filenames.len() {
            self.reader = None;
            return Ok(false);
        }

        let filename = &self.filenames[self.pos];
        info!("--> Processing {:?}", filename);

        self.reader = Some(open_input(filename, self.compression)?);
        self.pos += 1;

        Ok(true)
    }
}

impl Iterator for LocalRecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(reader) = self.reader.as_mut() {
                match reader.next() {
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => {}
                }
            }

            match self.open_next_file() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
