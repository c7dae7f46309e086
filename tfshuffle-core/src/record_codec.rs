//! TFRecord framing and per-file compression.
//!
//! Each record is stored as:
//!
//! ```text
//! u64    length           little endian
//! u32    masked_crc32c(length bytes)
//! [u8]   payload          `length` bytes
//! u32    masked_crc32c(payload)
//! ```
//!
//! A whole file is optionally gzip compressed. The codec only moves bytes, the payload is
//! never decoded here.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use likely_stable::unlikely;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::error::{raise, ShuffleError};
use crate::record::Record;

const HEADER_SIZE: usize = 12;
const FOOTER_SIZE: usize = 4;
const MASK_DELTA: u32 = 0xa282_ead8;

/// Compression applied to a whole shard file.
#[derive(
    Default, Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain TFRecord.
    None,

    /// Gzip, the format written by `TFRecordWriter` with `GZIP` options.
    #[default]
    Gzip,
}

impl Compression {
    /// File name suffix of output shards.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => ".tfrecord",
            Compression::Gzip => ".tfrecord.gz",
        }
    }
}

/// Masked CRC-32C used by the TFRecord format.
#[inline]
pub fn masked_crc(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Reads framed records from a byte stream.
pub struct TfRecordReader<R: Read> {
    /// Underlying stream, already decompressed.
    inner: R,

    /// Used in error messages only.
    path: PathBuf,

    /// Offset in the decompressed stream of the next frame.
    offset: u64,

    /// Set after the first error or the end of the stream.
    done: bool,
}

impl<R: Read> TfRecordReader<R> {
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            offset: 0,
            done: false,
        }
    }

    fn corrupt<T>(&self, reason: impl Into<String>) -> Result<T> {
        raise(ShuffleError::Corrupt {
            path: self.path.clone(),
            offset: self.offset,
            reason: reason.into(),
        })
    }

    /// Read the next record. Returns `Ok(None)` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut header = [0u8; HEADER_SIZE];
        let n = read_full(&mut self.inner, &mut header)
            .with_context(|| format!("read record header from {:?}", self.path))?;

        if n == 0 {
            return Ok(None);
        }

        if unlikely(n < HEADER_SIZE) {
            return self.corrupt(format!("truncated header, got {} of {} bytes", n, HEADER_SIZE));
        }

        let len_bytes = &header[0..8];
        let len_crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        if unlikely(masked_crc(len_bytes) != len_crc) {
            return self.corrupt("length checksum mismatch");
        }

        let len = u64::from_le_bytes([
            len_bytes[0],
            len_bytes[1],
            len_bytes[2],
            len_bytes[3],
            len_bytes[4],
            len_bytes[5],
            len_bytes[6],
            len_bytes[7],
        ]);

        let len = match usize::try_from(len) {
            Ok(len) => len,
            Err(_) => return self.corrupt(format!("record length {} does not fit in memory", len)),
        };

        // The length passed its checksum but may still be garbage, never trust it to allocate.
        let mut payload = Vec::new();
        if payload.try_reserve_exact(len).is_err() {
            return self.corrupt(format!("record length {} cannot be allocated", len));
        }

        let n = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)
            .with_context(|| format!("read record payload from {:?}", self.path))?;

        if unlikely(n < len) {
            return self.corrupt(format!("truncated payload, got {} of {} bytes", n, len));
        }

        let mut footer = [0u8; FOOTER_SIZE];
        let n = read_full(&mut self.inner, &mut footer)
            .with_context(|| format!("read record footer from {:?}", self.path))?;

        if unlikely(n < FOOTER_SIZE) {
            return self.corrupt("truncated payload checksum");
        }

        if unlikely(masked_crc(&payload) != u32::from_le_bytes(footer)) {
            return self.corrupt("payload checksum mismatch");
        }

        self.offset += (HEADER_SIZE + len + FOOTER_SIZE) as u64;

        Ok(Some(Record::new(payload)))
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes framed records to a byte stream.
pub struct TfRecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len_bytes = (payload.len() as u64).to_le_bytes();

        self.inner.write_all(&len_bytes)?;
        self.inner.write_all(&masked_crc(&len_bytes).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc(payload).to_le_bytes())?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Open an input shard for reading, decompressing on the fly.
pub fn open_input(path: &Path, compression: Compression) -> Result<TfRecordReader<Box<dyn Read>>> {
    let file = File::open(path).with_context(|| format!("open input shard {:?}", path))?;
    let reader = BufReader::new(file);

    let inner: Box<dyn Read> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
    };

    Ok(TfRecordReader::new(inner, path))
}

/// Output stream of one shard file.
pub enum ShardStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ShardStream {
    /// Create `path`, truncating any existing file.
    pub fn create(path: &Path, compression: Compression) -> io::Result<Self> {
        let writer = BufWriter::new(File::create(path)?);

        Ok(match compression {
            Compression::None => ShardStream::Plain(writer),
            Compression::Gzip => {
                ShardStream::Gzip(GzEncoder::new(writer, flate2::Compression::default()))
            }
        })
    }

    /// Write the gzip trailer if any, flush buffers and sync the file to disk.
    pub fn finish(self) -> io::Result<()> {
        let mut writer = match self {
            ShardStream::Plain(writer) => writer,
            ShardStream::Gzip(encoder) => encoder.finish()?,
        };

        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

impl Write for ShardStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ShardStream::Plain(w) => w.write(buf),
            ShardStream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ShardStream::Plain(w) => w.flush(),
            ShardStream::Gzip(w) => w.flush(),
        }
    }
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;

    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(total)
}
