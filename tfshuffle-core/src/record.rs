use anyhow::Result;

/// An opaque serialized record.
///
/// The payload is never decoded by the shuffle engine. It is moved from the record source
/// to one output shard, and the bytes are never modified on the way.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record(Box<[u8]>);

impl Record {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Record {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Record {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<&str> for Record {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Destination of the records handed off by the shuffle engine.
///
/// Implementations must keep the hand-off order per shard.
pub trait RecordSink {
    /// Number of output shards. Shard indices are `0..num_shards()`.
    fn num_shards(&self) -> usize;

    /// Append `record` to output shard `shard`.
    fn append(&mut self, shard: usize, record: Record) -> Result<()>;
}

/// Keeps every handed-off record in memory.
///
/// Records both the per-shard contents and the global hand-off order, which is the order
/// in which the shard cursor advanced.
#[derive(Debug, Default)]
pub struct MemorySink {
    shards: Vec<Vec<Record>>,
    handoffs: Vec<(usize, Record)>,
}

impl MemorySink {
    pub fn new(num_shards: usize) -> Self {
        Self {
            shards: vec![Vec::new(); num_shards],
            handoffs: Vec::new(),
        }
    }

    pub fn shards(&self) -> &[Vec<Record>] {
        &self.shards
    }

    /// `(shard, record)` pairs in hand-off order.
    pub fn handoffs(&self) -> &[(usize, Record)] {
        &self.handoffs
    }

    pub fn shard_counts(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.len()).collect()
    }
}

impl RecordSink for MemorySink {
    fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn append(&mut self, shard: usize, record: Record) -> Result<()> {
        match self.shards.get_mut(shard) {
            Some(records) => {
                records.push(record.clone());
                self.handoffs.push((shard, record));
                Ok(())
            }
            None => anyhow::bail!(
                "shard index out of range, shard: {}, num_shards: {}",
                shard,
                self.shards.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() -> Result<()> {
        let mut sink = MemorySink::new(2);

        sink.append(1, Record::from("a"))?;
        sink.append(0, Record::from("b"))?;
        sink.append(1, Record::from("c"))?;

        assert_eq!(sink.shard_counts(), vec![1, 2]);
        assert_eq!(sink.shards()[1], vec![Record::from("a"), Record::from("c")]);
        assert_eq!(sink.handoffs()[1], (0, Record::from("b")));

        assert!(sink.append(2, Record::from("d")).is_err());

        Ok(())
    }
}
