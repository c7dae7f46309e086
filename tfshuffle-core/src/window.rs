use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{raise, ShuffleError};
use crate::record::Record;

/// In-memory buffer of consecutive source records, shuffled and flushed as one unit.
///
/// A window exclusively owns its records until `drain` hands them off. Growth goes through
/// `try_reserve`, so running out of memory surfaces as `ShuffleError::ResourceExhausted`
/// instead of aborting the process.
pub struct Window {
    /// Max number of records. `None` means unbounded.
    limit: Option<usize>,

    records: Vec<Record>,
}

impl Window {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            records: Vec::new(),
        }
    }

    /// Push a record. The caller must check `is_full` first.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if self.records.len() == self.records.capacity() {
            // Grow geometrically, never past the limit. A `step` larger than the dataset
            // only costs what the dataset needs.
            let grow = self.records.len().max(1024);
            let additional = match self.limit {
                Some(limit) => grow.min(limit - self.records.len()).max(1),
                None => grow,
            };

            if self.records.try_reserve(additional).is_err() {
                return raise(ShuffleError::ResourceExhausted {
                    records: self.records.len(),
                });
            }
        }

        self.records.push(record);
        Ok(())
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        match self.limit {
            Some(limit) => self.records.len() >= limit,
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply a uniform random permutation to the buffered records (Fisher-Yates).
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.records.shuffle(rng);
    }

    /// Hand off every record in the current order, leaving the window empty.
    ///
    /// The allocation is kept for the next window.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Record> {
        self.records.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bounded_window() -> Result<()> {
        let mut window = Window::new(Some(2));

        assert!(!window.is_full());
        window.push(Record::from("a"))?;
        window.push(Record::from("b"))?;
        assert!(window.is_full());

        let mut rng = StdRng::seed_from_u64(7);
        window.shuffle(&mut rng);

        let mut records: Vec<Record> = window.drain().collect();
        records.sort();

        assert_eq!(records, vec![Record::from("a"), Record::from("b")]);
        assert!(window.is_empty());
        assert!(!window.is_full());

        Ok(())
    }

    #[test]
    fn test_large_limit_small_dataset() -> Result<()> {
        let mut window = Window::new(Some(usize::MAX / 64));

        for i in 0..10 {
            window.push(Record::from(format!("r{}", i).as_str()))?;
        }

        assert!(!window.is_full());
        assert_eq!(window.len(), 10);

        Ok(())
    }

    #[test]
    fn test_unbounded_window_never_full() -> Result<()> {
        let mut window = Window::new(None);

        for i in 0..5000 {
            window.push(Record::from(format!("r{}", i).as_str()))?;
        }

        assert!(!window.is_full());
        assert_eq!(window.len(), 5000);

        Ok(())
    }
}
