use std::num::NonZeroUsize;

/// Round-robin counter deciding which output shard receives the next record.
///
/// The cursor is owned by the shuffle engine and lives for the whole run, across window
/// boundaries. Every output shard therefore receives either `floor(T / N)` or `ceil(T / N)`
/// records, whatever the shuffle strategy.
///
/// It is not shared between threads. A parallel writer would have to serialize `assign`
/// calls to keep the balance.
#[derive(Debug, Clone)]
pub struct ShardCursor {
    /// Number of output shards.
    num_shards: NonZeroUsize,

    /// Number of records assigned so far.
    assigned: u64,
}

impl ShardCursor {
    pub fn new(num_shards: NonZeroUsize) -> Self {
        Self {
            num_shards,
            assigned: 0,
        }
    }

    /// Shard of the next record. Advances the cursor.
    #[inline]
    pub fn assign(&mut self) -> usize {
        let shard = (self.assigned % self.num_shards.get() as u64) as usize;
        self.assigned += 1;
        shard
    }

    #[inline]
    pub fn num_shards(&self) -> usize {
        self.num_shards.get()
    }
}

/// Expected number of records in `shard` after `total` assignments over `num_shards` shards.
pub fn expected_shard_count(total: u64, num_shards: usize, shard: usize) -> u64 {
    let n = num_shards as u64;
    total / n + u64::from((shard as u64) < total % n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let mut cursor = ShardCursor::new(NonZeroUsize::new(3).unwrap());

        let shards: Vec<usize> = (0..7).map(|_| cursor.assign()).collect();

        assert_eq!(shards, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.num_shards(), 3);
    }

    #[test]
    fn test_balance() {
        for num_shards in 1..8 {
            for total in 0..50u64 {
                let mut cursor = ShardCursor::new(NonZeroUsize::new(num_shards).unwrap());
                let mut counts = vec![0u64; num_shards];

                for _ in 0..total {
                    counts[cursor.assign()] += 1;
                }

                let lo = total / num_shards as u64;
                let hi = (total + num_shards as u64 - 1) / num_shards as u64;

                for (shard, count) in counts.iter().enumerate() {
                    assert!(*count == lo || *count == hi);
                    assert_eq!(*count, expected_shard_count(total, num_shards, shard));
                }
            }
        }
    }
}
