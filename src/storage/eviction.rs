use redb::{ReadableTableMetadata, Table};

use super::tables::{decode_key, encode_key, BUCKET_NAME};
use crate::error::{Result, StoreError};
use crate::models::SequenceId;

/// FIFO size bound applied inside every inserting transaction
///
/// Oldest entries (lowest sequence id) go first. Runs before commit, so a
/// reader never observes more than `max_size` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    max_size: usize,
}

impl EvictionPolicy {
    /// Create a policy keeping at most `max_size` items (must be non-zero)
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(StoreError::config("max history size must be at least 1"));
        }
        Ok(EvictionPolicy { max_size })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of items that must go for `count` stored items to fit
    pub fn excess(&self, count: u64) -> u64 {
        count.saturating_sub(self.max_size as u64)
    }

    /// Delete the oldest items until the bound holds
    ///
    /// Returns the evicted ids in ascending order.
    pub fn enforce(
        &self,
        items: &mut Table<'_, &'static [u8], &'static [u8]>,
        captured_at: &mut Table<'_, &'static [u8], i64>,
    ) -> Result<Vec<SequenceId>> {
        let excess = self.excess(items.len()?);
        let mut evicted = Vec::with_capacity(excess as usize);

        for _ in 0..excess {
            let id = match items.pop_first()? {
                Some((key, _)) => decode_key(BUCKET_NAME, key.value())?,
                None => break,
            };
            captured_at.remove(encode_key(id).as_slice())?;
            evicted.push(id);
        }

        if !evicted.is_empty() {
            log::debug!(
                "Evicted {} clip(s) to stay within {} entries: {:?}",
                evicted.len(),
                self.max_size,
                evicted
            );
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tables::{CAPTURED_AT, ITEMS};
    use redb::{Database, ReadableTable};
    use tempfile::TempDir;

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(EvictionPolicy::new(0), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_excess() {
        let policy = EvictionPolicy::new(5).unwrap();
        assert_eq!(policy.excess(0), 0);
        assert_eq!(policy.excess(5), 0);
        assert_eq!(policy.excess(6), 1);
        assert_eq!(policy.excess(12), 7);
    }

    #[test]
    fn test_enforce_removes_lowest_ids() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::create(temp_dir.path().join("evict.redb")).unwrap();
        let policy = EvictionPolicy::new(2).unwrap();

        let txn = db.begin_write().unwrap();
        {
            let mut items = txn.open_table(ITEMS).unwrap();
            let mut captured = txn.open_table(CAPTURED_AT).unwrap();
            // Inserted out of order; eviction follows key order, not insert order
            for id in [9u64, 3, 300, 4] {
                let key = encode_key(id);
                items.insert(key.as_slice(), b"clip".as_slice()).unwrap();
                captured.insert(key.as_slice(), 1_000i64).unwrap();
            }

            let evicted = policy.enforce(&mut items, &mut captured).unwrap();
            assert_eq!(evicted, vec![3, 4]);
            assert_eq!(items.len().unwrap(), 2);
            assert_eq!(captured.len().unwrap(), 2);
            assert!(items.get(encode_key(9).as_slice()).unwrap().is_some());
            assert!(items.get(encode_key(300).as_slice()).unwrap().is_some());

            assert!(policy.enforce(&mut items, &mut captured).unwrap().is_empty());
        }
        txn.commit().unwrap();
    }
}
