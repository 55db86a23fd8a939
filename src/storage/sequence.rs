//! Durable sequence id allocation
//!
//! The next id to issue lives in the meta table and is advanced inside the
//! same write transaction that consumes it, so an aborted transaction never
//! burns or reuses an id. Clearing the history does not reset the counter.

use redb::{ReadableTable, Table};

use super::tables::{decode_key, BUCKET_NAME, NEXT_SEQUENCE_KEY};
use crate::error::{Result, StoreError};
use crate::models::SequenceId;

pub struct SequenceAllocator;

impl SequenceAllocator {
    /// Reserve and return the next unused id
    pub fn next_id(meta: &mut Table<'_, &'static str, u64>) -> Result<SequenceId> {
        let next = Self::peek(&*meta)?;
        let following = next
            .checked_add(1)
            .ok_or(StoreError::SequenceExhausted)?;
        meta.insert(NEXT_SEQUENCE_KEY, following)?;
        Ok(next)
    }

    /// The id the next allocation will return
    pub fn peek(meta: &impl ReadableTable<&'static str, u64>) -> Result<SequenceId> {
        Ok(meta.get(NEXT_SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0))
    }

    /// Advance the counter past any id already present in `items`
    ///
    /// Returns the counter value after reconciliation.
    pub fn reconcile(
        meta: &mut Table<'_, &'static str, u64>,
        items: &impl ReadableTable<&'static [u8], &'static [u8]>,
    ) -> Result<SequenceId> {
        let next = Self::peek(&*meta)?;
        let highest = match items.last()? {
            Some((key, _)) => Some(decode_key(BUCKET_NAME, key.value())?),
            None => None,
        };

        match highest {
            Some(id) if id >= next => {
                let repaired = id
                    .checked_add(1)
                    .ok_or(StoreError::SequenceExhausted)?;
                log::warn!(
                    "Sequence counter {} is behind stored id {}, advancing to {}",
                    next,
                    id,
                    repaired
                );
                meta.insert(NEXT_SEQUENCE_KEY, repaired)?;
                Ok(repaired)
            }
            _ => Ok(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tables::{encode_key, ITEMS, META};
    use redb::Database;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::create(temp_dir.path().join("seq.redb")).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let (db, _temp) = create_test_db();
        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            assert_eq!(SequenceAllocator::next_id(&mut meta).unwrap(), 0);
            assert_eq!(SequenceAllocator::next_id(&mut meta).unwrap(), 1);
            assert_eq!(SequenceAllocator::peek(&meta).unwrap(), 2);
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_aborted_allocation_is_not_persisted() {
        let (db, _temp) = create_test_db();

        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            SequenceAllocator::next_id(&mut meta).unwrap();
        }
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            assert_eq!(SequenceAllocator::next_id(&mut meta).unwrap(), 1);
        }
        txn.abort().unwrap();

        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            assert_eq!(SequenceAllocator::next_id(&mut meta).unwrap(), 1);
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_reconcile_advances_past_stored_ids() {
        let (db, _temp) = create_test_db();
        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            let mut items = txn.open_table(ITEMS).unwrap();
            items.insert(encode_key(41).as_slice(), b"x".as_slice()).unwrap();

            assert_eq!(SequenceAllocator::reconcile(&mut meta, &items).unwrap(), 42);
            assert_eq!(SequenceAllocator::next_id(&mut meta).unwrap(), 42);
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_reconcile_keeps_counter_ahead_of_gaps() {
        let (db, _temp) = create_test_db();
        let txn = db.begin_write().unwrap();
        {
            let mut meta = txn.open_table(META).unwrap();
            let mut items = txn.open_table(ITEMS).unwrap();
            meta.insert(NEXT_SEQUENCE_KEY, 100u64).unwrap();
            items.insert(encode_key(7).as_slice(), b"x".as_slice()).unwrap();

            assert_eq!(SequenceAllocator::reconcile(&mut meta, &items).unwrap(), 100);
        }
        txn.commit().unwrap();
    }
}
