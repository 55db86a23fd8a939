use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use redb::{
    Database, DatabaseError, ReadableTable, ReadableTableMetadata, Table, WriteTransaction,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::eviction::EvictionPolicy;
use super::sequence::SequenceAllocator;
use super::tables::{decode_key, encode_key, BUCKET_NAME, CAPTURED_AT, ITEMS, META};
use crate::error::{Result, StoreError};
use crate::events::{EventSink, HistoryEvent, NoopSink};
use crate::models::{ClipboardItem, SequenceId};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Construction options for [`HistoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum number of items kept; oldest are evicted beyond this
    pub max_size: usize,
    /// How long `open` waits for another instance to release the file
    pub open_timeout: Duration,
    /// How long a mutation waits for the writer lock
    pub write_timeout: Duration,
}

impl StoreOptions {
    pub fn new(max_size: usize) -> Self {
        StoreOptions {
            max_size,
            open_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Durable, size-bounded clipboard history
///
/// Items live in a redb database keyed by big-endian sequence ids. Mutations
/// run one at a time behind a writer lock; reads use MVCC snapshots and never
/// wait for writers. Events are published after commit, while the writer lock
/// is still held, so their order matches commit order.
pub struct HistoryStore {
    db: Database,
    path: PathBuf,
    eviction: EvictionPolicy,
    writer: Mutex<()>,
    write_timeout: Duration,
    sink: Arc<dyn EventSink>,
}

impl HistoryStore {
    /// Open (or create) a store with default timeouts and no event subscriber
    pub fn open(path: impl AsRef<Path>, max_size: usize) -> Result<Self> {
        Self::open_with(path, StoreOptions::new(max_size), Arc::new(NoopSink))
    }

    /// Open (or create) a store publishing changes to `sink`
    pub fn open_with(
        path: impl AsRef<Path>,
        options: StoreOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let eviction = EvictionPolicy::new(options.max_size)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::config(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        let db = open_database(&path, options.open_timeout)?;

        let store = HistoryStore {
            db,
            path,
            eviction,
            writer: Mutex::new(()),
            write_timeout: options.write_timeout,
            sink,
        };
        store.initialize()?;

        log::info!(
            "Opened clipboard history at {:?} (max {} entries)",
            store.path,
            store.eviction.max_size()
        );
        Ok(store)
    }

    /// Create tables, repair the sequence counter and apply a reduced bound
    fn initialize(&self) -> Result<()> {
        self.write("initialize", |txn| {
            let mut meta = txn.open_table(META)?;
            let mut items = txn.open_table(ITEMS)?;
            let mut captured = txn.open_table(CAPTURED_AT)?;

            let next = SequenceAllocator::reconcile(&mut meta, &items)?;
            let evicted = self.eviction.enforce(&mut items, &mut captured)?;

            log::debug!(
                "History holds {} clip(s), next sequence id {}",
                items.len()?,
                next
            );
            let events: Vec<_> = evicted.into_iter().map(HistoryEvent::RemoveContent).collect();
            Ok(((), events))
        })
    }

    /// Store a new clip, evicting the oldest entries beyond the size bound
    pub fn add(&self, content: impl Into<Vec<u8>>) -> Result<ClipboardItem> {
        let content = content.into();
        let item = self.write("add", |txn| {
            let mut meta = txn.open_table(META)?;
            let mut items = txn.open_table(ITEMS)?;
            let mut captured = txn.open_table(CAPTURED_AT)?;

            let id = SequenceAllocator::next_id(&mut meta)?;
            let item = ClipboardItem::new(id, content, now());
            insert_item(&mut items, &mut captured, &item)?;
            let evicted = self.eviction.enforce(&mut items, &mut captured)?;

            let mut events = Vec::with_capacity(1 + evicted.len());
            events.push(HistoryEvent::NewContent(item.clone()));
            events.extend(evicted.into_iter().map(HistoryEvent::RemoveContent));
            Ok((item, events))
        })?;

        log::debug!("Stored clip {} ({} bytes)", item.id, item.len());
        Ok(item)
    }

    /// Delete a clip; deleting an absent id succeeds without effect
    pub fn remove(&self, id: SequenceId) -> Result<()> {
        let existed = self.write("remove", |txn| {
            let mut items = txn.open_table(ITEMS)?;
            let mut captured = txn.open_table(CAPTURED_AT)?;

            let key = encode_key(id);
            let existed = items.remove(key.as_slice())?.is_some();
            captured.remove(key.as_slice())?;
            Ok((existed, Vec::new()))
        })?;

        if existed {
            log::debug!("Removed clip {}", id);
        } else {
            log::debug!("Clip {} already absent, nothing to remove", id);
        }
        Ok(())
    }

    /// Move a clip to the front by re-inserting its content under a new id
    ///
    /// The old id is retired. Subscribers see `remove-content` for the old id
    /// followed by `new-content` for the new item.
    pub fn touch(&self, id: SequenceId) -> Result<ClipboardItem> {
        let item = self.write("touch", |txn| {
            let mut meta = txn.open_table(META)?;
            let mut items = txn.open_table(ITEMS)?;
            let mut captured = txn.open_table(CAPTURED_AT)?;

            let old_key = encode_key(id);
            let content = match items.remove(old_key.as_slice())? {
                Some(value) => value.value().to_vec(),
                None => return Err(StoreError::not_found(format!("clip {}", id))),
            };
            captured.remove(old_key.as_slice())?;

            let new_id = SequenceAllocator::next_id(&mut meta)?;
            let item = ClipboardItem::new(new_id, content, now());
            insert_item(&mut items, &mut captured, &item)?;
            let evicted = self.eviction.enforce(&mut items, &mut captured)?;

            let mut events = vec![
                HistoryEvent::RemoveContent(id),
                HistoryEvent::NewContent(item.clone()),
            ];
            events.extend(evicted.into_iter().map(HistoryEvent::RemoveContent));
            Ok((item, events))
        })?;

        log::debug!("Promoted clip {} to {}", id, item.id);
        Ok(item)
    }

    /// Remove every clip; the sequence counter keeps counting upward
    pub fn clear_history(&self) -> Result<()> {
        let cleared = self.write("clear", |txn| {
            let cleared = txn.open_table(ITEMS)?.len()?;
            txn.delete_table(ITEMS)?;
            txn.delete_table(CAPTURED_AT)?;
            // Recreate so readers never see a missing table
            txn.open_table(ITEMS)?;
            txn.open_table(CAPTURED_AT)?;
            Ok((cleared, vec![HistoryEvent::HistoryCleared]))
        })?;

        log::info!("Cleared {} clip(s) from history", cleared);
        Ok(())
    }

    /// All clips, most recent first, from one consistent snapshot
    pub fn get_all(&self) -> Result<Vec<ClipboardItem>> {
        let txn = self.db.begin_read()?;
        let items = txn.open_table(ITEMS)?;
        let captured = txn.open_table(CAPTURED_AT)?;

        let mut clips = Vec::with_capacity(items.len()? as usize);
        for entry in items.iter()?.rev() {
            let (key, value) = entry?;
            if let Some(item) = read_item(&captured, key.value(), value.value())? {
                clips.push(item);
            }
        }
        Ok(clips)
    }

    /// The clip with the greatest sequence id
    pub fn latest(&self) -> Result<ClipboardItem> {
        let txn = self.db.begin_read()?;
        let items = txn.open_table(ITEMS)?;
        let captured = txn.open_table(CAPTURED_AT)?;

        for entry in items.iter()?.rev() {
            let (key, value) = entry?;
            if let Some(item) = read_item(&captured, key.value(), value.value())? {
                return Ok(item);
            }
        }
        Err(StoreError::not_found("clipboard history is empty"))
    }

    /// Look up a single clip
    pub fn get(&self, id: SequenceId) -> Result<Option<ClipboardItem>> {
        let txn = self.db.begin_read()?;
        let items = txn.open_table(ITEMS)?;
        let captured = txn.open_table(CAPTURED_AT)?;

        let key = encode_key(id);
        match items.get(key.as_slice())? {
            Some(value) => read_item(&captured, &key, value.value()),
            None => Ok(None),
        }
    }

    /// Number of stored clips
    pub fn len(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let items = txn.open_table(ITEMS)?;
        Ok(items.len()? as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The id the next insert will receive
    pub fn next_id(&self) -> Result<SequenceId> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        SequenceAllocator::peek(&meta)
    }

    pub fn max_size(&self) -> usize {
        self.eviction.max_size()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` in a write transaction under the writer lock
    ///
    /// Commits when `op` succeeds and then publishes its events; otherwise
    /// aborts and publishes nothing.
    fn write<T>(
        &self,
        name: &'static str,
        op: impl FnOnce(&WriteTransaction) -> Result<(T, Vec<HistoryEvent>)>,
    ) -> Result<T> {
        let _guard = self
            .writer
            .try_lock_for(self.write_timeout)
            .ok_or(StoreError::Timeout(self.write_timeout, "the history writer lock"))?;

        let txn = self.db.begin_write()?;
        match op(&txn) {
            Ok((value, events)) => {
                txn.commit()?;
                for event in events {
                    self.sink.emit(event);
                }
                Ok(value)
            }
            Err(e) => {
                if e.is_not_found() {
                    log::debug!("{} aborted: {}", name, e);
                } else {
                    log::warn!("{} rolled back: {}", name, e);
                }
                if let Err(abort_err) = txn.abort() {
                    log::error!("Failed to abort {} transaction: {}", name, abort_err);
                }
                Err(e)
            }
        }
    }
}

/// Open the database file, retrying while another instance holds its lock
fn open_database(path: &Path, timeout: Duration) -> Result<Database> {
    let started = Instant::now();
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(StoreError::Timeout(timeout, "the database file lock"));
                }
                log::debug!("{:?} is locked by another instance, retrying", path);
                thread::sleep(LOCK_RETRY_INTERVAL.min(timeout - waited));
            }
            Err(e) => {
                return Err(StoreError::config(format!(
                    "Failed to open history database {:?}: {}",
                    path, e
                )));
            }
        }
    }
}

fn insert_item(
    items: &mut Table<'_, &'static [u8], &'static [u8]>,
    captured_at: &mut Table<'_, &'static [u8], i64>,
    item: &ClipboardItem,
) -> Result<()> {
    let key = encode_key(item.id);
    items.insert(key.as_slice(), item.content.as_slice())?;
    captured_at.insert(key.as_slice(), item.captured_at.timestamp_millis())?;
    Ok(())
}

/// Join a content row with its timestamp; rows without one are skipped
fn read_item(
    captured_at: &impl ReadableTable<&'static [u8], i64>,
    key: &[u8],
    content: &[u8],
) -> Result<Option<ClipboardItem>> {
    let id = decode_key(BUCKET_NAME, key)?;
    let millis = captured_at.get(key)?.map(|g| g.value());
    match millis.and_then(DateTime::from_timestamp_millis) {
        Some(captured_at) => Ok(Some(ClipboardItem::new(id, content.to_vec(), captured_at))),
        None => {
            log::warn!("Skipping clip {} without a capture time", id);
            Ok(None)
        }
    }
}

/// Current time at the millisecond precision that is persisted
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
