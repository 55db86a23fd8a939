//! Clipledger - durable, size-bounded clipboard history
//!
//! The [`storage::HistoryStore`] keeps captured clipboard snapshots in a redb
//! database under monotonically increasing sequence ids, evicts the oldest
//! entries beyond a fixed bound in the same transaction as each insert, and
//! reports committed changes to an injected [`events::EventSink`].

pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod storage;

pub use error::StoreError;
pub use events::{EventSink, HistoryEvent};
pub use models::{ClipboardItem, SequenceId};
pub use storage::{HistoryStore, StoreOptions};
