//! redb table definitions and key encoding
//!
//! Keys in the item tables are big-endian 8-byte encodings of the sequence id,
//! so byte-wise ordering matches unsigned numeric ordering.

use redb::TableDefinition;

use crate::error::{Result, StoreError};
use crate::models::SequenceId;

pub(crate) const BUCKET_NAME: &str = "clipboard_bucket";
pub(crate) const CAPTURED_AT_NAME: &str = "clipboard_captured_at";

// Key: sequence id (big-endian), Value: opaque clip content
pub(crate) const ITEMS: TableDefinition<&[u8], &[u8]> = TableDefinition::new(BUCKET_NAME);

// Key: sequence id (big-endian), Value: capture time in Unix millis
pub(crate) const CAPTURED_AT: TableDefinition<&[u8], i64> =
    TableDefinition::new(CAPTURED_AT_NAME);

// Key: setting name, Value: counter
pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("clipboard_meta");

pub(crate) const NEXT_SEQUENCE_KEY: &str = "next_sequence";

/// Encode a sequence id as a table key
pub(crate) fn encode_key(id: SequenceId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode a table key back into a sequence id
pub(crate) fn decode_key(table: &'static str, key: &[u8]) -> Result<SequenceId> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StoreError::Corrupt {
        table,
        len: key.len(),
    })?;
    Ok(SequenceId::from_be_bytes(bytes))
}
