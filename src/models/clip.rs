use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Monotonically increasing identifier of a stored clip
pub type SequenceId = u64;

/// A single captured clipboard snapshot
///
/// Items are never mutated after creation. Content is an opaque byte payload;
/// text clips are stored as their UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    /// Unique identifier, strictly increasing in insertion order
    pub id: SequenceId,
    /// Raw clipboard payload
    pub content: Vec<u8>,
    /// When the clip was captured
    pub captured_at: DateTime<Utc>,
}

impl ClipboardItem {
    pub fn new(id: SequenceId, content: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        ClipboardItem {
            id,
            content,
            captured_at,
        }
    }

    /// Content decoded as UTF-8, replacing invalid sequences
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Get a preview string (first line, truncated for display)
    pub fn preview(&self, max_len: usize) -> String {
        let text = self.as_text();
        let first_line = text.lines().next().unwrap_or("");
        if first_line.chars().count() > max_len {
            let truncated: String = first_line.chars().take(max_len).collect();
            format!("{}...", truncated)
        } else {
            first_line.to_string()
        }
    }

    /// Size of the payload in bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
