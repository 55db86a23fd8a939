//! Change notifications for presentation layers
//!
//! The store reports every committed change through an injected [`EventSink`].
//! Events are best-effort hints delivered after the transaction commits:
//! subscribers should reconcile against `HistoryStore::get_all` rather than
//! treat the event stream as ground truth.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::io::Write;
use std::sync::mpsc::Sender;

use crate::models::{ClipboardItem, SequenceId};

pub const NEW_CONTENT: &str = "new-content";
pub const REMOVE_CONTENT: &str = "remove-content";
pub const HISTORY_CLEARED: &str = "history-cleared";

/// A committed change to the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// An item was inserted (carries a copy of the item)
    NewContent(ClipboardItem),
    /// An item was evicted or superseded
    RemoveContent(SequenceId),
    /// All items were removed; cached ids are stale
    HistoryCleared,
}

impl HistoryEvent {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEvent::NewContent(_) => NEW_CONTENT,
            HistoryEvent::RemoveContent(_) => REMOVE_CONTENT,
            HistoryEvent::HistoryCleared => HISTORY_CLEARED,
        }
    }

    /// JSON payload in the shape the desktop frontend consumes
    pub fn payload(&self) -> Value {
        match self {
            HistoryEvent::NewContent(item) => to_value(NewContentPayload {
                content: CopiedContent {
                    key: item.id,
                    value: item.as_text(),
                },
            }),
            HistoryEvent::RemoveContent(id) => to_value(RemoveContentPayload { index: *id }),
            HistoryEvent::HistoryCleared => Value::Null,
        }
    }
}

#[derive(Serialize)]
struct CopiedContent<'a> {
    key: SequenceId,
    value: Cow<'a, str>,
}

#[derive(Serialize)]
struct NewContentPayload<'a> {
    content: CopiedContent<'a>,
}

#[derive(Serialize)]
struct RemoveContentPayload {
    index: SequenceId,
}

fn to_value(payload: impl Serialize) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|e| {
        log::warn!("Failed to encode event payload: {}", e);
        Value::Null
    })
}

/// Fire-and-forget notification channel
///
/// `emit` runs after commit while the store's writer lock is still held, so
/// events arrive in commit order. Implementations must return promptly and
/// never panic: a sink that blocks stalls every later write until it times
/// out. Transport failures are logged and dropped. Slow transports belong
/// behind a [`ChannelSink`] drained on another thread.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: HistoryEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: HistoryEvent) {}
}

/// Writes events to the `log` facade at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: HistoryEvent) {
        log::debug!("event {} {}", event.name(), event.payload());
    }
}

/// Forwards events over an mpsc channel to an in-process subscriber
pub struct ChannelSink {
    tx: Sender<HistoryEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<HistoryEvent>) -> Self {
        ChannelSink { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: HistoryEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            log::debug!("Dropping {} event: subscriber disconnected", name);
        }
    }
}

/// Serializes events as JSON lines: `{"event": <name>, "payload": <payload>}`
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: HistoryEvent) {
        let line = json!({ "event": event.name(), "payload": event.payload() });
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            log::warn!("Failed to publish {} event: {}", event.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::mpsc;

    #[test]
    fn test_event_names() {
        let item = ClipboardItem::new(3, b"abc".to_vec(), Utc::now());
        assert_eq!(HistoryEvent::NewContent(item).name(), "new-content");
        assert_eq!(HistoryEvent::RemoveContent(3).name(), "remove-content");
        assert_eq!(HistoryEvent::HistoryCleared.name(), "history-cleared");
    }

    #[test]
    fn test_payload_shapes() {
        let item = ClipboardItem::new(3, b"abc".to_vec(), Utc::now());
        assert_eq!(
            HistoryEvent::NewContent(item).payload(),
            json!({ "content": { "key": 3, "value": "abc" } })
        );
        assert_eq!(HistoryEvent::RemoveContent(9).payload(), json!({ "index": 9 }));
        assert_eq!(HistoryEvent::HistoryCleared.payload(), Value::Null);
    }

    #[test]
    fn test_new_content_payload_is_lossy_text() {
        let item = ClipboardItem::new(5, vec![0x61, 0xff], Utc::now());
        assert_eq!(
            HistoryEvent::NewContent(item).payload(),
            json!({ "content": { "key": 5, "value": "a\u{fffd}" } })
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        sink.emit(HistoryEvent::RemoveContent(1));
        assert_eq!(rx.try_recv().unwrap(), HistoryEvent::RemoveContent(1));

        drop(rx);
        sink.emit(HistoryEvent::HistoryCleared);
    }

    #[test]
    fn test_json_lines_sink_output() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(HistoryEvent::RemoveContent(4));
        sink.emit(HistoryEvent::HistoryCleared);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({ "event": "remove-content", "payload": { "index": 4 } }),
                json!({ "event": "history-cleared", "payload": null }),
            ]
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_sink_swallows_write_errors() {
        let sink = JsonLinesSink::new(BrokenPipe);
        sink.emit(HistoryEvent::HistoryCleared);
    }
}
