pub mod clip;

pub use clip::{ClipboardItem, SequenceId};
