//! View seam: how the controller hands results to whatever renders them.
//!
//! The controller never renders anything itself. A terminal front end prints; tests record.
//! All methods have no-op defaults so a view only implements what it shows.

use crate::backend::{ChatSummary, Message};
use crate::guard::Operation;

/// A user-visible notice (the modal-alert channel, separate from the transcript).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(s) | Notice::Error(s) => s,
        }
    }
}

/// Receiver of controller output.
pub trait ChatView: Send + Sync {
    /// Replace the whole transcript (after a chat is loaded or created).
    fn render_transcript(&self, _messages: &[Message]) {}
    /// A message was appended to the transcript.
    fn append_message(&self, _message: &Message) {}
    /// Show a transient "working" line below the transcript.
    fn show_placeholder(&self, _text: &str) {}
    fn clear_placeholder(&self) {}
    fn show_chats(&self, _chats: &[ChatSummary], _current: Option<&str>) {}
    fn show_models(&self, _models: &[String], _selected: Option<&str>) {}
    fn show_context_files(&self, _files: &[String]) {}
    fn notify(&self, _notice: &Notice) {}
    /// Enable or disable the control that triggers `op`.
    fn set_control_enabled(&self, _op: Operation, _enabled: bool) {}
}

/// View that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl ChatView for NullView {}

/// Human-readable byte size, base 1024: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// The `Model: ... | Context: ... | Est. tokens: ...` line shown before a reply.
pub fn model_info_line(model: &str, context_length: Option<u64>, estimated_tokens: Option<u64>) -> String {
    let mut line = format!("Model: {}", model);
    if let Some(len) = context_length {
        line.push_str(&format!(" | Context: {}", format_file_size(len)));
    }
    if let Some(tokens) = estimated_tokens {
        line.push_str(&format!(" | Est. tokens: {}", tokens));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1000), "1000 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 256 * 1024), "5.25 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn model_info_skips_missing_parts() {
        assert_eq!(
            model_info_line("gpt-4o", Some(2048), Some(512)),
            "Model: gpt-4o | Context: 2 KB | Est. tokens: 512"
        );
        assert_eq!(model_info_line("gpt-4o", None, None), "Model: gpt-4o");
    }
}
