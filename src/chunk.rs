//! Fixed-size message chunker.
//!
//! Groups a pre-sorted message sequence into contiguous, non-overlapping
//! chunks of `chunk_size` messages (the last chunk may be smaller). Each
//! chunk's text is the newline-joined `[YYYY-MM-DD] sender: content` lines
//! of its messages, skipping empty-content messages in the text while still
//! counting them.
//!
//! Chunking is fully deterministic: identical input yields byte-identical
//! chunk text and boundaries, which is what keeps cached embeddings valid
//! across rebuilds.

use chrono::NaiveDate;

use crate::models::{Chunk, Message};

/// Partition `messages` into chunks of `chunk_size`.
///
/// The caller must pass messages sorted ascending by timestamp.
pub fn chunk_messages(messages: &[Message], chunk_size: usize) -> Vec<Chunk> {
    if chunk_size == 0 || messages.is_empty() {
        return Vec::new();
    }

    messages
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, group)| {
            let text = group
                .iter()
                .filter(|m| !m.content.is_empty())
                .map(format_message_line)
                .collect::<Vec<_>>()
                .join("\n");

            let start = group.first().and_then(|m| m.date()).unwrap_or_default();
            let end = group.last().and_then(|m| m.date()).unwrap_or_default();

            Chunk {
                id: i as i64,
                text,
                source_messages: group.to_vec(),
                date_range: (start, end),
                message_count: group.len(),
            }
        })
        .collect()
}

fn format_message_line(message: &Message) -> String {
    let date = message
        .date()
        .map(|d: NaiveDate| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("[{}] {}: {}", date, message.sender, message.content)
}
