//! Core data models shared across the quiz pipeline.
//!
//! These types represent the messages, chunks, and questions that flow from
//! the archive through retrieval and generation into a quiz session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single message from the archive export.
///
/// Deserializes directly from the export's JSON shape (`sender_name`,
/// `timestamp_ms`, optional `content`); unknown export fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "sender_name")]
    pub sender: String,
    #[serde(default)]
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp_ms: i64,
}

impl Message {
    /// Calendar date of the message, or `None` when the export carries no
    /// usable timestamp.
    pub fn date(&self) -> Option<NaiveDate> {
        if self.timestamp_ms <= 0 {
            return None;
        }
        chrono::DateTime::from_timestamp_millis(self.timestamp_ms).map(|dt| dt.date_naive())
    }
}

/// A fixed-size contiguous group of messages, the unit of retrieval.
///
/// Created once at index-build time and never mutated afterwards; the
/// embedding index owns all chunks and serializes them into its cache
/// metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    /// Newline-joined `[YYYY-MM-DD] sender: content` lines.
    pub text: String,
    pub source_messages: Vec<Message>,
    pub date_range: (NaiveDate, NaiveDate),
    pub message_count: usize,
}

impl Chunk {
    /// Whether this chunk's date range overlaps `[start, end]`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.date_range.1 >= start && self.date_range.0 <= end
    }

    /// Whether any message in this chunk was sent by `sender`.
    pub fn has_sender(&self, sender: &str) -> bool {
        self.source_messages.iter().any(|m| m.sender == sender)
    }
}

/// One ranked hit from a semantic search. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Squared L2 distance to the query embedding (lower is closer).
    pub distance: f32,
    /// 1-based position within the result list.
    pub rank: usize,
}

/// Question difficulty as reported by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// A generated quiz question. Immutable once created; owned by the session.
///
/// Serializes to and from the LLM's strict-JSON shape (the text field is
/// keyed `question` on the wire). Fields the model may omit fall back to
/// neutral defaults, except `question`, `options`, and `correct_answers`,
/// whose absence is a generation failure handled by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    /// Four choices: one correct plus three distractors.
    pub options: Vec<String>,
    /// Acceptable answer variants, most canonical first.
    pub correct_answers: Vec<String>,
    /// Up to three progressively more revealing hints.
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default = "default_success_message")]
    pub success_message: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Provenance note describing which archive data grounded the question.
    #[serde(default = "default_data_source")]
    pub data_source: String,
}

fn default_success_message() -> String {
    "That's right!".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_data_source() -> String {
    "conversation archive".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, content: &str, ts: i64) -> Message {
        Message {
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_message_date() {
        // 2023-06-15T12:00:00Z
        let m = msg("Ana", "hola", 1_686_830_400_000);
        assert_eq!(m.date(), NaiveDate::from_ymd_opt(2023, 6, 15));
    }

    #[test]
    fn test_message_date_missing_timestamp() {
        let m = msg("Ana", "hola", 0);
        assert!(m.date().is_none());
    }

    #[test]
    fn test_message_deserializes_export_shape() {
        let raw = r#"{"sender_name": "Ana", "timestamp_ms": 1000, "content": "hola", "reactions": []}"#;
        let m: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(m.sender, "Ana");
        assert_eq!(m.content, "hola");
    }

    #[test]
    fn test_message_deserializes_without_content() {
        let raw = r#"{"sender_name": "Ana", "timestamp_ms": 1000}"#;
        let m: Message = serde_json::from_str(raw).unwrap();
        assert!(m.content.is_empty());
    }

    #[test]
    fn test_chunk_overlap() {
        let chunk = Chunk {
            id: 0,
            text: String::new(),
            source_messages: vec![],
            date_range: (
                NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 20).unwrap(),
            ),
            message_count: 0,
        };

        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert!(chunk.overlaps(d(2023, 1, 1), d(2023, 1, 10)));
        assert!(chunk.overlaps(d(2023, 1, 15), d(2023, 2, 1)));
        assert!(!chunk.overlaps(d(2023, 2, 1), d(2023, 2, 28)));
        assert!(!chunk.overlaps(d(2022, 12, 1), d(2023, 1, 9)));
    }

    #[test]
    fn test_question_deserializes_llm_output() {
        let raw = r#"{
            "question": "What place did we visit?",
            "options": ["The park", "The beach", "The cinema", "A cafe"],
            "correct_answers": ["the park", "park"],
            "hints": ["We walked a lot..."],
            "success_message": "Yes!",
            "category": "places",
            "difficulty": "easy",
            "data_source": "messages mentioning parque"
        }"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert_eq!(q.text, "What place did we visit?");
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_question_defaults_for_missing_fields() {
        let raw = r#"{
            "question": "Q?",
            "options": ["a", "b", "c", "d"],
            "correct_answers": ["a"]
        }"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert!(q.hints.is_empty());
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(q.category, "general");
    }
}
