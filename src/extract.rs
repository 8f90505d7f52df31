//! Statistical keyword extraction over retrieved messages.
//!
//! Frequency-counts nickname, affectionate-phrase, and location terms
//! against the small configurable vocabularies, and collects a capped set
//! of literal message excerpts. The resulting [`ConversationFacts`] feed
//! the question generator's prompt so the LLM grounds its questions in
//! verified, counted data instead of free association.
//!
//! Matching is case-insensitive substring containment; each term counts at
//! most once per message.

use crate::config::ExtractConfig;
use crate::models::Message;

/// A literal message excerpt with its sender and date.
#[derive(Debug, Clone)]
pub struct Excerpt {
    pub sender: String,
    pub content: String,
    pub date: String,
}

/// Ranked term frequencies plus literal excerpts from one retrieval pass.
#[derive(Debug, Clone, Default)]
pub struct ConversationFacts {
    /// Top nickname terms, `(term, message_count)`, descending.
    pub top_nicknames: Vec<(String, usize)>,
    /// Top affectionate phrases, descending.
    pub top_phrases: Vec<(String, usize)>,
    /// Top location terms, descending.
    pub top_places: Vec<(String, usize)>,
    /// Literal excerpts, at most `max_examples`, content capped at 150 chars.
    pub examples: Vec<Excerpt>,
    /// ISO date of the most recent message seen, if any carried a timestamp.
    pub last_date: Option<String>,
}

impl ConversationFacts {
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
            && self.top_nicknames.is_empty()
            && self.top_phrases.is_empty()
            && self.top_places.is_empty()
    }
}

const NICKNAME_TOP: usize = 5;
const PHRASE_TOP: usize = 5;
const PLACE_TOP: usize = 3;
const EXCERPT_MAX_CHARS: usize = 150;

/// Extract ranked vocabulary frequencies and excerpts from `messages`.
pub fn extract_facts(messages: &[&Message], config: &ExtractConfig) -> ConversationFacts {
    let mut nickname_counts = vec![0usize; config.nicknames.len()];
    let mut phrase_counts = vec![0usize; config.phrases.len()];
    let mut place_counts = vec![0usize; config.places.len()];
    let mut examples = Vec::new();
    let mut last_ts: Option<i64> = None;

    for message in messages {
        if message.timestamp_ms > 0 {
            last_ts = Some(last_ts.map_or(message.timestamp_ms, |t| t.max(message.timestamp_ms)));
        }

        if message.content.is_empty() {
            continue;
        }

        let content = message.content.to_lowercase();

        for (i, term) in config.nicknames.iter().enumerate() {
            if content.contains(term.as_str()) {
                nickname_counts[i] += 1;
            }
        }
        for (i, term) in config.phrases.iter().enumerate() {
            if content.contains(term.as_str()) {
                phrase_counts[i] += 1;
            }
        }
        for (i, term) in config.places.iter().enumerate() {
            if content.contains(term.as_str()) {
                place_counts[i] += 1;
            }
        }

        if examples.len() < config.max_examples {
            examples.push(Excerpt {
                sender: message.sender.clone(),
                content: truncate_chars(&message.content, EXCERPT_MAX_CHARS),
                date: message
                    .date()
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
    }

    ConversationFacts {
        top_nicknames: top_terms(&config.nicknames, &nickname_counts, NICKNAME_TOP),
        top_phrases: top_terms(&config.phrases, &phrase_counts, PHRASE_TOP),
        top_places: top_terms(&config.places, &place_counts, PLACE_TOP),
        examples,
        last_date: last_ts
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string()),
    }
}

/// Terms with nonzero counts, sorted by count descending (term ascending on
/// ties, for determinism), truncated to `top`.
fn top_terms(terms: &[String], counts: &[usize], top: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = terms
        .iter()
        .zip(counts.iter())
        .filter(|(_, &count)| count > 0)
        .map(|(term, &count)| (term.clone(), count))
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top);
    ranked
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
