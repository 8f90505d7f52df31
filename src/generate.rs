//! Quiz question generation.
//!
//! One question per call: pick a topic seed from the fixed table, retrieve
//! the most relevant chunks, run statistical extraction over their
//! messages, and ask the LLM for a strict-JSON question grounded in that
//! data. The prompt carries every previously asked question so the model
//! avoids repeats; option overlap with earlier questions is detected and
//! logged but does not reject the output.
//!
//! Failure is explicit: provider errors, malformed JSON, and empty
//! question text all surface as `Err` — the caller decides whether to end
//! the session or retry. There is no fallback question.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;

use crate::config::Config;
use crate::extract::{extract_facts, ConversationFacts};
use crate::index::EmbeddingIndex;
use crate::llm;
use crate::models::{Message, Question};
use crate::retrieve;

const SYSTEM_PROMPT: &str = "You are an expert at creating personalized quizzes about a \
couple's shared history. You always respond with a single valid JSON object and no \
markdown formatting.";

const MAX_HINTS: usize = 3;

/// Topic seed for a 1-based question number.
///
/// Uses the table entry at `question_number - 1`; later questions reuse the
/// last entry once the table is exhausted. Deterministic on purpose, so the
/// same question number retrieves the same topic within a session.
pub fn topic_for(config: &Config, question_number: u32) -> &str {
    let topics = &config.quiz.topics;
    let idx = (question_number.saturating_sub(1) as usize).min(topics.len() - 1);
    &topics[idx]
}

/// Generate the question for `question_number`, avoiding repeats of
/// `previous` questions.
pub async fn generate(
    index: &EmbeddingIndex,
    config: &Config,
    question_number: u32,
    previous: &[Question],
) -> Result<Question> {
    let topic = topic_for(config, question_number);
    tracing::info!(
        "generating question #{} (topic: {})",
        question_number,
        topic
    );

    let results = retrieve::search_topic(index, config, topic, config.quiz.retrieval_k).await?;
    let messages: Vec<&Message> = results
        .iter()
        .flat_map(|r| r.chunk.source_messages.iter())
        .collect();

    let facts = extract_facts(&messages, &config.extract);
    let grounded = !results.is_empty();

    let prompt = build_prompt(&facts, previous, question_number, config.quiz.total_questions);

    let value = llm::complete_json(&config.chat, SYSTEM_PROMPT, &prompt)
        .await
        .with_context(|| format!("question #{} generation failed", question_number))?;

    let mut question = parse_question(value)?;

    if !grounded {
        question.data_source = "no archive matches for the topic; ungrounded".to_string();
    }

    let overlap = option_overlap(&question.options, previous);
    if !overlap.is_empty() {
        tracing::warn!(
            "question #{} reuses options from earlier questions: {:?}",
            question_number,
            overlap
        );
    }

    Ok(question)
}

/// Turn the model's JSON into a [`Question`], rejecting empty output.
fn parse_question(value: serde_json::Value) -> Result<Question> {
    let mut question: Question =
        serde_json::from_value(value).map_err(|e| anyhow::anyhow!("Malformed question JSON: {}", e))?;

    if question.text.trim().is_empty() {
        bail!("Generator returned an empty question");
    }
    if question.correct_answers.iter().all(|a| a.trim().is_empty()) {
        bail!("Generator returned no usable correct answers");
    }

    question.hints.truncate(MAX_HINTS);
    Ok(question)
}

/// Options shared between `options` and any previous question's options.
/// A non-empty result is a soft constraint violation, logged by the caller.
fn option_overlap(options: &[String], previous: &[Question]) -> Vec<String> {
    let new: BTreeSet<&str> = options.iter().map(String::as_str).collect();
    let old: BTreeSet<&str> = previous
        .iter()
        .flat_map(|q| q.options.iter().map(String::as_str))
        .collect();
    new.intersection(&old).map(|s| s.to_string()).collect()
}

/// Assemble the generation prompt from extracted facts and prior questions.
fn build_prompt(
    facts: &ConversationFacts,
    previous: &[Question],
    question_number: u32,
    total_questions: u32,
) -> String {
    let mut p = String::new();

    p.push_str("REAL DATA FROM THE CONVERSATION ARCHIVE:\n\n");

    p.push_str("TOP NICKNAMES BY FREQUENCY (verified, use these):\n");
    push_ranked(&mut p, &facts.top_nicknames, "used");

    p.push_str("\nTOP AFFECTIONATE PHRASES BY FREQUENCY (verified, use these):\n");
    push_ranked(&mut p, &facts.top_phrases, "said");

    p.push_str("\nTOP PLACES MENTIONED (verified, use these):\n");
    push_ranked(&mut p, &facts.top_places, "mentioned");

    p.push_str("\nLITERAL MESSAGE EXCERPTS (ground the question in these):\n");
    if facts.examples.is_empty() {
        p.push_str("  (no data found in the archive for this topic)\n");
    } else {
        for ex in &facts.examples {
            p.push_str(&format!("- [{}] {}: \"{}\"\n", ex.date, ex.sender, ex.content));
        }
    }

    match &facts.last_date {
        Some(date) => p.push_str(&format!(
            "\nIMPORTANT: the data ends on {}. Never ask about \"today\", \"yesterday\", or later dates.\n",
            date
        )),
        None => p.push_str("\nIMPORTANT: no dated data is available for this topic.\n"),
    }

    p.push_str("\nPREVIOUSLY ASKED QUESTIONS (do not repeat their topics or categories):\n");
    if previous.is_empty() {
        p.push_str("  none\n");
    } else {
        for q in previous {
            p.push_str(&format!("- {}\n", q.text));
        }
    }

    p.push_str(&format!(
        "\nTASK: create exactly 1 broad, memorable question about the relationship \
         (question #{} of {}).\n",
        question_number, total_questions
    ));

    p.push_str(
        "\nRULES:\n\
         1. Ground the question in the excerpts above; pick a general theme (trips, food, \
         funny moments, plans, entertainment), not a hyper-specific detail or count.\n\
         2. Do not repeat the category of any previously asked question.\n\
         3. Provide 4 options: 1 correct and 3 plausible distractors, all different from \
         the options of previous questions.\n\
         4. Provide up to 3 hints, each more revealing than the last.\n\
         5. If no archive data is shown above, still produce a plausible general question \
         and say so in data_source.\n",
    );

    p.push_str(
        "\nRespond ONLY with valid JSON in this shape:\n\
         {\n\
         \"question\": \"...\",\n\
         \"category\": \"funny_moments|trips|tastes|future_plans|entertainment|general\",\n\
         \"difficulty\": \"easy|medium|hard\",\n\
         \"correct_answers\": [\"main answer\", \"variant 1\", \"variant 2\"],\n\
         \"options\": [\"correct option\", \"distractor\", \"distractor\", \"distractor\"],\n\
         \"hints\": [\"hint 1\", \"hint 2\", \"hint 3\"],\n\
         \"success_message\": \"...\",\n\
         \"data_source\": \"which archive data grounds this question\"\n\
         }\n",
    );

    p
}

fn push_ranked(p: &mut String, ranked: &[(String, usize)], verb: &str) {
    if ranked.is_empty() {
        p.push_str("  (none found)\n");
    } else {
        for (term, count) in ranked {
            p.push_str(&format!("  - '{}': {} {} times\n", term, verb, count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Excerpt;

    fn test_config() -> Config {
        toml::from_str(
            "[corpus]\ndir = \"./data\"\n\n[cache]\ndir = \"./cache\"\n",
        )
        .unwrap()
    }

    fn question(text: &str, options: &[&str]) -> Question {
        Question {
            text: text.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answers: vec![options.first().unwrap_or(&"x").to_string()],
            hints: vec![],
            success_message: String::new(),
            category: "general".to_string(),
            difficulty: Default::default(),
            data_source: String::new(),
        }
    }

    #[test]
    fn test_topic_for_walks_table_then_clamps() {
        let config = test_config();
        assert_eq!(topic_for(&config, 1), config.quiz.topics[0]);
        assert_eq!(topic_for(&config, 10), config.quiz.topics[9]);
        // Beyond the table: reuse the last entry.
        assert_eq!(topic_for(&config, 11), config.quiz.topics[9]);
        assert_eq!(topic_for(&config, 99), config.quiz.topics[9]);
        // Question numbers are 1-based; 0 clamps to the first entry.
        assert_eq!(topic_for(&config, 0), config.quiz.topics[0]);
    }

    #[test]
    fn test_parse_question_valid() {
        let value = serde_json::json!({
            "question": "Which place did we visit together?",
            "options": ["The park", "The beach", "The cinema", "A cafe"],
            "correct_answers": ["the park", "park"],
            "hints": ["h1", "h2", "h3", "h4"],
            "success_message": "Yes!",
            "category": "trips",
            "difficulty": "medium",
            "data_source": "messages about parque"
        });
        let q = parse_question(value).unwrap();
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.hints.len(), 3, "hints beyond three are dropped");
    }

    #[test]
    fn test_parse_question_empty_text_fails() {
        let value = serde_json::json!({
            "question": "   ",
            "options": ["a", "b", "c", "d"],
            "correct_answers": ["a"]
        });
        assert!(parse_question(value).is_err());
    }

    #[test]
    fn test_parse_question_missing_fields_fail() {
        let value = serde_json::json!({"question": "Q?"});
        assert!(parse_question(value).is_err());
    }

    #[test]
    fn test_parse_question_blank_answers_fail() {
        let value = serde_json::json!({
            "question": "Q?",
            "options": ["a", "b", "c", "d"],
            "correct_answers": ["", "  "]
        });
        assert!(parse_question(value).is_err());
    }

    #[test]
    fn test_option_overlap_detection() {
        let previous = vec![question("Q1?", &["amor", "cielo", "vida", "bebé"])];
        let overlap = option_overlap(
            &["amor".to_string(), "parque".to_string()],
            &previous,
        );
        assert_eq!(overlap, vec!["amor".to_string()]);

        let none = option_overlap(&["playa".to_string()], &previous);
        assert!(none.is_empty());
    }

    #[test]
    fn test_prompt_includes_facts_and_previous_questions() {
        let facts = ConversationFacts {
            top_nicknames: vec![("amor".to_string(), 12)],
            top_phrases: vec![("te amo".to_string(), 7)],
            top_places: vec![("parque".to_string(), 3)],
            examples: vec![Excerpt {
                sender: "Ana".to_string(),
                content: "vamos al parque".to_string(),
                date: "15/06/2023".to_string(),
            }],
            last_date: Some("2023-06-15".to_string()),
        };
        let previous = vec![question("What nickname do I use?", &["amor", "x", "y", "z"])];

        let prompt = build_prompt(&facts, &previous, 2, 7);
        assert!(prompt.contains("'amor': used 12 times"));
        assert!(prompt.contains("'te amo': said 7 times"));
        assert!(prompt.contains("'parque': mentioned 3 times"));
        assert!(prompt.contains("vamos al parque"));
        assert!(prompt.contains("ends on 2023-06-15"));
        assert!(prompt.contains("What nickname do I use?"));
        assert!(prompt.contains("question #2 of 7"));
    }

    #[test]
    fn test_prompt_marks_missing_data() {
        let prompt = build_prompt(&ConversationFacts::default(), &[], 1, 7);
        assert!(prompt.contains("(none found)"));
        assert!(prompt.contains("(no data found in the archive for this topic)"));
        assert!(prompt.contains("none\n"));
    }
}
