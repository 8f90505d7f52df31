//! Quiz session state machine.
//!
//! A session tracks one quiz attempt: the questions asked so far, the
//! current question, attempt counts, hints, and the final outcome. All
//! counter transitions happen in [`QuizSession::process_answer`]; the
//! caller appends follow-up questions through
//! [`QuizSession::push_question`] (next slot) or
//! [`QuizSession::replace_current`] (same slot, after exhausted attempts).
//!
//! Answer checking is deliberately fuzzy: case-insensitive,
//! accent-insensitive, substring match in either direction, with a
//! minimum-length guard so short tokens must match exactly.
//!
//! State shape:
//!
//! ```text
//! AwaitingAnswer(index, attempts)
//!   ├─ correct, total reached ─▶ Completed(Passed)
//!   ├─ correct, slots left ────▶ AwaitingAnswer(index+1, 0)   (after push_question)
//!   ├─ correct, no slots left ─▶ Completed(Failed)
//!   ├─ wrong, attempts left ───▶ AwaitingAnswer(index, attempts+1) + hint
//!   ├─ wrong, exhausted ───────▶ AwaitingAnswer(index, 0)     (replacement, skip counted)
//!   └─ wrong, exhausted, no slots left ─▶ Completed(Failed)
//! ```
//!
//! The completion check runs after every answer, so a session that can no
//! longer be passed (a skip burned a required slot) ends immediately. That
//! is what keeps `correct_count + skipped_count <= total_questions` true
//! for every completed session.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Question;

/// Filler hint when a question carries fewer hints than allowed attempts.
pub const GENERIC_HINT: &str = "Think about our special moments...";

/// Substring matching only applies when both sides are at least this long.
const MIN_FUZZY_LEN: usize = 4;

/// Terminal result of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizOutcome {
    /// Every question answered correctly; the reveal is unlocked.
    Passed,
    /// A required slot was lost to skips (or the session was ended early);
    /// the reveal stays locked.
    Failed,
}

/// What happened to one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Correct {
        success_message: String,
        /// `Some` when this answer completed the quiz, either way.
        finished: Option<QuizOutcome>,
    },
    Incorrect {
        hint: String,
        attempts_left: u32,
    },
    /// All attempts burned on the current question. When `quiz_failed` is
    /// false the caller must generate a replacement question and hand it to
    /// [`QuizSession::replace_current`].
    AttemptsExhausted {
        quiz_failed: bool,
    },
}

/// One answer attempt, kept for the session's history.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub question: String,
    pub answer: String,
    pub correct: bool,
    pub attempts: u32,
    pub skipped: bool,
}

/// Mutable per-user state of one quiz attempt.
#[derive(Debug)]
pub struct QuizSession {
    pub session_id: Uuid,
    pub user_name: String,
    pub total_questions: u32,
    /// Active question per slot reached; `questions_asked[current_index]`
    /// is the question awaiting an answer.
    pub questions_asked: Vec<Question>,
    /// Questions swapped out by [`QuizSession::replace_current`]; kept so
    /// the generator can still avoid repeating them.
    pub retired_questions: Vec<Question>,
    pub current_index: usize,
    pub correct_count: u32,
    pub skipped_count: u32,
    pub attempts_on_current: u32,
    pub max_attempts: u32,
    pub hints_used: u32,
    pub outcome: Option<QuizOutcome>,
    pub history: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(
        user_name: &str,
        total_questions: u32,
        max_attempts: u32,
        first_question: Question,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            total_questions,
            questions_asked: vec![first_question],
            retired_questions: Vec::new(),
            current_index: 0,
            correct_count: 0,
            skipped_count: 0,
            attempts_on_current: 0,
            max_attempts,
            hints_used: 0,
            outcome: None,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn completed(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions_asked.get(self.current_index)
    }

    /// 1-based number of the current question slot.
    pub fn current_question_number(&self) -> u32 {
        self.current_index as u32 + 1
    }

    /// Quiz slots still open. Zero (with the total not yet reached) means
    /// the quiz can no longer be passed.
    pub fn questions_remaining(&self) -> i64 {
        self.total_questions as i64 - (self.correct_count + self.skipped_count) as i64
    }

    /// Every question generated for this session, in generation order.
    /// Feeds the generator's uniqueness constraint.
    pub fn previous_questions(&self) -> Vec<Question> {
        self.retired_questions
            .iter()
            .chain(self.questions_asked.iter())
            .cloned()
            .collect()
    }

    /// 1-based sequence number for the next question to generate. Distinct
    /// from the slot number: replacements consume generation numbers
    /// without advancing the slot.
    pub fn next_generation_number(&self) -> u32 {
        (self.retired_questions.len() + self.questions_asked.len()) as u32 + 1
    }

    /// Append the next question and advance to its slot.
    pub fn push_question(&mut self, question: Question) {
        self.questions_asked.push(question);
        self.current_index = self.questions_asked.len() - 1;
        self.attempts_on_current = 0;
    }

    /// Swap in a replacement question at the current slot, retiring the old
    /// one. Resets the attempt counter; `current_index` does not move.
    pub fn replace_current(&mut self, question: Question) {
        if let Some(old) = self.questions_asked.get_mut(self.current_index) {
            self.retired_questions.push(std::mem::replace(old, question));
        } else {
            self.questions_asked.push(question);
            self.current_index = self.questions_asked.len() - 1;
        }
        self.attempts_on_current = 0;
    }

    /// End the session without a pass, e.g. when question generation fails
    /// mid-quiz and the quiz cannot continue.
    pub fn end_with_failure(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(QuizOutcome::Failed);
        }
    }

    /// Apply one submitted answer to the session.
    pub fn process_answer(&mut self, answer: &str) -> Result<AnswerOutcome> {
        if self.completed() {
            bail!("Quiz already completed");
        }
        let question = match self.current_question() {
            Some(q) => q.clone(),
            None => bail!("No current question available"),
        };

        if check_answer(answer, &question.correct_answers) {
            self.history.push(AttemptRecord {
                question: question.text.clone(),
                answer: answer.to_string(),
                correct: true,
                attempts: self.attempts_on_current,
                skipped: false,
            });
            self.correct_count += 1;
            self.attempts_on_current = 0;

            if self.correct_count >= self.total_questions {
                self.outcome = Some(QuizOutcome::Passed);
            } else if self.questions_remaining() <= 0 {
                self.outcome = Some(QuizOutcome::Failed);
            }
            return Ok(AnswerOutcome::Correct {
                success_message: question.success_message.clone(),
                finished: self.outcome,
            });
        }

        self.attempts_on_current += 1;

        if self.attempts_on_current >= self.max_attempts {
            self.history.push(AttemptRecord {
                question: question.text.clone(),
                answer: answer.to_string(),
                correct: false,
                attempts: self.attempts_on_current,
                skipped: true,
            });
            self.skipped_count += 1;
            self.attempts_on_current = 0;

            let quiz_failed = self.questions_remaining() <= 0;
            if quiz_failed {
                self.outcome = Some(QuizOutcome::Failed);
            }
            return Ok(AnswerOutcome::AttemptsExhausted { quiz_failed });
        }

        self.hints_used += 1;
        let hint = question
            .hints
            .get(self.attempts_on_current as usize - 1)
            .cloned()
            .unwrap_or_else(|| GENERIC_HINT.to_string());

        Ok(AnswerOutcome::Incorrect {
            hint,
            attempts_left: self.max_attempts - self.attempts_on_current,
        })
    }
}

/// Fuzzy answer check: the normalized user answer matches when it equals a
/// normalized variant, or (when both sides reach the minimum length) when
/// either contains the other.
pub fn check_answer(answer: &str, correct_answers: &[String]) -> bool {
    let user = normalize(answer);
    if user.is_empty() {
        return false;
    }

    correct_answers.iter().any(|variant| {
        let v = normalize(variant);
        if v.is_empty() {
            return false;
        }
        if user == v {
            return true;
        }
        user.chars().count().min(v.chars().count()) >= MIN_FUZZY_LEN
            && (user.contains(&v) || v.contains(&user))
    })
}

/// Lowercase, strip accents, and trim.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(fold_accent)
        .collect::<String>()
        .trim()
        .to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}
