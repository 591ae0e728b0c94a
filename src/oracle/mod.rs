//! The natural-language judge: answers yes/no questions about the hidden
//! topic, grades guesses and writes questions for the inactivity bot.

mod judge;
mod prompts;
mod scripted;

pub use judge::LlmOracle;
pub use scripted::ScriptedOracle;

use crate::llm::LlmError;
use crate::types::{AnswerOutcome, QuestionOutcome};
use async_trait::async_trait;
use serde::Serialize;

pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unparseable oracle reply: {0}")]
    Unparseable(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// A judgment plus the oracle's justification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict<T> {
    pub outcome: T,
    pub reason: String,
}

impl<T> Verdict<T> {
    pub fn new(outcome: T, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuestionJudgeRequest<'a> {
    pub theme: &'a str,
    pub topic: &'a str,
    pub background: &'a str,
    pub existing_questions: &'a [String],
    pub question: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerJudgeRequest<'a> {
    pub theme: &'a str,
    pub topic: &'a str,
    pub background: &'a str,
    pub answer: &'a str,
    /// Search keywords relating the answer to the topic
    pub keywords: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct QuestionGenerationRequest<'a> {
    pub theme: &'a str,
    pub topic: &'a str,
    pub background: &'a str,
    pub existing_questions: &'a [String],
    /// Steer toward a question whose answer is "yes"
    pub want_yes: bool,
    pub allow_proper_nouns: bool,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn judge_question(
        &self,
        request: QuestionJudgeRequest<'_>,
    ) -> OracleResult<Verdict<QuestionOutcome>>;

    async fn judge_answer(
        &self,
        request: AnswerJudgeRequest<'_>,
    ) -> OracleResult<Verdict<AnswerOutcome>>;

    /// Keywords for looking up how `input` relates to `topic`
    async fn relation_keywords(&self, theme: &str, topic: &str, input: &str)
        -> OracleResult<String>;

    /// `None` when the oracle could not come up with a question
    async fn generate_question(
        &self,
        request: QuestionGenerationRequest<'_>,
    ) -> OracleResult<Option<String>>;
}
