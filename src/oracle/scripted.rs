use super::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Deterministic oracle for tests and for running without an LLM.
///
/// An answer that matches the topic (ignoring case and surrounding space) is
/// `Correct`; anything else takes the next queued verdict, or a fixed default
/// once the queue is empty.
#[derive(Default)]
pub struct ScriptedOracle {
    question_verdicts: Mutex<VecDeque<Verdict<QuestionOutcome>>>,
    answer_verdicts: Mutex<VecDeque<Verdict<AnswerOutcome>>>,
    generated: Mutex<VecDeque<Option<String>>>,
    failing: AtomicBool,
    question_calls: AtomicUsize,
    answer_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_question_verdict(&self, outcome: QuestionOutcome, reason: &str) {
        self.question_verdicts
            .lock()
            .await
            .push_back(Verdict::new(outcome, reason));
    }

    pub async fn push_answer_verdict(&self, outcome: AnswerOutcome, reason: &str) {
        self.answer_verdicts
            .lock()
            .await
            .push_back(Verdict::new(outcome, reason));
    }

    pub async fn push_generated_question(&self, question: Option<&str>) {
        self.generated
            .lock()
            .await
            .push_back(question.map(str::to_string));
    }

    /// Make every call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn question_calls(&self) -> usize {
        self.question_calls.load(Ordering::SeqCst)
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> OracleResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn judge_question(
        &self,
        _request: QuestionJudgeRequest<'_>,
    ) -> OracleResult<Verdict<QuestionOutcome>> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .question_verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Verdict::new(QuestionOutcome::Unanswerable, "no scripted verdict")))
    }

    async fn judge_answer(
        &self,
        request: AnswerJudgeRequest<'_>,
    ) -> OracleResult<Verdict<AnswerOutcome>> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if request.answer.trim().eq_ignore_ascii_case(request.topic.trim()) {
            return Ok(Verdict::new(AnswerOutcome::Correct, "same name"));
        }
        Ok(self
            .answer_verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Verdict::new(AnswerOutcome::Incorrect, "no scripted verdict")))
    }

    async fn relation_keywords(
        &self,
        _theme: &str,
        topic: &str,
        input: &str,
    ) -> OracleResult<String> {
        self.check_available()?;
        Ok(format!("{} {}", topic, input))
    }

    async fn generate_question(
        &self,
        _request: QuestionGenerationRequest<'_>,
    ) -> OracleResult<Option<String>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.generated.lock().await.pop_front().flatten())
    }
}
