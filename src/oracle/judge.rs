use super::*;
use crate::llm::{LlmConfig, LlmProvider};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

/// Oracle backed by a single LLM provider
pub struct LlmOracle {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    #[serde(default)]
    reason: String,
    result: String,
}

/// The outermost `{...}` span, skipping code fences and surrounding prose
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_verdict<T>(text: &str) -> OracleResult<Verdict<T>>
where
    T: FromStr<Err = String>,
{
    let json = extract_json(text)
        .ok_or_else(|| OracleError::Unparseable(format!("no JSON object in '{}'", text)))?;
    let reply: JudgeReply =
        serde_json::from_str(json).map_err(|e| OracleError::Unparseable(e.to_string()))?;
    let outcome = reply.result.parse().map_err(OracleError::Unparseable)?;
    Ok(Verdict::new(outcome, reply.reason))
}

/// First non-empty line, without quotes or list markers
fn clean_question(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches(['*', '-'])
        .trim()
        .trim_matches(['"', '\'', '`', '「', '」'])
        .trim();
    (!line.is_empty()).then(|| line.to_string())
}

impl LlmOracle {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    async fn complete(&self, system: &str, prompt: String) -> OracleResult<String> {
        let response = self
            .provider
            .generate(self.config.request(system, prompt))
            .await?;
        Ok(response.text)
    }

    /// Like `complete`, for prompts answered with a `{reason, result}` object
    async fn judge<T>(&self, prompt: String) -> OracleResult<Verdict<T>>
    where
        T: FromStr<Err = String>,
    {
        let request = self
            .config
            .request(prompts::JUDGE_SYSTEM, prompt)
            .expecting_json();
        let response = self.provider.generate(request).await?;
        parse_verdict(&response.text)
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn judge_question(
        &self,
        request: QuestionJudgeRequest<'_>,
    ) -> OracleResult<Verdict<QuestionOutcome>> {
        let verdict = self.judge(prompts::judge_question(&request)).await?;
        tracing::debug!("judged question '{}' as {:?}", request.question, verdict.outcome);
        Ok(verdict)
    }

    async fn judge_answer(
        &self,
        request: AnswerJudgeRequest<'_>,
    ) -> OracleResult<Verdict<AnswerOutcome>> {
        let verdict = self.judge(prompts::judge_answer(&request)).await?;
        tracing::debug!("judged answer '{}' as {:?}", request.answer, verdict.outcome);
        Ok(verdict)
    }

    async fn relation_keywords(
        &self,
        theme: &str,
        topic: &str,
        input: &str,
    ) -> OracleResult<String> {
        let text = self
            .complete(
                prompts::KEYWORDS_SYSTEM,
                prompts::relation_keywords(theme, topic, input),
            )
            .await?;
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn generate_question(
        &self,
        request: QuestionGenerationRequest<'_>,
    ) -> OracleResult<Option<String>> {
        let text = self
            .complete(prompts::PLAYER_SYSTEM, prompts::generate_question(&request))
            .await?;
        Ok(clean_question(&text))
    }
}
