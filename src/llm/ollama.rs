use super::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Completions from a local Ollama server
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    /// "json" constrains the reply to one JSON value
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl<'a> GenerateBody<'a> {
    fn new(model: &'a str, request: &'a GenerateRequest) -> Self {
        Self {
            model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            format: request.json_reply.then_some("json"),
            stream: false,
            options: request
                .max_tokens
                .map(|num_predict| GenerateOptions { num_predict }),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let start = Instant::now();
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody::new(&self.model, &request);

        let response = tokio::time::timeout(
            request.timeout,
            self.client.post(&url).json(&body).send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(request.timeout))?
        .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::ApiError(format!("ollama returned {}", status)));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let metadata = ResponseMetadata {
            provider: "ollama".to_string(),
            model: self.model.clone(),
            tokens_used: reply.eval_count,
            latency_ms: start.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            "ollama {} replied in {}ms",
            metadata.model,
            metadata.latency_ms
        );

        Ok(GenerateResponse {
            text: reply.response.trim().to_string(),
            metadata,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
