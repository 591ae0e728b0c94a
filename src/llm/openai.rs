use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use std::time::Instant;

/// Chat completions against the OpenAI API
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn chat_request(&self, request: &GenerateRequest) -> LlmResult<CreateChatCompletionRequest> {
        let build_err = |e: async_openai::error::OpenAIError| LlmError::ApiError(e.to_string());

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.as_str())
                    .build()
                    .map_err(build_err)?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build()
                .map_err(build_err)?
                .into(),
        );

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if request.json_reply {
            builder.response_format(ResponseFormat::JsonObject);
        }
        builder.build().map_err(build_err)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let start = Instant::now();
        let chat_request = self.chat_request(&request)?;

        let response =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| LlmError::Timeout(request.timeout))?
                .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ParseError("completion had no content".to_string()))?;

        let metadata = ResponseMetadata {
            provider: "openai".to_string(),
            model: self.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            "openai {} replied in {}ms ({:?} tokens)",
            metadata.model,
            metadata.latency_ms,
            metadata.tokens_used
        );

        Ok(GenerateResponse {
            text: text.trim().to_string(),
            metadata,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json_reply: bool) -> GenerateRequest {
        GenerateRequest {
            system: Some("You judge a guessing game.".to_string()),
            prompt: "Is a dog an animal?".to_string(),
            max_tokens: Some(10),
            timeout: Duration::from_secs(30),
            json_reply,
        }
    }

    #[test]
    fn test_chat_request_carries_system_and_json_mode() {
        let provider = OpenAiProvider::new("sk-test".to_string(), "gpt-4o-mini".to_string());

        let chat = provider.chat_request(&request(true)).unwrap();
        let json = serde_json::to_value(&chat).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_plain_request_has_no_response_format() {
        let provider = OpenAiProvider::new("sk-test".to_string(), "gpt-4o-mini".to_string());

        let chat = provider.chat_request(&request(false)).unwrap();
        let json = serde_json::to_value(&chat).unwrap();

        assert!(json.get("response_format").is_none());
    }

    #[tokio::test]
    #[ignore] // Only run with actual API key
    async fn test_openai_generate() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiProvider::new(api_key, "gpt-4o-mini".to_string());

        let response = provider.generate(request(false)).await.unwrap();

        assert!(!response.text.is_empty());
        assert_eq!(response.metadata.provider, "openai");
    }
}
