//! Background information about a topic, gathered once when its round starts.

mod canned;
mod tavily;
mod wikipedia;

pub use canned::CannedResearcher;

use crate::llm::{LlmConfig, LlmProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type ResearchResult<T> = Result<T, ResearchError>;

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no background information found")]
    Empty,

    #[error("lookup unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TopicResearcher: Send + Sync {
    async fn lookup(&self, theme: &str, topic: &str) -> ResearchResult<String>;
}

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Wikipedia language edition, e.g. "en"
    pub wikipedia_lang: String,
    pub tavily_api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            wikipedia_lang: "en".to_string(),
            tavily_api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl ResearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            wikipedia_lang: std::env::var("WIKIPEDIA_LANG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.wikipedia_lang),
            tavily_api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            timeout: std::env::var("RESEARCH_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

const SUMMARY_SYSTEM: &str = "You are an assistant that organizes information. \
    Output only the organized summary.";

fn summary_prompt(theme: &str, topic: &str, info: &str) -> String {
    format!(
        r#"Organize the information below about a topic from the given theme.

## Theme
{theme}

## Topic
{topic}

## Information
{info}"#
    )
}

/// Wikipedia plus optional Tavily search, optionally condensed by an LLM
pub struct WebResearcher {
    client: reqwest::Client,
    config: ResearchConfig,
    summarizer: Option<(Arc<dyn LlmProvider>, LlmConfig)>,
}

impl WebResearcher {
    pub fn new(config: ResearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("topicliar/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, provider: Arc<dyn LlmProvider>, llm: LlmConfig) -> Self {
        self.summarizer = Some((provider, llm));
        self
    }

    async fn summarize(&self, theme: &str, topic: &str, raw: String) -> String {
        let Some((provider, llm)) = &self.summarizer else {
            return raw;
        };

        let request = llm.request(SUMMARY_SYSTEM, summary_prompt(theme, topic, &raw));
        match provider.generate(request).await {
            Ok(response) if !response.text.trim().is_empty() => response.text,
            Ok(_) => raw,
            Err(e) => {
                tracing::warn!("Summary of '{}' failed, keeping raw text: {}", topic, e);
                raw
            }
        }
    }
}

#[async_trait]
impl TopicResearcher for WebResearcher {
    async fn lookup(&self, theme: &str, topic: &str) -> ResearchResult<String> {
        let wiki = wikipedia::search_snippet(&self.client, &self.config.wikipedia_lang, topic);
        let web = async {
            match &self.config.tavily_api_key {
                Some(key) => {
                    let query = format!("Overview of {} ({})", topic, theme);
                    tavily::search(&self.client, key, &query).await
                }
                None => Ok(Vec::new()),
            }
        };
        let (wiki, web) = tokio::join!(wiki, web);

        let mut parts = Vec::new();
        let mut first_error = None;

        match web {
            Ok(found) => parts.extend(found),
            Err(e) => {
                tracing::warn!("Web search for '{}' failed: {}", topic, e);
                first_error = first_error.or(Some(e));
            }
        }
        match wiki {
            Ok(Some(snippet)) => parts.push(snippet),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Wikipedia lookup for '{}' failed: {}", topic, e);
                first_error = first_error.or(Some(e));
            }
        }

        parts.retain(|p| !p.trim().is_empty());
        if parts.is_empty() {
            return Err(first_error.unwrap_or(ResearchError::Empty));
        }

        Ok(self.summarize(theme, topic, parts.join("\n")).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_research_config_from_env() {
        std::env::set_var("WIKIPEDIA_LANG", "ja");
        std::env::set_var("TAVILY_API_KEY", "");
        std::env::set_var("RESEARCH_TIMEOUT", "3");

        let config = ResearchConfig::from_env();

        std::env::remove_var("WIKIPEDIA_LANG");
        std::env::remove_var("TAVILY_API_KEY");
        std::env::remove_var("RESEARCH_TIMEOUT");

        assert_eq!(config.wikipedia_lang, "ja");
        assert!(config.tavily_api_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_summary_prompt_carries_inputs() {
        let prompt = summary_prompt("animals", "dog", "Dogs bark.");
        assert!(prompt.contains("animals"));
        assert!(prompt.contains("Dogs bark."));
    }

    #[tokio::test]
    #[ignore] // Hits the live Wikipedia API
    async fn test_web_lookup() {
        let researcher = WebResearcher::new(ResearchConfig::default());
        let info = researcher.lookup("animals", "Dog").await.unwrap();
        assert!(!info.is_empty());
    }
}
