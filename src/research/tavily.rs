use super::ResearchResult;
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl TavilyResponse {
    /// The synthesized answer first, then each hit's content (or title)
    fn into_passages(self) -> Vec<String> {
        self.answer
            .into_iter()
            .chain(self.results.into_iter().map(|hit| {
                if hit.content.is_empty() {
                    hit.title
                } else {
                    hit.content
                }
            }))
            .filter(|s| !s.trim().is_empty())
            .collect()
    }
}

pub(super) async fn search(
    client: &reqwest::Client,
    api_key: &str,
    query: &str,
) -> ResearchResult<Vec<String>> {
    let request = TavilyRequest {
        api_key,
        query,
        search_depth: "advanced",
        include_answer: true,
        max_results: MAX_RESULTS,
    };

    let response: TavilyResponse = client
        .post(ENDPOINT)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response.into_passages())
}
