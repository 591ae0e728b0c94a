use super::ResearchResult;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

/// Snippet of the best MediaWiki search hit, as plain text
pub(super) async fn search_snippet(
    client: &reqwest::Client,
    lang: &str,
    query: &str,
) -> ResearchResult<Option<String>> {
    let url = format!("https://{}.wikipedia.org/w/api.php", lang);
    let response: SearchResponse = client
        .get(&url)
        .query(&[
            ("action", "query"),
            ("list", "search"),
            ("format", "json"),
            ("srlimit", "1"),
            ("srenablerewrites", "1"),
            ("srsearch", query),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let hit = response.query.and_then(|q| q.search.into_iter().next());
    Ok(hit.map(|h| format!("{}: {}", h.title, strip_markup(&h.snippet))))
}

/// Drop the `<span class="searchmatch">` highlighting and decode the common entities
fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
