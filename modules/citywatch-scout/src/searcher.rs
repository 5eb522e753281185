use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

// --- WebSearcher trait ---

/// Search collaborator: one query in, the result text out.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

// --- Serper (Google Search) ---

const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";

pub struct SerperSearcher {
    api_key: String,
    max_results: usize,
    client: reqwest::Client,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    answer_box: Option<SerperAnswerBox>,
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperAnswerBox {
    #[serde(default)]
    title: String,
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    date: Option<String>,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            max_results: 5,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
        })
    }

    /// Organic hits requested per query, at least one.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        serde_json::json!({
            "q": query,
            "num": self.max_results,
        })
    }
}

/// Render a Serper response as plain text: the answer box first, then one
/// `title: snippet` line per organic hit, source wording untouched.
fn render(response: SerperResponse) -> String {
    let mut lines = Vec::new();

    if let Some(answer) = response.answer_box {
        let body = answer.answer.or(answer.snippet).unwrap_or_default();
        let line = match (answer.title.trim(), body.trim()) {
            ("", "") => None,
            ("", body) => Some(body.to_string()),
            (title, "") => Some(title.to_string()),
            (title, body) => Some(format!("{title}: {body}")),
        };
        lines.extend(line);
    }

    for hit in response.organic {
        let snippet = hit.snippet.trim();
        if snippet.is_empty() {
            continue;
        }
        let mut line = if hit.title.trim().is_empty() {
            snippet.to_string()
        } else {
            format!("{}: {}", hit.title.trim(), snippet)
        };
        if let Some(date) = hit.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            line.push_str(&format!(" ({date})"));
        }
        lines.push(line);
    }

    lines.join("\n")
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str) -> Result<String> {
        info!(query, max_results = self.max_results, "Serper search");

        let body = self.request_body(query);

        let resp = self
            .client
            .post(SERPER_SEARCH_URL)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?
            .error_for_status()
            .context("Serper API returned an error status")?;

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let organic = data.organic.len();
        let text = render(data);
        info!(query, organic, chars = text.len(), "Serper search complete");
        Ok(text)
    }
}
