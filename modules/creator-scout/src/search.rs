use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use creator_scout_common::SearchHit;

use crate::traits::WebSearcher;

/// Google Custom Search returns at most 10 results per request.
const GOOGLE_MAX_NUM: usize = 10;

fn search_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build search HTTP client")
}

// --- Google Custom Search ---

pub struct GoogleSearcher {
    api_key: String,
    engine_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleSearcher {
    pub fn new(api_key: &str, engine_id: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            client: search_http_client()?,
        })
    }
}

#[async_trait]
impl WebSearcher for GoogleSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.clamp(1, GOOGLE_MAX_NUM);
        info!(query, num, "Google search");
        let num = num.to_string();

        let resp = self
            .client
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .context("Google search request failed")?
            .error_for_status()
            .context("Google search returned an error status")?;

        let data: GoogleResponse = resp
            .json()
            .await
            .context("Failed to parse Google search response")?;

        let hits = collect_hits(
            data.items
                .into_iter()
                .map(|i| SearchHit::new(i.link, i.title, i.snippet)),
            max_results,
        );

        info!(query, count = hits.len(), "Google search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "google"
    }
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: search_http_client()?,
        })
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
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

        let hits = collect_hits(
            data.organic
                .into_iter()
                .map(|r| SearchHit::new(r.link, r.title, r.snippet)),
            max_results,
        );

        info!(query, count = hits.len(), "Serper search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

/// Drop entries without a usable http(s) link and cap the list.
fn collect_hits(hits: impl Iterator<Item = SearchHit>, max_results: usize) -> Vec<SearchHit> {
    hits.filter(|h| {
        url::Url::parse(&h.url)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false)
    })
    .take(max_results)
    .collect()
}
