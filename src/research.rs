//! Remote research bridge: web search and deep research.
//!
//! Both capabilities live behind one HTTP research endpoint. The credential
//! comes from the environment variable named in the config and is checked
//! before any network traffic. Web search is a single request; deep research
//! submits a run, then polls its result endpoint on a fixed budget and
//! reports `StillProcessing` with the run id when the budget runs out —
//! callers treat that as retryable, not as failure.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::config::ResearchConfig;
use crate::error::{Error, Result};
use crate::models::{ResearchReport, WebResult};

/// Hard ceiling on web search results, applied before delegation.
const MAX_WEB_RESULTS: usize = 10;
/// Excerpt snippets kept per web result.
const MAX_EXCERPTS: usize = 3;

pub struct ResearchClient {
    config: ResearchConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RunSubmitted {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    #[serde(default)]
    output: RunOutput,
}

#[derive(Debug, Default, Deserialize)]
struct RunOutput {
    #[serde(default)]
    content: String,
}

impl ResearchClient {
    pub fn new(config: ResearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Unavailable(format!("HTTP client init failed: {e}")))?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.config.api_key_env)
            .map_err(|_| Error::Unavailable(format!("{} not set", self.config.api_key_env)))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// One-shot web search. `num_results` is clamped to the hard ceiling
    /// before the request goes out; each result keeps at most three excerpts.
    pub async fn web_search(
        &self,
        query: &str,
        num_results: usize,
        category: Option<&str>,
        days_back: Option<u32>,
    ) -> Result<Vec<WebResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        let key = self.api_key()?;

        let body = search_body(query, num_results, category, days_back);
        let response = self
            .client
            .post(self.endpoint("/v1beta/search"))
            .header("x-api-key", &key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::RemoteFailure(format!(
                "web search returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::RemoteFailure(format!("web search response unreadable: {e}")))?;
        tracing::info!(query, results = parsed.results.len(), "web search complete");

        Ok(parsed
            .results
            .into_iter()
            .map(|r| WebResult {
                url: r.url,
                title: r.title,
                excerpts: r.excerpts.into_iter().take(MAX_EXCERPTS).collect(),
            })
            .collect())
    }

    /// Submits a deep-research run and polls its result on the configured
    /// budget. Exhausting the budget yields `StillProcessing { run_id }`.
    pub async fn deep_research(&self, query: &str) -> Result<ResearchReport> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        let key = self.api_key()?;

        let body = json!({
            "input": query,
            "processor": "base",
            "task_spec": { "output_schema": "Detailed research summary" },
        });
        let response = self
            .client
            .post(self.endpoint("/v1/tasks/runs"))
            .header("x-api-key", &key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::RemoteFailure(format!(
                "deep research submit returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let run: RunSubmitted = response.json().await.map_err(|e| {
            Error::RemoteFailure(format!("deep research submit response unreadable: {e}"))
        })?;
        tracing::info!(run_id = %run.run_id, "deep research run submitted");

        let result_url = self.endpoint(&format!("/v1/tasks/runs/{}/result", run.run_id));
        for attempt in 1..=self.config.poll_attempts {
            let response = self
                .client
                .get(&result_url)
                .header("x-api-key", &key)
                .send()
                .await?;
            if response.status() == reqwest::StatusCode::OK {
                let parsed: RunResult = response.json().await.map_err(|e| {
                    Error::RemoteFailure(format!("deep research result unreadable: {e}"))
                })?;
                tracing::info!(run_id = %run.run_id, attempt, "deep research run complete");
                return Ok(ResearchReport {
                    run_id: run.run_id,
                    content: parsed.output.content,
                });
            }
            // Anything but 200 means "not ready yet"; keep polling until the
            // budget runs out.
            if attempt < self.config.poll_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            }
        }

        tracing::warn!(run_id = %run.run_id, "deep research budget exhausted");
        Err(Error::StillProcessing { run_id: run.run_id })
    }
}

fn search_body(
    query: &str,
    num_results: usize,
    category: Option<&str>,
    days_back: Option<u32>,
) -> serde_json::Value {
    let mut body = json!({
        "objective": query,
        "max_results": num_results.clamp(1, MAX_WEB_RESULTS),
    });
    if let Some(category) = category {
        body["category"] = json!(category);
    }
    if let Some(days) = days_back {
        body["days_back"] = json!(days);
    }
    body
}
