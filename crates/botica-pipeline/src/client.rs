//! # POS API Client
//!
//! HTTP client for the upstream POS platform, behind the [`DocumentSource`]
//! seam so the fetcher and pipeline can run against stubs.
//!
//! ## Envelope Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Upstream Response Shapes                              │
//! │                                                                         │
//! │  Some nodes answer with a bare array:                                  │
//! │     [ {...}, {...} ]                                                   │
//! │                                                                         │
//! │  Others wrap the same items in a page object:                          │
//! │     { "content": [ {...}, {...} ], "totalElements": 2, ... }           │
//! │                                                                         │
//! │  Both decode through one untagged enum; everything downstream sees     │
//! │  a plain Vec<Value>. No other layer inspects response shapes.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failed requests surface as [`PipelineError::Fetch`] carrying their
//! `(day, node, category)` unit. The client never retries; the fetcher
//! records the unit as skipped and the run carries on.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{PipelineError, PipelineResult};
use botica_core::DocCategory;

// =============================================================================
// Document Source Seam
// =============================================================================

/// Anything that can produce one day's raw documents for one node and
/// category. Implemented by [`HttpPosClient`] in production and by stubs
/// in fetcher/pipeline tests.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches the raw documents for one `(category, day, node)` unit.
    async fn fetch_documents(
        &self,
        category: DocCategory,
        day: NaiveDate,
        node: &str,
    ) -> PipelineResult<Vec<Value>>;
}

// =============================================================================
// Response Envelope
// =============================================================================

/// The two response shapes the upstream API produces for the same query.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentEnvelope {
    /// Plain JSON array of documents.
    Bare(Vec<Value>),
    /// Paginated page object; only the items matter, the page metadata is
    /// ignored because the per-day queries never exceed one page.
    Paged { content: Vec<Value> },
}

impl DocumentEnvelope {
    fn into_items(self) -> Vec<Value> {
        match self {
            DocumentEnvelope::Bare(items) => items,
            DocumentEnvelope::Paged { content } => content,
        }
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Production [`DocumentSource`] talking to the POS platform over HTTP.
///
/// One `reqwest::Client` is built up front and reused for every request,
/// so connection pooling works across the whole run.
pub struct HttpPosClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    mode: Option<String>,
}

impl HttpPosClient {
    /// Builds the client from API settings.
    pub fn new(cfg: &ApiConfig) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PipelineError::HttpClientBuild(e.to_string()))?;

        Ok(HttpPosClient {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            bearer_token: cfg.bearer_token.clone(),
            mode: cfg.mode.clone(),
        })
    }

    fn documents_url(&self, category: DocCategory) -> String {
        format!("{}/documents/{}", self.base_url, category.as_str())
    }
}

#[async_trait]
impl DocumentSource for HttpPosClient {
    async fn fetch_documents(
        &self,
        category: DocCategory,
        day: NaiveDate,
        node: &str,
    ) -> PipelineResult<Vec<Value>> {
        let fetch_err = |message: String| PipelineError::Fetch {
            day,
            node: node.to_string(),
            category,
            message,
        };

        let mut request = self.http.get(self.documents_url(category)).query(&[
            ("date", day.format("%Y-%m-%d").to_string()),
            ("node", node.to_string()),
        ]);
        if let Some(mode) = &self.mode {
            request = request.query(&[("mode", mode.as_str())]);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("upstream returned {}", status)));
        }

        let envelope: DocumentEnvelope = response
            .json()
            .await
            .map_err(|e| fetch_err(format!("malformed envelope: {}", e)))?;

        let items = envelope.into_items();
        debug!(
            category = %category,
            day = %day,
            node = %node,
            count = items.len(),
            "Fetched documents"
        );
        Ok(items)
    }
}
