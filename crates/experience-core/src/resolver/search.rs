use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};

/// One ranked match from the semantic search service.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SearchHit {
    #[serde(alias = "video_id", alias = "assetRef")]
    pub asset_ref: String,
    #[serde(default, alias = "score")]
    pub confidence: Option<f64>,
}

/// Free-text lookup of videos by what they show.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Hits for `query` within `scope_id`, best first.
    async fn search(&self, query: &str, scope_id: &str) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    #[serde(default, alias = "data")]
    results: Vec<SearchHit>,
}

pub struct HttpSemanticSearch {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
}

impl HttpSemanticSearch {
    pub fn new(url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl SemanticSearch for HttpSemanticSearch {
    async fn search(&self, query: &str, scope_id: &str) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "query": query,
            "scope_id": scope_id,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response: SearchResponse = request
            .send()
            .await
            .context("Failed to reach semantic search")?
            .error_for_status()
            .context("Semantic search rejected the query")?
            .json()
            .await
            .context("Failed to decode semantic search results")?;

        tracing::debug!(query, hits = response.results.len(), "semantic search");
        Ok(response.results)
    }
}
