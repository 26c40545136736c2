use anyhow::{Context, Result};
use async_trait::async_trait;
use experience_types::VideoAsset;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::Path;

/// How a title lookup compares against stored titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleQuery {
    EqualsIgnoreCase(String),
    Equals(String),
    /// Case-insensitive substring match.
    Contains(String),
}

impl TitleQuery {
    pub fn matches(&self, title: &str) -> bool {
        match self {
            TitleQuery::EqualsIgnoreCase(q) => title.to_lowercase() == q.to_lowercase(),
            TitleQuery::Equals(q) => title == q,
            TitleQuery::Contains(q) => title.to_lowercase().contains(&q.to_lowercase()),
        }
    }

    /// The PostgREST filter for the `title` column.
    fn postgrest_filter(&self) -> String {
        match self {
            TitleQuery::EqualsIgnoreCase(q) => format!("ilike.{}", escape_like(q)),
            TitleQuery::Equals(q) => format!("eq.{q}"),
            TitleQuery::Contains(q) => format!("ilike.*{}*", escape_like(q)),
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "\\*")
}

/// Lookup of the videos configured for a demo.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Assets of `demo_id` whose title satisfies `query`, in catalog order.
    async fn find_by_title(&self, demo_id: &str, query: &TitleQuery) -> Result<Vec<VideoAsset>>;

    async fn get(&self, demo_id: &str, asset_id: &str) -> Result<Option<VideoAsset>>;
}

/// A catalog held in memory, keyed by demo id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    demos: HashMap<String, Vec<VideoAsset>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, demo_id: &str, asset: VideoAsset) -> Self {
        self.demos.entry(demo_id.to_string()).or_default().push(asset);
        self
    }

    /// Loads `{ "<demo id>": [ <video row>, ... ] }` from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let demos: HashMap<String, Vec<VideoAsset>> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid catalog file {}", path.display()))?;
        tracing::info!(
            demos = demos.len(),
            videos = demos.values().map(Vec::len).sum::<usize>(),
            "Loaded video catalog"
        );
        Ok(Self { demos })
    }

    fn assets(&self, demo_id: &str) -> &[VideoAsset] {
        self.demos.get(demo_id).map(Vec::as_slice).unwrap_or_default()
    }
}

#[async_trait]
impl AssetCatalog for InMemoryCatalog {
    async fn find_by_title(&self, demo_id: &str, query: &TitleQuery) -> Result<Vec<VideoAsset>> {
        Ok(self
            .assets(demo_id)
            .iter()
            .filter(|asset| query.matches(asset.title()))
            .cloned()
            .collect())
    }

    async fn get(&self, demo_id: &str, asset_id: &str) -> Result<Option<VideoAsset>> {
        Ok(self
            .assets(demo_id)
            .iter()
            .find(|asset| asset.id() == asset_id)
            .cloned())
    }
}

/// Reads the video table through Supabase's PostgREST endpoint.
pub struct RestCatalog {
    client: reqwest::Client,
    base_url: String,
    service_key: SecretString,
    table: String,
}

impl RestCatalog {
    pub fn new(base_url: &str, service_key: SecretString, table: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            table: table.to_string(),
        }
    }

    async fn select(&self, filters: &[(&str, String)]) -> Result<Vec<VideoAsset>> {
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let key = self.service_key.expose_secret();

        let response = self
            .client
            .get(&url)
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
            .query(&[("select", "*"), ("limit", "1")])
            .query(filters)
            .send()
            .await
            .context("Failed to query video catalog")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Catalog query failed: {status} - {body}");
        }

        response
            .json()
            .await
            .context("Failed to decode catalog rows")
    }
}

#[async_trait]
impl AssetCatalog for RestCatalog {
    async fn find_by_title(&self, demo_id: &str, query: &TitleQuery) -> Result<Vec<VideoAsset>> {
        self.select(&[
            ("demo_id", format!("eq.{demo_id}")),
            ("title", query.postgrest_filter()),
        ])
        .await
    }

    async fn get(&self, demo_id: &str, asset_id: &str) -> Result<Option<VideoAsset>> {
        let rows = self
            .select(&[
                ("demo_id", format!("eq.{demo_id}")),
                ("id", format!("eq.{asset_id}")),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }
}
