//! Maps a free-text video title to a playable asset.
//!
//! Tiers are tried strictly in order and the first hit wins:
//!
//! 1. case-insensitive exact title
//! 2. case-sensitive exact title
//! 3. substring
//! 4. substring on the part before a colon
//! 5. remote semantic search

pub mod catalog;
pub mod chapters;
pub mod search;
pub mod storage;

pub use catalog::{AssetCatalog, InMemoryCatalog, RestCatalog, TitleQuery};
pub use chapters::{parse_chapters, parse_timestamp};
pub use search::{HttpSemanticSearch, SearchHit, SemanticSearch};
pub use storage::{SignedUrlProvider, SupabaseStorage};

use experience_types::{Chapter, VideoAsset};
use std::sync::Arc;

/// The strategy that found an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactIgnoreCase = 1,
    Exact = 2,
    Contains = 3,
    Keyword = 4,
    Semantic = 5,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No title given")]
    EmptyTitle,
    #[error("No video matches {title:?}")]
    NotFound { title: String },
    #[error("Could not sign playback URL for {asset_id}: {reason}")]
    SignedUrl { asset_id: String, reason: String },
}

/// A video ready to hand to the player.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolvedVideo {
    asset: VideoAsset,
    tier: MatchTier,
    playback_url: String,
    chapters: Vec<Chapter>,
}

impl ResolvedVideo {
    pub fn asset(&self) -> &VideoAsset {
        &self.asset
    }

    pub fn tier(&self) -> MatchTier {
        self.tier
    }

    pub fn playback_url(&self) -> &str {
        &self.playback_url
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }
}

/// The part of `title` before a colon, when that differs from the title.
pub fn keyword_of(title: &str) -> Option<&str> {
    let (keyword, _) = title.split_once(':')?;
    let keyword = keyword.trim();
    (!keyword.is_empty() && keyword != title.trim()).then_some(keyword)
}

pub struct VideoResolver {
    catalog: Arc<dyn AssetCatalog>,
    search: Option<Arc<dyn SemanticSearch>>,
    storage: Option<Arc<dyn SignedUrlProvider>>,
    signed_url_ttl_secs: u64,
}

impl VideoResolver {
    pub fn new(catalog: Arc<dyn AssetCatalog>, signed_url_ttl_secs: u64) -> Self {
        Self {
            catalog,
            search: None,
            storage: None,
            signed_url_ttl_secs,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SemanticSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn SignedUrlProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn resolve(&self, title: &str, demo_id: &str) -> Result<ResolvedVideo, ResolveError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ResolveError::EmptyTitle);
        }

        let Some((asset, tier)) = self.find(title, demo_id).await else {
            tracing::debug!(title, demo_id, "no video matched any tier");
            return Err(ResolveError::NotFound {
                title: title.to_string(),
            });
        };
        tracing::debug!(title, asset_id = asset.id(), ?tier, "video resolved");

        let playback_url = self.playback_url(&asset).await?;
        let chapters = asset
            .chapter_metadata()
            .map(parse_chapters)
            .unwrap_or_default();

        Ok(ResolvedVideo {
            asset,
            tier,
            playback_url,
            chapters,
        })
    }

    async fn find(&self, title: &str, demo_id: &str) -> Option<(VideoAsset, MatchTier)> {
        let mut attempts = vec![
            (MatchTier::ExactIgnoreCase, TitleQuery::EqualsIgnoreCase(title.to_string())),
            (MatchTier::Exact, TitleQuery::Equals(title.to_string())),
            (MatchTier::Contains, TitleQuery::Contains(title.to_string())),
        ];
        if let Some(keyword) = keyword_of(title) {
            attempts.push((MatchTier::Keyword, TitleQuery::Contains(keyword.to_string())));
        }

        for (tier, query) in attempts {
            match self.catalog.find_by_title(demo_id, &query).await {
                Ok(assets) => {
                    if let Some(asset) = assets.into_iter().next() {
                        return Some((asset, tier));
                    }
                }
                Err(e) => tracing::debug!(?tier, "catalog lookup failed: {e:#}"),
            }
        }

        self.semantic(title, demo_id)
            .await
            .map(|asset| (asset, MatchTier::Semantic))
    }

    async fn semantic(&self, title: &str, demo_id: &str) -> Option<VideoAsset> {
        let search = self.search.as_ref()?;
        let hits = match search.search(title, demo_id).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::debug!("semantic search failed: {e:#}");
                return None;
            }
        };

        let best = hits
            .into_iter()
            .filter_map(|hit| hit.confidence.map(|confidence| (hit.asset_ref, confidence)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;

        match self.catalog.get(demo_id, &best.0).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::debug!(asset_ref = %best.0, "catalog lookup failed: {e:#}");
                None
            }
        }
    }

    async fn playback_url(&self, asset: &VideoAsset) -> Result<String, ResolveError> {
        if asset.has_absolute_url() {
            return Ok(asset.storage_locator().trim().to_string());
        }

        let signed_url_error = |reason: String| ResolveError::SignedUrl {
            asset_id: asset.id().to_string(),
            reason,
        };
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| signed_url_error("no storage configured".to_string()))?;
        storage
            .signed_url(asset.storage_locator(), self.signed_url_ttl_secs)
            .await
            .map_err(|e| signed_url_error(format!("{e:#}")))
    }
}
