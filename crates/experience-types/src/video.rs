use serde_json::Value;

/// A playable demo video as stored by the configuration console.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoAsset {
    id: String,
    title: String,
    /// Absolute URL, or a storage path that must be exchanged for a signed URL.
    #[serde(alias = "storage_path", alias = "storage_url", alias = "video_url")]
    storage_locator: String,
    /// Chapter metadata as stored: a JSON document or a text blob.
    #[serde(
        default,
        alias = "chapter_metadata",
        skip_serializing_if = "Option::is_none"
    )]
    chapters: Option<Value>,
}

impl VideoAsset {
    pub fn new(id: impl Into<String>, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            storage_locator: locator.into(),
            chapters: None,
        }
    }

    pub fn with_chapters(mut self, metadata: impl Into<Value>) -> Self {
        self.chapters = Some(metadata.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn storage_locator(&self) -> &str {
        &self.storage_locator
    }

    pub fn chapter_metadata(&self) -> Option<&Value> {
        self.chapters.as_ref()
    }

    /// Whether the locator can be played as-is.
    pub fn has_absolute_url(&self) -> bool {
        let locator = self.storage_locator.trim_start();
        locator.starts_with("https://") || locator.starts_with("http://")
    }
}

/// A chapter marker inside a video.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Offset from the start of the video, in seconds.
    pub start_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_kinds() {
        assert!(VideoAsset::new("1", "a", "https://cdn.example.com/a.mp4").has_absolute_url());
        assert!(!VideoAsset::new("1", "a", "demo-42/a.mp4").has_absolute_url());
    }

    #[test]
    fn deserializes_console_rows() {
        let asset: VideoAsset = serde_json::from_str(
            r#"{"id":"v1","title":"Pricing Overview","storage_path":"d1/pricing.mp4","chapters":null}"#,
        )
        .unwrap();
        assert_eq!(asset.storage_locator(), "d1/pricing.mp4");
        assert_eq!(asset.chapter_metadata(), None);
    }
}
