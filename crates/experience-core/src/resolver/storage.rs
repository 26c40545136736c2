use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};

/// Exchanges a storage path for a time-limited playback URL.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignedUrlProvider: Send + Sync {
    async fn signed_url(&self, locator: &str, ttl_secs: u64) -> Result<String>;
}

#[derive(Debug, serde::Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Supabase Storage object signing.
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: SecretString,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_key: SecretString, bucket: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            bucket: bucket.to_string(),
        }
    }

    /// Locators may include the bucket name as their first segment.
    fn object_path<'a>(&self, locator: &'a str) -> &'a str {
        let locator = locator.trim().trim_start_matches('/');
        locator
            .strip_prefix(self.bucket.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(locator)
    }

    /// The API answers with a path relative to `/storage/v1`.
    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!(
                "{}/storage/v1/{}",
                self.base_url,
                signed.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl SignedUrlProvider for SupabaseStorage {
    async fn signed_url(&self, locator: &str, ttl_secs: u64) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            self.object_path(locator)
        );
        let key = self.service_key.expose_secret();

        let response = self
            .client
            .post(&url)
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .context("Failed to reach storage")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Signing {locator} failed: {status} - {body}");
        }

        let signed: SignResponse = response
            .json()
            .await
            .context("Failed to decode signed URL response")?;
        Ok(self.absolute(&signed.signed_url))
    }
}
