//! Wiring between the environment and the session core.

pub mod config;
pub mod transport_adapter;

use crate::config::Config;
use anyhow::{Context, Result};
use experience_core::Command;
use experience_core::config::SessionConfig;
use experience_core::forwarder::{OutboundForwarder, WebhookClient};
use experience_core::resolver::{
    AssetCatalog, HttpSemanticSearch, InMemoryCatalog, RestCatalog, SupabaseStorage,
    VideoResolver,
};
use experience_core::session;
use experience_core::source::{EventSource, pump};
use std::sync::Arc;

/// Builds the session settings, letting explicit ids override the configured ones.
pub fn session_config(
    config: &Config,
    conversation_id: Option<&str>,
    demo_id: Option<&str>,
) -> Result<SessionConfig> {
    let conversation_id = conversation_id
        .or(config.conversation_id.as_deref())
        .unwrap_or_default();
    let demo_id = demo_id.or(config.demo_id.as_deref()).unwrap_or_default();

    SessionConfig::builder()
        .with_conversation_id(conversation_id)
        .with_demo_id(demo_id)
        .build()
        .context("Invalid session configuration")
}

/// The catalog comes from Supabase when configured, otherwise from `CATALOG_FILE`.
/// Storage signing is only available with Supabase.
pub fn build_resolver(config: &Config, signed_url_ttl_secs: u64) -> Result<VideoResolver> {
    let mut resolver = match (&config.supabase, &config.catalog_file) {
        (Some(supabase), _) => {
            tracing::info!(table = %supabase.video_table, "Using Supabase video catalog");
            let catalog: Arc<dyn AssetCatalog> = Arc::new(RestCatalog::new(
                &supabase.url,
                supabase.service_key.clone(),
                &supabase.video_table,
            ));
            let storage = SupabaseStorage::new(
                &supabase.url,
                supabase.service_key.clone(),
                &supabase.video_bucket,
            );
            VideoResolver::new(catalog, signed_url_ttl_secs).with_storage(Arc::new(storage))
        }
        (None, Some(path)) => {
            let catalog = InMemoryCatalog::from_json_file(path)?;
            tracing::info!("Using video catalog from {}", path.display());
            VideoResolver::new(Arc::new(catalog), signed_url_ttl_secs)
        }
        (None, None) => anyhow::bail!("No video catalog configured: set SUPABASE_URL or CATALOG_FILE"),
    };

    if let Some(url) = &config.search_url {
        tracing::info!("Semantic search enabled");
        resolver = resolver.with_search(Arc::new(HttpSemanticSearch::new(
            url,
            config.search_api_key.clone(),
        )));
    }
    Ok(resolver)
}

pub fn build_forwarder(config: &Config) -> OutboundForwarder {
    match &config.webhook_url {
        Some(url) => OutboundForwarder::new(Arc::new(WebhookClient::new(
            url,
            config.webhook_token.clone(),
        ))),
        None => {
            tracing::info!("No WEBHOOK_URL set, analytics events will be dropped");
            OutboundForwarder::disabled()
        }
    }
}

/// Runs one session over `source`, handing every command to `on_command`.
///
/// Returns once the source is exhausted (or the session ends) and every
/// command the session produced has been handed over.
pub async fn run_session<S, F>(
    source: &mut S,
    session_config: SessionConfig,
    resolver: Arc<VideoResolver>,
    forwarder: OutboundForwarder,
    mut on_command: F,
) -> Result<usize>
where
    S: EventSource + ?Sized,
    F: FnMut(&Command) + Send + 'static,
{
    tracing::info!(
        conversation_id = session_config.conversation_id(),
        demo_id = session_config.demo_id(),
        "Starting session"
    );
    let (handle, mut commands) = session::spawn(session_config, resolver, forwarder);

    let printer = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            on_command(&command);
        }
    });

    let pumped = pump(source, &handle).await;
    // Already ended on shutdown; the error only means there is nothing left to leave.
    let _ = handle.leave().await;
    printer.await.context("Command printer panicked")?;

    let delivered = pumped?;
    tracing::info!(delivered, "Session finished");
    Ok(delivered)
}
