use crate::client::config::Config;
use crate::client::consts;
use anyhow::{Result, bail};
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;

/// The upgrade request for one conversation's event stream.
pub(crate) fn build_request(config: &Config) -> Result<Request> {
    if config.base_url().is_empty() {
        bail!("transport URL is not configured");
    }
    if config.conversation_id().is_empty() {
        bail!("conversation id is not configured");
    }

    let separator = if config.base_url().contains('?') { '&' } else { '?' };
    let url = format!(
        "{}{}{}={}",
        config.base_url(),
        separator,
        consts::CONVERSATION_QUERY_PARAM,
        config.conversation_id()
    );
    let mut request = url.into_client_request()?;

    let key = config.api_key().expose_secret();
    if !key.is_empty() {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))?;
        request
            .headers_mut()
            .insert(consts::AUTHORIZATION_HEADER, value);
    }
    Ok(request)
}
