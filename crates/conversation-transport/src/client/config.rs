use crate::client::consts;
use secrecy::SecretString;

pub struct Config {
    base_url: String,
    api_key: SecretString,
    conversation_id: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: &str) -> Self {
        self.config.conversation_id = conversation_id.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Reads the relay URL and key from the environment; both may be
    /// overridden through the builder.
    pub fn new() -> Self {
        Self {
            base_url: std::env::var(consts::TRANSPORT_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            api_key: std::env::var(consts::TRANSPORT_API_KEY)
                .unwrap_or_default()
                .into(),
            conversation_id: String::new(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
