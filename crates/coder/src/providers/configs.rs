pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";

/// Connection settings for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    /// Base URL without the `/v1/chat/completions` suffix
    pub host: String,
    pub api_key: String,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<i32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
