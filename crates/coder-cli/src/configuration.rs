use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use coder::agent::AgentConfig;
use coder::providers::configs::{OpenAiProviderConfig, OPENAI_DEFAULT_HOST};
use config::{Config, Environment};
use serde::Deserialize;
use std::env;

/// Read when no `CODER_PROVIDER__API_KEY` is set
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: default_openai_host(),
            api_key: None,
            max_tokens: None,
        }
    }
}

impl ProviderSettings {
    pub fn into_config(self) -> Result<OpenAiProviderConfig, ConfigError> {
        let api_key = self
            .api_key
            .or_else(|| env::var(OPENAI_API_KEY_VAR).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            })?;

        Ok(OpenAiProviderConfig::new(self.host, api_key).with_max_tokens(self.max_tokens))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("provider.host", default_openai_host())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            ConfigError::Other(err)
        })
    }
}

fn default_openai_host() -> String {
    OPENAI_DEFAULT_HOST.to_string()
}
