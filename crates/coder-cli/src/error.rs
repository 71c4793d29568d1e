use thiserror::Error;

pub const ENV_PREFIX: &str = "CODER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting, set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },
    #[error("Invalid configuration: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings key to the environment variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}
