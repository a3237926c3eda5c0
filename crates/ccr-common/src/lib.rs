mod headers;

pub use headers::{header_get, Headers};

/// Errors raised while resolving a provider API key (§4.7, §7 ConfigError).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "no usable API key for provider '{provider}': set ${env_var} or run `security add-generic-password -s claude-code-router -a {keychain_account} -w <key>`"
    )]
    MissingApiKey {
        provider: String,
        env_var: String,
        keychain_account: String,
    },
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}
