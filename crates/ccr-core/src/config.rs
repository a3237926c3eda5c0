//! Router configuration: providers, routing rules, and the CLI/env/file
//! overlay chain (spec §4.1, §6). Modeled on a layered config-patch that
//! merges CLI flags over environment variables over a JSON file, finally
//! resolving into a fully-populated config or a descriptive error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ccr_common::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTarget {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterRules {
    pub default_provider: String,
    pub default_model: String,
    #[serde(default)]
    pub long_context_threshold: Option<u32>,
    #[serde(default)]
    pub long_context_provider: Option<String>,
    #[serde(default)]
    pub long_context_model: Option<String>,
    #[serde(default)]
    pub command_overrides: HashMap<String, RouteTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub shared_secret: Option<String>,
    pub providers: Vec<ProviderConfig>,
    pub router: RouterRules,
}

impl RouterConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// All-optional overlay of `RouterConfig`, applied in precedence order:
/// CLI flags over environment variables over the JSON config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfigPatch {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub providers: Option<Vec<ProviderConfig>>,
    #[serde(default)]
    pub router: Option<RouterRules>,
}

impl RouterConfigPatch {
    /// Layers `other` on top of `self`; fields present in `other` win.
    pub fn overlay(&mut self, other: RouterConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.shared_secret.is_some() {
            self.shared_secret = other.shared_secret;
        }
        if other.providers.is_some() {
            self.providers = other.providers;
        }
        if other.router.is_some() {
            self.router = other.router;
        }
    }

    pub fn into_config(self) -> Result<RouterConfig, ConfigError> {
        Ok(RouterConfig {
            host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: self.port.unwrap_or(3456),
            shared_secret: self.shared_secret,
            providers: self.providers.ok_or(ConfigError::MissingField("providers"))?,
            router: self.router.ok_or(ConfigError::MissingField("router"))?,
        })
    }
}

impl From<RouterConfig> for RouterConfigPatch {
    fn from(config: RouterConfig) -> Self {
        Self {
            host: Some(config.host),
            port: Some(config.port),
            shared_secret: config.shared_secret,
            providers: Some(config.providers),
            router: Some(config.router),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn patch_from_file(path: &Path) -> Result<RouterConfigPatch, RouterConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RouterConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| RouterConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads `CCR_HOST`/`CCR_PORT`/`CCR_SHARED_SECRET`, treating blank values
/// and unresolved `${VAR}`-shaped placeholders as absent.
pub fn patch_from_env() -> RouterConfigPatch {
    RouterConfigPatch {
        host: sanitize_optional_env_value(std::env::var("CCR_HOST").ok()),
        port: sanitize_optional_env_value(std::env::var("CCR_PORT").ok()).and_then(|v| v.parse().ok()),
        shared_secret: sanitize_optional_env_value(std::env::var("CCR_SHARED_SECRET").ok()),
        providers: None,
        router: None,
    }
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RouterConfig {
        RouterConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shared_secret: Some("s3cret".to_string()),
            providers: vec![ProviderConfig {
                name: "gemini".to_string(),
                kind: ProviderKind::Gemini,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: None,
                api_key: None,
                https_proxy: None,
            }],
            router: RouterRules {
                default_provider: "gemini".to_string(),
                default_model: "gemini-2.5-flash".to_string(),
                long_context_threshold: Some(60_000),
                long_context_provider: Some("gemini".to_string()),
                long_context_model: Some("gemini-2.5-pro".to_string()),
                command_overrides: HashMap::new(),
            },
        }
    }

    #[test]
    fn overlay_prefers_later_patch_fields_and_keeps_earlier_ones() {
        let mut base: RouterConfigPatch = sample_config().into();
        let override_patch = RouterConfigPatch {
            port: Some(9999),
            ..Default::default()
        };
        base.overlay(override_patch);
        assert_eq!(base.port, Some(9999));
        assert_eq!(base.host, Some("0.0.0.0".to_string()));
    }

    #[test]
    fn into_config_defaults_host_and_port_when_absent() {
        let patch = RouterConfigPatch {
            providers: Some(vec![]),
            router: Some(RouterRules {
                default_provider: "gemini".to_string(),
                default_model: "gemini-2.5-flash".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = patch.into_config().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3456);
    }

    #[test]
    fn into_config_errors_when_providers_missing() {
        let patch = RouterConfigPatch {
            router: Some(RouterRules::default()),
            ..Default::default()
        };
        assert!(patch.into_config().is_err());
    }

    #[test]
    fn provider_lookup_finds_by_name() {
        let config = sample_config();
        assert!(config.provider("gemini").is_some());
        assert!(config.provider("missing").is_none());
    }

    #[test]
    fn sanitize_rejects_blank_and_placeholder_values() {
        assert_eq!(sanitize_optional_env_value(Some("".to_string())), None);
        assert_eq!(sanitize_optional_env_value(Some("  ".to_string())), None);
        assert_eq!(sanitize_optional_env_value(Some("${CCR_HOST}".to_string())), None);
        assert_eq!(
            sanitize_optional_env_value(Some("0.0.0.0".to_string())),
            Some("0.0.0.0".to_string())
        );
    }
}
