//! API key resolution chain: env var -> macOS keychain -> config value
//! (spec §4.7, §6). Modeled as a small trait tried in priority order,
//! grounded in spirit on a credential-pool's "try sources in priority
//! order" structure but simplified to one key per provider.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use ccr_common::ConfigError;

use crate::config::ProviderConfig;

#[async_trait]
pub trait ApiKeySource: Send + Sync {
    async fn resolve(&self, provider: &ProviderConfig) -> Option<String>;
}

pub struct EnvApiKeySource;

#[async_trait]
impl ApiKeySource for EnvApiKeySource {
    async fn resolve(&self, provider: &ProviderConfig) -> Option<String> {
        let env_var = env_var_name(provider);
        std::env::var(&env_var).ok().filter(|value| is_usable(value))
    }
}

pub struct ConfigApiKeySource;

#[async_trait]
impl ApiKeySource for ConfigApiKeySource {
    async fn resolve(&self, provider: &ProviderConfig) -> Option<String> {
        provider.api_key.clone().filter(|value| is_usable(value))
    }
}

#[cfg(target_os = "macos")]
pub struct MacosKeychainApiKeySource;

#[cfg(target_os = "macos")]
#[async_trait]
impl ApiKeySource for MacosKeychainApiKeySource {
    async fn resolve(&self, provider: &ProviderConfig) -> Option<String> {
        read_macos_keychain(&keychain_account(provider))
            .await
            .filter(|value| is_usable(value))
    }
}

/// Resolves one provider's API key by trying each source in priority
/// order, env first.
pub async fn resolve_api_key(provider: &ProviderConfig) -> Result<String, ConfigError> {
    if let Some(value) = EnvApiKeySource.resolve(provider).await {
        return Ok(value);
    }

    #[cfg(target_os = "macos")]
    if let Some(value) = MacosKeychainApiKeySource.resolve(provider).await {
        return Ok(value);
    }

    if let Some(value) = ConfigApiKeySource.resolve(provider).await {
        return Ok(value);
    }

    Err(ConfigError::MissingApiKey {
        provider: provider.name.clone(),
        env_var: env_var_name(provider),
        keychain_account: keychain_account(provider),
    })
}

fn env_var_name(provider: &ProviderConfig) -> String {
    provider
        .api_key_env
        .clone()
        .unwrap_or_else(|| format!("{}_API_KEY", provider.name.to_uppercase()))
}

fn keychain_account(provider: &ProviderConfig) -> String {
    format!("{}-api-key", provider.name)
}

/// A placeholder is unusable: empty, the literal `"FROM_KEYCHAIN"` sentinel
/// (meant to be resolved by a layer that never ran), or a `"YOUR_"`-prefixed
/// template value left over from an example config.
fn is_usable(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "FROM_KEYCHAIN" && !trimmed.starts_with("YOUR_")
}

/// Process-wide, write-once-per-account cache of keychain lookups (spec
/// §5 "Shared resource policy").
#[cfg(target_os = "macos")]
fn keychain_cache() -> &'static Mutex<HashMap<String, Option<String>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<String>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(target_os = "macos")]
async fn read_macos_keychain(account: &str) -> Option<String> {
    if let Some(cached) = keychain_cache().lock().unwrap().get(account) {
        return cached.clone();
    }

    let output = tokio::process::Command::new("/usr/bin/security")
        .args(["find-generic-password", "-s", "claude-code-router", "-a", account, "-w"])
        .output()
        .await
        .ok();

    let value = output
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string());

    keychain_cache()
        .lock()
        .unwrap()
        .insert(account.to_string(), value.clone());
    value
}
