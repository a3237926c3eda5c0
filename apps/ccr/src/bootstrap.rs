use std::path::{Path, PathBuf};

use anyhow::Context;
use ccr_core::{patch_from_env, patch_from_file, RouterConfig, RouterConfigPatch};

use crate::cli::ServeArgs;

/// Loads the config file (if present), overlays environment overrides,
/// then CLI flags, then finalizes into a `RouterConfig` (spec §4.1
/// ambient config: CLI > ENV > file).
pub fn load_config(args: &ServeArgs) -> anyhow::Result<RouterConfig> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);

    let mut merged = if config_path.exists() {
        patch_from_file(&config_path)
            .with_context(|| format!("loading config file {}", config_path.display()))?
    } else {
        RouterConfigPatch::default()
    };

    merged.overlay(patch_from_env());

    let cli_patch = RouterConfigPatch {
        host: args.host.clone(),
        port: args.port,
        shared_secret: None,
        providers: None,
        router: None,
    };
    merged.overlay(cli_patch);

    merged.into_config().context("finalizing router config")
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".claude-code-router").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_lives_under_home_dot_claude_code_router() {
        std::env::set_var("HOME", "/home/example");
        let path = default_config_path();
        assert_eq!(path, PathBuf::from("/home/example/.claude-code-router/config.json"));
    }
}
