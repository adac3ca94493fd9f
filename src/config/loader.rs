//! TOML configuration loading, env-var overrides, and atomic saves.
//!
//! # Loading order
//! 1. Parse `~/.turnforge/config.toml` (or the path in `TURNFORGE_CONFIG`)
//! 2. Apply `TURNFORGE_*` environment variable overrides
//! 3. Fall back to [`AppConfig::default()`] if the file is missing
//!
//! # Atomic save
//! Writes to `<path>.toml.tmp`, backs up the existing file to
//! `<path>.toml.bak`, then renames the temp file into place.

use std::{env, fs, path::{Path, PathBuf}};

use super::schema::AppConfig;

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::home_dir().map(|h| h.join(".turnforge").join("config.toml")).ok_or_else(|| "could not determine home directory".to_string())
}

pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content).map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_default_config() -> AppConfig {
    let path = env::var("TURNFORGE_CONFIG").map(PathBuf::from).unwrap_or_else(|_| default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml")));
    load_config(&path).unwrap_or_default()
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = env::var("TURNFORGE_PROVIDER_ID") {
        config.provider.default_id = v;
    }
    if let Ok(v) = env::var("TURNFORGE_PROVIDER_MODEL") {
        config.provider.default_model = v;
    }
    if let Ok(v) = env::var("TURNFORGE_SECURITY_LEVEL") {
        config.security.autonomy_level = v;
    }
    if let Ok(v) = env::var("TURNFORGE_MAX_CONTEXT_TOKENS") {
        if let Ok(tokens) = v.parse::<u32>() {
            config.tokens.max_context_tokens = tokens;
        }
    }
    if let Ok(v) = env::var("TURNFORGE_MAX_TOKENS_PER_CHUNK") {
        if let Ok(tokens) = v.parse::<u32>() {
            config.tokens.max_tokens_per_chunk = tokens;
        }
    }
    if let Ok(v) = env::var("TURNFORGE_APPROVAL_TIER") {
        config.approval.tier = v;
    }
    if let Ok(v) = env::var("TURNFORGE_APPROVAL_TIMEOUT_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            config.approval.default_timeout_ms = ms;
        }
    }
    if let Ok(v) = env::var("TURNFORGE_MAX_CONCURRENT_AGENTS") {
        if let Ok(n) = v.parse::<usize>() {
            config.scheduler.max_concurrent_agents = n;
        }
    }
    if let Ok(v) = env::var("TURNFORGE_AUDIT_MAX_ENTRIES") {
        if let Ok(n) = v.parse::<usize>() {
            config.audit.max_entries = n;
        }
    }
}

/// Atomically save `config` to `path`: write `<path>.toml.tmp`, back up
/// the existing file to `<path>.toml.bak`, then rename into place.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = toml::to_string_pretty(config).map_err(|e| format!("failed to serialise config: {e}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("failed to create config dir: {e}"))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &content).map_err(|e| format!("failed to write temp config: {e}"))?;

    if path.exists() {
        let bak_path = path.with_extension("toml.bak");
        fs::copy(path, &bak_path).map_err(|e| format!("failed to backup config: {e}"))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| format!("failed to replace config file: {e}"))?;
    Ok(())
}

#[cfg(test)]
#[allow(unsafe_code)] // env::set_var/remove_var are unsafe in Rust 2024; tests run single-threaded here.
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[provider]\ndefault_model = \"claude-sonnet-4.5\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.provider.default_model, "claude-sonnet-4.5");
        assert_eq!(config.tokens.max_context_tokens, 100_000);
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[provider]\ndefault_model = \"gpt-4o\"\n").unwrap();

        unsafe {
            env::set_var("TURNFORGE_PROVIDER_MODEL", "claude-haiku");
        }
        let config = load_config(&path).unwrap();
        unsafe {
            env::remove_var("TURNFORGE_PROVIDER_MODEL");
        }
        assert_eq!(config.provider.default_model, "claude-haiku");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.scheduler.max_concurrent_agents = 7;
        save_config(&path, &config).unwrap();
        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.scheduler.max_concurrent_agents, 7);
    }

    #[test]
    fn save_backs_up_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        save_config(&path, &AppConfig::default()).unwrap();
        let mut updated = AppConfig::default();
        updated.scheduler.max_concurrent_agents = 9;
        save_config(&path, &updated).unwrap();
        assert!(path.with_extension("toml.bak").exists());
    }
}
