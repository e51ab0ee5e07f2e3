//! Configuration parsing and validation.
//!
//! linkrag reads a TOML file (default `./config/linkrag.toml`). Every section
//! is optional; a missing file means [`Config::minimal`].
//!
//! ```toml
//! [context]
//! max_chars = 12000
//! recent_history_limit = 12
//!
//! [chat]
//! provider = "openai"
//! model = "gpt-4.1-mini"
//! temperature = 0.2
//! max_tokens = 1000
//! timeout_secs = 60
//!
//! [providers.openai]
//! api_key_env = "OPENAI_API_KEY"
//!
//! [sessions]
//! dir = "./.linkrag/sessions"
//! limit = 24
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [share]
//! base_url = "https://rag.example.com/"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::providers::ProviderName;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_recent_history_limit")]
    pub recent_history_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            recent_history_limit: default_recent_history_limit(),
        }
    }
}

fn default_max_chars() -> usize {
    linkrag_core::context::MAX_CONTEXT_CHARS
}
fn default_recent_history_limit() -> usize {
    linkrag_core::prompt::RECENT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderName,
    /// Falls back to the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ChatConfig {
    /// The configured model, or the provider default.
    pub fn model_for(&self, provider: ProviderName) -> String {
        match &self.model {
            Some(model) if provider == self.provider && !model.trim().is_empty() => {
                model.trim().to_string()
            }
            _ => provider.default_model().to_string(),
        }
    }
}

fn default_provider() -> ProviderName {
    ProviderName::OpenAi
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}

/// Credentials and endpoint overrides for one provider.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key. Defaults to the provider's
    /// conventional variable (e.g. `OPENAI_API_KEY`).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, name: ProviderName) -> &ProviderConfig {
        match name {
            ProviderName::OpenAi => &self.openai,
            ProviderName::Anthropic => &self.anthropic,
            ProviderName::Gemini => &self.gemini,
        }
    }

    fn get_mut(&mut self, name: ProviderName) -> &mut ProviderConfig {
        match name {
            ProviderName::OpenAi => &mut self.openai,
            ProviderName::Anthropic => &mut self.anthropic,
            ProviderName::Gemini => &mut self.gemini,
        }
    }

    /// Fill in `api_key` from the environment wherever it is not set
    /// explicitly.
    fn resolve_credentials(&mut self) {
        for name in ProviderName::ALL {
            let provider = self.get_mut(name);
            let explicit = provider
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .is_some();
            if explicit {
                continue;
            }
            let var = provider
                .api_key_env
                .clone()
                .unwrap_or_else(|| name.default_api_key_env().to_string());
            provider.api_key = std::env::var(&var)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty());
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_sessions_limit")]
    pub limit: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
            limit: default_sessions_limit(),
        }
    }
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("./.linkrag/sessions")
}
fn default_sessions_limit() -> usize {
    24
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ShareConfig {
    /// Prefixed to `#r=<token>` when printing share links.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    /// All defaults, credentials taken from the environment.
    pub fn minimal() -> Self {
        let mut config = Config::default();
        config.providers.resolve_credentials();
        config
    }
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    config.providers.resolve_credentials();

    Ok(config)
}

/// [`load_config`] when `path` exists, [`Config::minimal`] otherwise.
pub fn load_config_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.context.max_chars == 0 {
        bail!("context.max_chars must be >= 1");
    }
    if config.context.recent_history_limit == 0 {
        bail!("context.recent_history_limit must be >= 1");
    }
    if config.sessions.limit == 0 {
        bail!("sessions.limit must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 2.0]");
    }
    if config.chat.max_tokens == 0 {
        bail!("chat.max_tokens must be >= 1");
    }
    if config.chat.timeout_secs == 0 {
        bail!("chat.timeout_secs must be >= 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("linkrag.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let (_tmp, path) = write_config("");
        let config = load_config(&path).unwrap();
        assert_eq!(config.context.max_chars, 12_000);
        assert_eq!(config.context.recent_history_limit, 12);
        assert_eq!(config.chat.provider, ProviderName::OpenAi);
        assert_eq!(config.sessions.limit, 24);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert!(config.share.base_url.is_none());
    }

    #[test]
    fn test_full_config() {
        let (_tmp, path) = write_config(
            r#"
[context]
max_chars = 4000
recent_history_limit = 6

[chat]
provider = "anthropic"
model = "claude-3-5-haiku-latest"
temperature = 0.7

[providers.anthropic]
api_key = "sk-test"
base_url = "http://127.0.0.1:9999"

[sessions]
dir = "/tmp/linkrag-sessions"
limit = 5

[share]
base_url = "https://rag.example.com/"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.context.max_chars, 4000);
        assert_eq!(config.chat.provider, ProviderName::Anthropic);
        assert_eq!(
            config.chat.model_for(ProviderName::Anthropic),
            "claude-3-5-haiku-latest"
        );
        assert_eq!(config.chat.model_for(ProviderName::Gemini), "gemini-2.0-flash");
        assert_eq!(
            config.providers.anthropic.api_key.as_deref(),
            Some("sk-test")
        );
        assert_eq!(config.sessions.limit, 5);
        assert_eq!(
            config.share.base_url.as_deref(),
            Some("https://rag.example.com/")
        );
    }

    #[test]
    fn test_api_key_env_resolved() {
        std::env::set_var("LINKRAG_TEST_GEMINI_KEY", "  g-key  ");
        let (_tmp, path) = write_config(
            r#"
[providers.gemini]
api_key_env = "LINKRAG_TEST_GEMINI_KEY"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let (_tmp, path) = write_config("[chat]\nprovider = \"mistral\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        for body in [
            "[context]\nmax_chars = 0\n",
            "[context]\nrecent_history_limit = 0\n",
            "[sessions]\nlimit = 0\n",
            "[chat]\ntemperature = 3.5\n",
        ] {
            let (_tmp, path) = write_config(body);
            assert!(load_config(&path).is_err(), "accepted: {}", body);
        }
    }

    #[test]
    fn test_missing_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_or_minimal(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.context.max_chars, 12_000);
        assert!(load_config(&tmp.path().join("absent.toml")).is_err());
    }
}
