use crate::analyzer::RetryPolicy;
use crate::error::{GemAiError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// APIキーの環境変数名
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// .env テンプレートの未設定値
const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// レート制限時の最大試行回数（初回を含む）
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".into(),
            api_base_url: "https://api.openai.com/v1".into(),
            max_tokens: 1500,
            timeout_seconds: 120,
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

// APIキーをログに出さない
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| GemAiError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("gem-ai").join("config.json"))
    }

    /// APIキーを取得（環境変数を優先）
    pub fn get_api_key(&self) -> Result<String> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        Self::resolve_api_key(from_env.as_deref(), self.api_key.as_deref())
    }

    fn resolve_api_key(from_env: Option<&str>, from_file: Option<&str>) -> Result<String> {
        [from_env, from_file]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
            .map(str::to_string)
            .ok_or(GemAiError::MissingApiKey)
    }

    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_ok()
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}
