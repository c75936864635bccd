//! Configuration (layered: defaults < config file < environment).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::provider::Backend;
use crate::types::GenerationSettings;
use crate::util::retry::RetryPolicy;

/// Everything needed to build a session against one backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub backend: Backend,
    pub model: String,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub generation: GenerationSettings,
    /// Tool rounds per `send` before a final no-tools request. 0 = unbounded.
    pub max_turns: u32,
    pub retry: RetryConfig,
    pub tools: ToolConfig,
    pub compaction: CompactionConfig,
    /// Bound of the session's input and event channels.
    pub channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Ollama,
            model: "llama3.1".to_string(),
            base_url: None,
            api_key: None,
            system_prompt: None,
            generation: GenerationSettings::default(),
            max_turns: 0,
            retry: RetryConfig::default(),
            tools: ToolConfig::default(),
            compaction: CompactionConfig::default(),
            channel_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub retry_bad_request: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            retry_bad_request: false,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
        .with_retry_bad_request(self.retry_bad_request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    pub timeout_secs: u64,
    /// Calls of one round run at most this many at a time.
    pub concurrency: usize,
    /// Word limit requested when summarizing tool output.
    pub summary_words: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            concurrency: 1,
            summary_words: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompactionConfig {
    /// Transcript token budget. 0 falls back to `generation.context_window`.
    pub budget_tokens: u32,
    /// Count the system message against the budget.
    pub include_system: bool,
    pub summary_words: u32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            budget_tokens: 0,
            include_system: true,
            summary_words: 5000,
        }
    }
}

impl ChatConfig {
    pub fn new(backend: Backend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ChatError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with the environment (and a `.env` file if present).
    pub fn from_env() -> Result<Self, ChatError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// The config file at [`default_path`](Self::default_path) if it exists,
    /// then the environment on top.
    pub fn load() -> Result<Self, ChatError> {
        let _ = dotenvy::dotenv();
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `~/.toolchat/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".toolchat").join("config.toml"))
    }

    /// Overlay values read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("TOOLCHAT_BACKEND") {
            self.backend = Backend::from_str(backend.trim())
                .map_err(|_| ChatError::Configuration(format!("Unknown backend: {backend}")))?;
        }
        if let Some(model) = get("TOOLCHAT_MODEL") {
            self.model = model;
        }
        if let Some(prompt) = get("TOOLCHAT_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        if let Some(turns) = get("TOOLCHAT_MAX_TURNS") {
            self.max_turns = turns.trim().parse().map_err(|_| {
                ChatError::Configuration(format!("TOOLCHAT_MAX_TURNS is not a number: {turns}"))
            })?;
        }

        let backend_url = match self.backend {
            Backend::OpenAi => get("OPENAI_BASE_URL"),
            Backend::Ollama => get("OLLAMA_BASE_URL"),
            _ => None,
        };
        if let Some(url) = get("TOOLCHAT_BASE_URL").or(backend_url) {
            self.base_url = Some(url);
        }

        let key = match self.backend {
            Backend::OpenAi => get("OPENAI_API_KEY"),
            Backend::Gemini => get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            Backend::Anthropic => get("ANTHROPIC_API_KEY"),
            Backend::Ollama => None,
        };
        if key.is_some() {
            self.api_key = key;
        }
        Ok(())
    }

    /// Token budget that triggers compaction. 0 disables it.
    pub fn context_budget_tokens(&self) -> u32 {
        if self.compaction.budget_tokens > 0 {
            self.compaction.budget_tokens
        } else {
            self.generation.context_window.unwrap_or(0)
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }
}
