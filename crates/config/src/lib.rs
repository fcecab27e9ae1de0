//! Configuration loading, validation, and management for repolens.
//!
//! Loads configuration from `~/.repolens/config.toml` with environment
//! variable overrides. Validates all settings at startup; missing
//! credentials are a startup failure, never a per-request one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.repolens/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// GitHub client settings
    #[serde(default)]
    pub github: GithubConfig,

    /// Reasoning loop limits and context budget
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool output guards
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per completion (also the answer reserve floor)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Personal access token sent as `Authorization: token …`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Per-request timeout
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,

    /// Attempts for transient failures (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Longest rate-limit wait the client will sit through
    #[serde(default = "default_max_rate_limit_wait")]
    pub max_rate_limit_wait_secs: u64,

    /// How many times a rate-limited call is retried after waiting
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_github_timeout() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_max_rate_limit_wait() -> u64 {
    60
}
fn default_rate_limit_retries() -> u32 {
    1
}
fn default_user_agent() -> String {
    concat!("repolens/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            timeout_secs: default_github_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait(),
            rate_limit_retries: default_rate_limit_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &redact(&self.token))
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_ms", &self.retry_base_ms)
            .field("max_rate_limit_wait_secs", &self.max_rate_limit_wait_secs)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on scratchpad records per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Corrective iterations allowed before giving up
    #[serde(default = "default_max_corrections")]
    pub max_corrections: usize,

    /// Wall-clock budget for one request
    #[serde(default = "default_loop_timeout")]
    pub loop_timeout_secs: u64,

    /// Model context window, in estimated tokens
    #[serde(default = "default_context_ceiling")]
    pub context_ceiling_tokens: usize,

    /// Tokens kept free for the model's reply
    #[serde(default = "default_answer_reserve")]
    pub answer_reserve_tokens: usize,

    /// History turns that survive the first truncation pass
    #[serde(default = "default_recent_turns")]
    pub recent_turns_kept: usize,

    /// Ask for a tool-less summary when the loop stops without an answer
    #[serde(default = "default_true")]
    pub synthesize_on_exhaustion: bool,
}

fn default_max_iterations() -> usize {
    12
}
fn default_max_corrections() -> usize {
    3
}
fn default_loop_timeout() -> u64 {
    120
}
fn default_context_ceiling() -> usize {
    16_000
}
fn default_answer_reserve() -> usize {
    2_000
}
fn default_recent_turns() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_corrections: default_max_corrections(),
            loop_timeout_secs: default_loop_timeout(),
            context_ceiling_tokens: default_context_ceiling(),
            answer_reserve_tokens: default_answer_reserve(),
            recent_turns_kept: default_recent_turns(),
            synthesize_on_exhaustion: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Max lines in the root listing
    #[serde(default = "default_root_max_entries")]
    pub root_max_entries: usize,

    /// Root files worth showing next to the top-level directories
    #[serde(default = "default_root_files")]
    pub root_files: Vec<String>,

    /// Node budget for one subdirectory render
    #[serde(default = "default_subdir_max_nodes")]
    pub subdir_max_nodes: usize,

    #[serde(default = "default_subdir_max_depth")]
    pub subdir_max_depth: usize,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    #[serde(default = "default_search_max_pages")]
    pub search_max_pages: u32,

    #[serde(default = "default_file_max_bytes")]
    pub file_max_bytes: usize,

    #[serde(default = "default_file_max_lines")]
    pub file_max_lines: usize,
}

fn default_root_max_entries() -> usize {
    80
}
fn default_root_files() -> Vec<String> {
    [
        "README.md",
        "README",
        "package.json",
        "pnpm-lock.yaml",
        "yarn.lock",
        "Cargo.toml",
        "pyproject.toml",
        "go.mod",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_subdir_max_nodes() -> usize {
    80
}
fn default_subdir_max_depth() -> usize {
    8
}
fn default_search_max_results() -> usize {
    10
}
fn default_search_max_pages() -> u32 {
    1
}
fn default_file_max_bytes() -> usize {
    8_000
}
fn default_file_max_lines() -> usize {
    250
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            root_max_entries: default_root_max_entries(),
            root_files: default_root_files(),
            subdir_max_nodes: default_subdir_max_nodes(),
            subdir_max_depth: default_subdir_max_depth(),
            search_max_results: default_search_max_results(),
            search_max_pages: default_search_max_pages(),
            file_max_bytes: default_file_max_bytes(),
            file_max_lines: default_file_max_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS; empty means no cross-origin access
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_max_body_bytes() -> usize {
    256 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Which credential is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    LlmApiKey,
    GithubToken,
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LlmApiKey => f.write_str("LLM API key (set OPENAI_KEY or [llm].api_key)"),
            Self::GithubToken => {
                f.write_str("GitHub token (set GITHUB_API_KEY or [github].token)")
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, then apply env var overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production; tests pass a map.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_API_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = non_empty("OPENAI_MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(token) = non_empty("GITHUB_API_KEY").or_else(|| non_empty("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(origins) = lookup("ALLOWED_CORS_ORIGINS") {
            self.gateway.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(host) = non_empty("REPOLENS_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("REPOLENS_PORT") {
            match port.trim().parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid REPOLENS_PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".repolens")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if self.agent.answer_reserve_tokens >= self.agent.context_ceiling_tokens {
            return Err(ConfigError::ValidationError(
                "agent.answer_reserve_tokens must be smaller than agent.context_ceiling_tokens"
                    .into(),
            ));
        }

        if self.agent.loop_timeout_secs == 0
            || self.llm.timeout_secs == 0
            || self.github.timeout_secs == 0
        {
            return Err(ConfigError::ValidationError("timeouts must be > 0".into()));
        }

        if self.github.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "github.max_attempts must be > 0".into(),
            ));
        }

        let tools = &self.tools;
        if tools.root_max_entries == 0
            || tools.subdir_max_nodes == 0
            || tools.subdir_max_depth == 0
            || tools.search_max_results == 0
            || tools.search_max_pages == 0
            || tools.file_max_bytes == 0
            || tools.file_max_lines == 0
        {
            return Err(ConfigError::ValidationError(
                "tool limits must all be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Both credentials must be present before the service starts.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_none() {
            return Err(ConfigError::MissingCredential(Credential::LlmApiKey));
        }
        if self.github.token.is_none() {
            return Err(ConfigError::MissingCredential(Credential::GithubToken));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing credential: {0}")]
    MissingCredential(Credential),
}
