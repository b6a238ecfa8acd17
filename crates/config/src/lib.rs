//! Configuration loading, validation, and management for Game Wizard.
//!
//! Loads configuration from `~/.gamewizard/config.toml` (or an explicit
//! path), merges an optional `credentials.json`, then applies environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound of the retrieval depth control.
pub const MAX_RETRIEVAL_DEPTH: usize = 20;

/// Used when no system prompt file can be found.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Game Wizard, an expert guide to video games. \
Answer the question using the provided context and chat history. \
If the context does not contain the answer, say that you do not know.";

/// The root configuration structure.
///
/// Maps directly to `~/.gamewizard/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection to the Snowflake account hosting search and completion
    #[serde(default)]
    pub backend: BackendConfig,

    /// Knowledge retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Completion settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// System instructions
    #[serde(default)]
    pub prompt: PromptConfig,

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
pub struct BackendConfig {
    /// Account identifier (e.g. "myorg-myaccount")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Full account URL; derived from `account` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_url: Option<String>,

    /// Bearer token for the SQL API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// `PROGRAMMATIC_ACCESS_TOKEN`, `KEYPAIR_JWT` or `OAUTH`
    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// JSON credentials file merged on load (fields left unset here are filled from it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,

    /// HTTP timeout for a single request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Server-side statement timeout
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,

    /// How many times to poll a statement that is still running
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_token_type() -> String {
    "PROGRAMMATIC_ACCESS_TOKEN".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_statement_timeout() -> u64 {
    60
}
fn default_max_poll_attempts() -> u32 {
    20
}
fn default_poll_interval_ms() -> u64 {
    500
}

const TOKEN_TYPES: &[&str] = &["PROGRAMMATIC_ACCESS_TOKEN", "KEYPAIR_JWT", "OAUTH"];

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            account: None,
            account_url: None,
            token: None,
            token_type: default_token_type(),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            credentials_file: None,
            request_timeout_secs: default_request_timeout(),
            statement_timeout_secs: default_statement_timeout(),
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("account", &self.account)
            .field("account_url", &self.account_url)
            .field("token", &redact(&self.token))
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("credentials_file", &self.credentials_file)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

impl BackendConfig {
    /// The account's base URL, if enough is configured to build one.
    pub fn base_url(&self) -> Option<String> {
        if let Some(url) = &self.account_url {
            return Some(url.trim_end_matches('/').to_string());
        }
        self.account
            .as_ref()
            .map(|account| format!("https://{account}.snowflakecomputing.com"))
    }

    /// Whether a token and an account are both available.
    pub fn has_credentials(&self) -> bool {
        self.token.is_some() && self.base_url().is_some()
    }

    /// Fill unset connection fields from a credentials file.
    fn merge_credentials(&mut self, creds: Credentials) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.account, creds.account);
        fill(&mut self.account_url, creds.account_url);
        fill(&mut self.token, creds.token);
        fill(&mut self.warehouse, creds.warehouse);
        fill(&mut self.database, creds.database);
        fill(&mut self.schema, creds.schema);
        fill(&mut self.role, creds.role);
        if let Some(token_type) = creds.token_type {
            self.token_type = token_type;
        }
        if creds.password.is_some() && self.token.is_none() {
            tracing::warn!(
                "credentials file contains a password; the SQL API needs a token, set `token` instead"
            );
        }
    }
}

/// Connection credentials as stored in `credentials.json`.
///
/// Unknown keys (user, authenticator, ...) are ignored.
#[derive(Default, Deserialize)]
struct Credentials {
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    account_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    warehouse: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Knowledge store: "cortex" or "file"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    /// Fully qualified chunk table (must have `chunk`, `chunk_vec`, `relative_path`)
    #[serde(default = "default_table")]
    pub table: String,

    /// Cortex embedding model used for the query vector
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chunks retrieved when the caller does not choose
    #[serde(default = "default_depth")]
    pub default_depth: usize,

    /// Leave the lowest-ranked retrieved chunk out of the prompt context
    #[serde(default = "default_true")]
    pub drop_lowest_ranked: bool,

    /// JSON file of chunks for the "file" backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_file: Option<String>,
}

fn default_retrieval_backend() -> String {
    "cortex".into()
}
fn default_table() -> String {
    "GAME_RAG.DATA.DOCS_CHUNKS_TABLE".into()
}
fn default_embedding_model() -> String {
    "e5-base-v2".into()
}
fn default_depth() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            table: default_table(),
            embedding_model: default_embedding_model(),
            default_depth: default_depth(),
            drop_lowest_ranked: true,
            knowledge_file: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Completion backend: "cortex" or "openai"
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    /// Base URL for the "openai" provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key for the "openai" provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Models offered to the user
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Model preselected in the UI and used by the CLI
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for the "openai" provider
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP timeout for one "openai" completion request
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_completion_provider() -> String {
    "cortex".into()
}
fn default_models() -> Vec<String> {
    vec![default_model()]
}
fn default_model() -> String {
    "mistral-7b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_completion_timeout() -> u64 {
    120
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_url: None,
            api_key: None,
            models: default_models(),
            default_model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("models", &self.models)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Turns retained per session
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Turns replayed into each prompt; follows the retrieval depth when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_depth: Option<usize>,
}

fn default_capacity() -> usize {
    gamewizard_core::DEFAULT_HISTORY_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            prompt_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// File holding the system instructions
    #[serde(default = "default_prompt_file")]
    pub system_prompt_file: String,

    /// Inline instructions (skips file loading)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_prompt_file() -> String {
    "prompt.txt".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt_file: default_prompt_file(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Live sessions kept before the least recently used one is dropped
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.gamewizard/config.toml).
    ///
    /// Environment variables override the file:
    /// - `GAMEWIZARD_SNOWFLAKE_ACCOUNT`, `GAMEWIZARD_SNOWFLAKE_TOKEN`
    /// - `GAMEWIZARD_MODEL`
    /// - `GAMEWIZARD_API_KEY`, then `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply credentials file and process environment.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.resolve_paths(path.parent())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.resolve_paths(path.parent())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Resolve file references relative to the config file's directory.
    fn resolve_paths(&mut self, base: Option<&Path>) -> Result<(), ConfigError> {
        if let Some(file) = &self.retrieval.knowledge_file {
            let resolved = resolve_relative(file, base);
            self.retrieval.knowledge_file = Some(resolved.to_string_lossy().into_owned());
        }
        self.resolve_credentials(base)
    }

    /// Merge `backend.credentials_file`, resolving relative paths against `base`.
    fn resolve_credentials(&mut self, base: Option<&Path>) -> Result<(), ConfigError> {
        let Some(file) = self.backend.credentials_file.clone() else {
            return Ok(());
        };
        let path = resolve_relative(&file, base);

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let creds: Credentials =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), "Merged credentials file");
        self.backend.merge_credentials(creds);
        Ok(())
    }

    /// Apply environment overrides through `lookup` (highest priority).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(account) = lookup("GAMEWIZARD_SNOWFLAKE_ACCOUNT") {
            self.backend.account = Some(account);
            self.backend.account_url = None;
        }
        if let Some(token) = lookup("GAMEWIZARD_SNOWFLAKE_TOKEN") {
            self.backend.token = Some(token);
        }
        if let Some(model) = lookup("GAMEWIZARD_MODEL") {
            if !self.completion.models.contains(&model) {
                self.completion.models.push(model.clone());
            }
            self.completion.default_model = model;
        }
        if self.completion.api_key.is_none() {
            self.completion.api_key =
                lookup("GAMEWIZARD_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".gamewizard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let depth = self.retrieval.default_depth;
        if depth == 0 || depth > MAX_RETRIEVAL_DEPTH {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.default_depth must be between 1 and {MAX_RETRIEVAL_DEPTH}"
            )));
        }

        if self.history.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "history.capacity must be at least 1".into(),
            ));
        }

        if !matches!(self.retrieval.backend.as_str(), "cortex" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.backend must be \"cortex\" or \"file\", got \"{}\"",
                self.retrieval.backend
            )));
        }

        if self.retrieval.backend == "file" && self.retrieval.knowledge_file.is_none() {
            return Err(ConfigError::ValidationError(
                "retrieval.knowledge_file is required when retrieval.backend = \"file\"".into(),
            ));
        }

        if !is_valid_table_identifier(&self.retrieval.table) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.table is not a valid identifier: {}",
                self.retrieval.table
            )));
        }

        if !matches!(self.completion.provider.as_str(), "cortex" | "openai") {
            return Err(ConfigError::ValidationError(format!(
                "completion.provider must be \"cortex\" or \"openai\", got \"{}\"",
                self.completion.provider
            )));
        }

        if self.completion.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "completion.models must list at least one model".into(),
            ));
        }

        if !self.completion.models.contains(&self.completion.default_model) {
            return Err(ConfigError::ValidationError(format!(
                "completion.default_model \"{}\" is not in completion.models",
                self.completion.default_model
            )));
        }

        if self.completion.temperature < 0.0 || self.completion.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.completion.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "completion.timeout_secs must be at least 1".into(),
            ));
        }

        if !TOKEN_TYPES.contains(&self.backend.token_type.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "backend.token_type must be one of {}",
                TOKEN_TYPES.join(", ")
            )));
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Read the system instructions.
    ///
    /// An inline override wins. Otherwise the prompt file is looked up as
    /// given, then inside the config directory. When neither exists the
    /// built-in instructions are used.
    pub fn system_prompt(&self) -> Result<String, ConfigError> {
        if let Some(prompt) = &self.prompt.system_prompt_override {
            return Ok(prompt.clone());
        }

        if let Some(path) = self.system_prompt_path() {
            return std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                path,
                reason: e.to_string(),
            });
        }

        tracing::warn!(
            file = %self.prompt.system_prompt_file,
            "System prompt file not found, using built-in instructions"
        );
        Ok(DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// The prompt file that [`system_prompt`](Self::system_prompt) would read, if any.
    pub fn system_prompt_path(&self) -> Option<PathBuf> {
        let candidates = [
            PathBuf::from(&self.prompt.system_prompt_file),
            resolve_relative(&self.prompt.system_prompt_file, Some(&Self::config_dir())),
        ];
        candidates.into_iter().find(|p| p.is_file())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Letters, digits, `_` and `$` per part, up to three dot-separated parts.
fn is_valid_table_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        }
    })
}

fn resolve_relative(file: &str, base: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(file);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
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
}
