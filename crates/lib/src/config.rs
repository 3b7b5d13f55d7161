//! Configuration types and loading.
//!
//! Config is loaded from an optional JSON file (e.g. `~/.recipe-relay/config.json`) and the
//! environment. Environment values always win; the three credentials are required and startup
//! fails fast when any of them is missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config (file form; secrets may be left empty and supplied by env).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE channel credentials and API hosts.
    #[serde(default)]
    pub line: LineConfig,

    /// Generation service (OpenAI-compatible chat completions).
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Chunking, envelope style and delivery strategy.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Bind address and port for the webhook server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port (default 8000). Overridden by PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used to verify X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Long-lived channel access token. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Skip signature verification entirely. Test environments only. Overridden by DISABLE_SIGNATURE_CHECK env.
    #[serde(default)]
    pub disable_signature_check: bool,
    /// Messaging API host (reply, push).
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
    /// Content API host (message content download).
    #[serde(default = "default_line_data_api_base")]
    pub data_api_base: String,
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base() -> String {
    "https://api-data.line.me".to_string()
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            disable_signature_check: false,
            api_base: default_line_api_base(),
            data_api_base: default_line_data_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    /// Base URL including the version segment. Overridden by OPENAI_BASE_URL env.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    /// Model for recipe text.
    #[serde(default = "default_model")]
    pub model: String,
    /// Vision-capable model for ingredient detection from photos.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound for a single generation call. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_generation_base_url(),
            model: default_model(),
            vision_model: default_vision_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

/// How generated text is cut into units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkMode {
    /// Split on the sentence delimiter; best for prose.
    #[default]
    Sentence,
    /// Split on newlines; keeps list formatting intact.
    Line,
}

/// Outbound envelope style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStyle {
    /// One plain text message per unit.
    #[default]
    Text,
    /// Flex carousels of bubbles, one bubble per unit.
    Carousel,
}

/// Delivery strategy for text events. Image events always acknowledge first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyStrategy {
    /// Generate, then spend the reply token on the full batch.
    #[default]
    DirectReply,
    /// Spend the reply token on a short acknowledgement, then push the result.
    Acknowledge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    #[serde(default = "default_max_unit_chars")]
    pub max_unit_chars: usize,
    #[serde(default)]
    pub chunk_mode: ChunkMode,
    #[serde(default = "default_sentence_delimiter")]
    pub sentence_delimiter: String,
    #[serde(default)]
    pub style: MessageStyle,
    #[serde(default)]
    pub text_strategy: ReplyStrategy,
    /// Push the batch item by item when the reply token is rejected.
    #[serde(default = "default_push_fallback")]
    pub push_fallback: bool,
    /// Text sent with the reply token before slow generation starts.
    #[serde(default = "default_acknowledgement")]
    pub acknowledgement: String,
}

fn default_max_unit_chars() -> usize {
    500
}

fn default_sentence_delimiter() -> String {
    "。".to_string()
}

fn default_push_fallback() -> bool {
    true
}

fn default_acknowledgement() -> String {
    "レシピを考え中だよ、ちょっと待っててね💕".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_unit_chars: default_max_unit_chars(),
            chunk_mode: ChunkMode::default(),
            sentence_delimiter: default_sentence_delimiter(),
            style: MessageStyle::default(),
            text_strategy: ReplyStrategy::default(),
            push_fallback: default_push_fallback(),
            acknowledgement: default_acknowledgement(),
        }
    }
}

/// Fully resolved settings: config file merged with env, required secrets present.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub config: Config,
    pub channel_secret: String,
    pub channel_access_token: String,
    pub generation_api_key: String,
}

impl RelaySettings {
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.config.generation.timeout_secs.map(Duration::from_secs)
    }

    pub fn signature_check_disabled(&self) -> bool {
        self.config.line.disable_signature_check
    }
}

/// Every required value that could not be resolved and every value that did not parse.
#[derive(Debug, thiserror::Error)]
#[error("{}", describe_problems(.missing, .invalid))]
pub struct ConfigError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<String>,
}

fn describe_problems(missing: &[&'static str], invalid: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required configuration: {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        parts.push(format!("invalid configuration: {}", invalid.join(", ")));
    }
    parts.join("; ")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Channel secret from `LINE_CHANNEL_SECRET`, else from the file. Blank values count as unset.
pub fn resolve_channel_secret_with<F>(line: &LineConfig, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(env("LINE_CHANNEL_SECRET")).or_else(|| non_empty(line.channel_secret.clone()))
}

/// Merge env into config and check the required credentials. `env` looks up one variable.
pub fn resolve_settings_with<F>(mut config: Config, env: F) -> Result<RelaySettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let channel_secret = resolve_channel_secret_with(&config.line, &env);
    let channel_access_token = non_empty(env("LINE_CHANNEL_ACCESS_TOKEN"))
        .or_else(|| non_empty(config.line.channel_access_token.clone()));
    let generation_api_key = non_empty(env("OPENAI_API_KEY"))
        .or_else(|| non_empty(config.generation.api_key.clone()));

    if let Some(flag) = non_empty(env("DISABLE_SIGNATURE_CHECK")) {
        config.line.disable_signature_check = flag.eq_ignore_ascii_case("true");
    }
    let mut invalid = Vec::new();
    if let Some(port) = non_empty(env("PORT")) {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => invalid.push(format!("PORT={:?} is not a port number", port)),
        }
    }
    if let Some(base) = non_empty(env("OPENAI_BASE_URL")) {
        config.generation.base_url = base;
    }

    let mut missing = Vec::new();
    if channel_secret.is_none() {
        missing.push("LINE_CHANNEL_SECRET");
    }
    if channel_access_token.is_none() {
        missing.push("LINE_CHANNEL_ACCESS_TOKEN");
    }
    if generation_api_key.is_none() {
        missing.push("OPENAI_API_KEY");
    }
    match (channel_secret, channel_access_token, generation_api_key) {
        (Some(channel_secret), Some(channel_access_token), Some(generation_api_key))
            if invalid.is_empty() =>
        {
            Ok(RelaySettings {
                config,
                channel_secret,
                channel_access_token,
                generation_api_key,
            })
        }
        _ => Err(ConfigError { missing, invalid }),
    }
}

/// Resolve settings against the process environment.
pub fn resolve_settings(config: Config) -> Result<RelaySettings, ConfigError> {
    resolve_settings_with(config, |key| std::env::var(key).ok())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RECIPE_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".recipe-relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
