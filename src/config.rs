use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub line: LineConfig,
    pub openai: OpenAiConfig,
    #[serde(default = "default_store_config")]
    pub store: StoreConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
}

/// LINE Messaging API credentials and hosts. The reply endpoint and the
/// attachment content endpoint live on different hosts.
#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    pub channel_access_token: String,
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_line_content_base_url")]
    pub content_base_url: String,
    #[serde(default = "default_line_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_line_content_base_url() -> String {
    "https://api-data.line.me".to_string()
}

fn default_line_timeout_secs() -> u64 {
    15
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_openai_timeout_secs() -> u64 {
    60
}

fn default_db_path() -> PathBuf {
    PathBuf::from("runlog.db")
}

fn default_port() -> u16 {
    3000
}

fn default_store_config() -> StoreConfig {
    StoreConfig {
        database_path: default_db_path(),
    }
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        port: default_port(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
