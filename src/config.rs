use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Upper bound on a single generation call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long in-flight replies may run after shutdown begins.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            api_base_url: default_line_api_base_url(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}

fn default_ollama_model() -> String {
    "hf.co/elyza/Llama-3-ELYZA-JP-8B-GGUF:latest".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    /// A missing file is fine as long as the environment supplies the secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            String::new()
        };

        Self::from_sources(&content, |key| std::env::var(key).ok())
            .with_context(|| format!("Invalid configuration (file: {})", path.display()))
    }

    /// Build a config from TOML text and an environment lookup.
    pub fn from_sources<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config =
            toml::from_str(content).context("Failed to parse config file")?;

        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("LINE_CHANNEL_SECRET") {
            config.line.channel_secret = v;
        }
        if let Some(v) = var("LINE_CHANNEL_ACCESS_TOKEN") {
            config.line.channel_access_token = v;
        }
        if let Some(v) = var("LINE_API_BASE_URL") {
            config.line.api_base_url = v;
        }
        if let Some(v) = var("OLLAMA_URL") {
            config.ollama.url = v;
        }
        if let Some(v) = var("OLLAMA_MODEL") {
            config.ollama.model = v;
        }
        if let Some(v) = var("OLLAMA_TIMEOUT_SECS") {
            config.ollama.timeout_secs = parse_var("OLLAMA_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("HOST") {
            config.server.host = v;
        }
        if let Some(v) = var("PORT") {
            config.server.port = parse_var("PORT", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.line.channel_secret.trim().is_empty() {
            anyhow::bail!("LINE channel secret is not set (LINE_CHANNEL_SECRET or [line] channel_secret)");
        }
        if self.line.channel_access_token.trim().is_empty() {
            anyhow::bail!(
                "LINE channel access token is not set (LINE_CHANNEL_ACCESS_TOKEN or [line] channel_access_token)"
            );
        }
        if self.ollama.timeout_secs == 0 {
            anyhow::bail!("[ollama] timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} has an invalid value: {}", key, value))
}
