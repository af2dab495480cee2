//! Agent configuration
//!
//! Layered, later sources win: built-in defaults, the TOML file given with
//! `--config`, `REWRITE_*` environment variables, then command-line flags.

use crate::{logging::LoggingConfig, Args};
use anyhow::{anyhow, Context};
use rewrite_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Address the HTTP command channel listens on
    pub listen_address: String,
    pub listen_port: u16,
    /// SQLite URL of the state database
    pub database_url: String,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 9096,
            database_url: "sqlite:./rewrite.db".to_string(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Resolve the configuration for `args` against the process environment
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        Self::load_with_env(args, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration with a custom environment lookup
    pub fn load_with_env<F>(args: &Args, env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &args.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => AgentConfig::default(),
        };

        config.apply_env(env)?;
        config.apply_args(args);
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env("REWRITE_LISTEN_ADDR") {
            self.listen_address = value;
        }
        if let Some(value) = env("REWRITE_LISTEN_PORT") {
            self.listen_port = parse_env("REWRITE_LISTEN_PORT", &value)?;
        }
        if let Some(value) = env("REWRITE_DATABASE_URL") {
            self.database_url = value;
        }
        if let Some(value) = env("REWRITE_STATE_KEY") {
            self.engine.state_key = value;
        }
        if let Some(value) = env("REWRITE_MAX_PATTERN_LEN") {
            self.engine.max_pattern_len = parse_env("REWRITE_MAX_PATTERN_LEN", &value)?;
        }
        if let Some(value) = env("REWRITE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = env("REWRITE_LOG_JSON") {
            self.logging.json_format = parse_env("REWRITE_LOG_JSON", &value)?;
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(addr) = &args.listen_addr {
            self.listen_address = addr.clone();
        }
        if let Some(port) = args.listen_port {
            self.listen_port = port;
        }
        if let Some(url) = &args.database_url {
            self.database_url = url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.log_json {
            self.logging.json_format = true;
        }
        if let Some(file) = &args.log_file {
            self.logging.log_file = Some(file.clone());
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", value, key, e))
}
