use crate::error::{Result, SearchError};
use crate::types::ConnectivityMode;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_RPC_ADDR: &str = "CHAT_SEARCH_RPC_ADDR";
pub const ENV_STANDALONE: &str = "CHAT_SEARCH_STANDALONE";
pub const ENV_RPC_TIMEOUT: &str = "CHAT_SEARCH_RPC_TIMEOUT";

const DEFAULT_RPC_ADDR: &str = "127.0.0.1:41017";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub rpc_addr: String,
    pub standalone: bool,
    pub rpc_timeout: Duration,
}

/// 配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    rpc_addr: Option<String>,
    standalone: Option<bool>,
    rpc_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_addr: DEFAULT_RPC_ADDR.to_string(),
            standalone: false,
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let path = Self::default_path();
        Self::load(path.as_deref(), |key| env::var(key).ok())
    }

    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("chat-search").join("config.json"))
    }

    /// 默认值 → 配置文件（不存在则跳过）→ 环境变量
    pub fn load(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path {
            if path.exists() {
                let text = std::fs::read_to_string(path)?;
                let file: ConfigFile = serde_json::from_str(&text).map_err(|e| {
                    SearchError::Config(format!("{}: {}", path.display(), e))
                })?;
                config.apply_file(file);
            }
        }

        if let Some(addr) = env(ENV_RPC_ADDR).filter(|s| !s.trim().is_empty()) {
            config.rpc_addr = addr.trim().to_string();
        }
        if let Some(value) = env(ENV_STANDALONE) {
            config.standalone = parse_bool(ENV_STANDALONE, &value)?;
        }
        if let Some(value) = env(ENV_RPC_TIMEOUT) {
            let secs = value.trim().parse::<u64>().map_err(|_| {
                SearchError::Config(format!("{} must be a number of seconds, got {:?}", ENV_RPC_TIMEOUT, value))
            })?;
            config.rpc_timeout = Duration::from_secs(secs);
        }

        tracing::debug!(?config, "config_loaded");
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(addr) = file.rpc_addr {
            self.rpc_addr = addr;
        }
        if let Some(standalone) = file.standalone {
            self.standalone = standalone;
        }
        if let Some(secs) = file.rpc_timeout_secs {
            self.rpc_timeout = Duration::from_secs(secs);
        }
    }

    pub fn mode(&self) -> ConnectivityMode {
        if self.standalone {
            ConnectivityMode::Standalone
        } else {
            ConnectivityMode::Networked
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SearchError::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = Config::load(None, env_of(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mode(), ConnectivityMode::Networked);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"rpc_addr":"10.0.0.1:9000","standalone":true,"rpc_timeout_secs":5}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), env_of(&[])).unwrap();
        assert_eq!(config.rpc_addr, "10.0.0.1:9000");
        assert!(config.standalone);
        assert_eq!(config.rpc_timeout, Duration::from_secs(5));

        let config = Config::load(
            Some(&path),
            env_of(&[(ENV_STANDALONE, "off"), (ENV_RPC_ADDR, "localhost:1")]),
        )
        .unwrap();
        assert_eq!(config.rpc_addr, "localhost:1");
        assert_eq!(config.mode(), ConnectivityMode::Networked);
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json")), env_of(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = Config::load(None, env_of(&[(ENV_STANDALONE, "maybe")])).unwrap_err();
        assert_eq!(err.code(), "config");

        let err = Config::load(None, env_of(&[(ENV_RPC_TIMEOUT, "soon")])).unwrap_err();
        assert_eq!(err.code(), "config");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"unknown":1}"#).unwrap();
        let err = Config::load(Some(&path), env_of(&[])).unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
