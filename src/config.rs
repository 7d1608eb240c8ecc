use crate::error::{ClamdError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transport used to reach the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Tcp,
    Unix,
}

/// Client configuration, immutable after construction.
///
/// 설정 파일은 ~/.clamd-client/config.toml에 저장됩니다. 파일이 없으면
/// 기본값을 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Daemon address: `host:port` for tcp, a socket path for unix.
    #[serde(default = "default_address")]
    pub address: String,

    /// Transport kind (tcp, unix).
    #[serde(default = "default_network")]
    pub network: Network,

    /// Dial and per-I/O deadline, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP keep-alive idle time, in seconds. 0 disables keep-alive.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Path of the freshclam binary used for definition updates.
    #[serde(default = "default_freshclam_path")]
    pub freshclam_path: String,
}

fn default_address() -> String {
    "127.0.0.1:3310".to_string()
}

fn default_network() -> Network {
    Network::Tcp
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_freshclam_path() -> String {
    "freshclam".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            network: default_network(),
            timeout_secs: default_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
            freshclam_path: default_freshclam_path(),
        }
    }
}

impl Config {
    /// 설정 파일 경로 가져오기
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".clamd-client").join("config.toml")
    }

    /// 설정 파일에서 로드 (없으면 기본값 사용)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::from_file(&config_path)
    }

    /// Load from an explicit TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ClamdError::ConfigError(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| ClamdError::ConfigError(format!("invalid config {}: {e}", path.display())))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}
