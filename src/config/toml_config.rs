use crate::core::codec::{DEFAULT_MAX_FRAME_BYTES, MAX_FRAME_BYTES_CEILING, MIN_FRAME_BYTES};
use crate::core::ConfigProvider;
use crate::utils::error::{RpcError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOCKET_PATH: &str = "/run/logic/logic.sock";
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub socket_path: PathBuf,
    pub max_frame_bytes: usize,
    /// 連線後等待請求的秒數
    pub read_timeout_secs: u64,
    /// 停止後等待進行中連線的秒數，逾時即中止
    pub shutdown_grace_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
    pub file_logging: bool,
    pub format: LogFormat,
    pub app_retention_days: usize,
    pub error_retention_days: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            dir: PathBuf::from("logs"),
            file_logging: true,
            format: LogFormat::Compact,
            app_retention_days: 30,
            error_retention_days: 60,
        }
    }
}

impl ServerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RpcError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RpcError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LOGIC_SOCKET})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RpcError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_socket_path("server.socket_path", &self.server.socket_path)?;
        validation::validate_range(
            "server.max_frame_bytes",
            self.server.max_frame_bytes,
            MIN_FRAME_BYTES,
            MAX_FRAME_BYTES_CEILING,
        )?;
        validation::validate_range(
            "server.read_timeout_secs",
            self.server.read_timeout_secs,
            1,
            3600,
        )?;
        validation::validate_range(
            "server.shutdown_grace_secs",
            self.server.shutdown_grace_secs,
            0,
            600,
        )?;

        validation::validate_one_of("logging.level", &self.logging.level, &LOG_LEVELS)?;
        if self.logging.file_logging {
            validation::validate_path("logging.dir", &self.logging.dir)?;
            validation::validate_positive_number(
                "logging.app_retention_days",
                self.logging.app_retention_days,
                1,
            )?;
            validation::validate_positive_number(
                "logging.error_retention_days",
                self.logging.error_retention_days,
                1,
            )?;
        }

        Ok(())
    }
}

impl ConfigProvider for ServerConfig {
    fn socket_path(&self) -> &Path {
        &self.server.socket_path
    }

    fn max_frame_bytes(&self) -> usize {
        self.server.max_frame_bytes
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }

    fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_grace_secs)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
