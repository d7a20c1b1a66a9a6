pub mod toml_config;

pub use toml_config::{LogFormat, LoggingConfig, ServerConfig};

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "logic-server")]
#[command(about = "Local RPC server over a Unix domain socket")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "logic-server.toml")]
    pub config: PathBuf,

    /// Override server.socket_path
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Override logging.dir
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Disable the rotating log files
    #[arg(long)]
    pub no_file_log: bool,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML 配置並套用命令列覆蓋設定
    pub fn load(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::from_file_or_default(&self.config)?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(socket) = &self.socket {
            config.server.socket_path = socket.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.dir = dir.clone();
        }
        if self.no_file_log {
            config.logging.file_logging = false;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if self.verbose {
            config.logging.level = "trace".to_string();
        }
    }
}
