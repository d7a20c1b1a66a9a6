use crate::config::toml_config::{LogFormat, LoggingConfig};
use crate::utils::error::{RpcError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 保持背景寫檔執行緒存活，drop 時會把緩衝中的日誌寫出
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("logic_server=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("logic_server=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 伺服器日誌：stderr + `<dir>/app.YYYY-MM-DD.log` (每日輪替)
/// + `<dir>/error/error.YYYY-MM-DD.log` (僅錯誤)
pub fn init_server_logger(config: &LoggingConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("logic_server={},info", config.level)));

    let (compact_layer, json_layer) = match config.format {
        LogFormat::Compact => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .json(),
            ),
        ),
    };

    let mut guards = Vec::new();
    let (app_layer, error_layer) = if config.file_logging {
        let error_dir = config.dir.join("error");
        std::fs::create_dir_all(&error_dir)?;

        let (app_writer, app_guard) = tracing_appender::non_blocking(rolling_appender(
            &config.dir,
            "app",
            config.app_retention_days,
        )?);
        let (error_writer, error_guard) = tracing_appender::non_blocking(rolling_appender(
            &error_dir,
            "error",
            config.error_retention_days,
        )?);
        guards.push(app_guard);
        guards.push(error_guard);

        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(app_writer)
                    .with_ansi(false)
                    .with_line_number(true),
            ),
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(error_writer)
                    .with_ansi(false)
                    .with_line_number(true)
                    .with_filter(LevelFilter::ERROR),
            ),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact_layer)
        .with(json_layer)
        .with(app_layer)
        .with(error_layer)
        .try_init()
        .map_err(|e| RpcError::ConfigError {
            message: format!("Failed to install logger: {}", e),
        })?;

    Ok(LogGuard { _guards: guards })
}

fn rolling_appender(
    dir: &std::path::Path,
    prefix: &str,
    retention_days: usize,
) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(retention_days)
        .build(dir)
        .map_err(|e| RpcError::ConfigError {
            message: format!("Cannot open log file in {}: {}", dir.display(), e),
        })
}
