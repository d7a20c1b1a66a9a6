use clap::Parser;
use logic_server::utils::{logger, validation::Validate};
use logic_server::{modules, CliConfig, RpcServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 載入並驗證配置 (日誌尚未初始化，錯誤直接輸出到 stderr)
    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config.display(), e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let _log_guard = match logger::init_server_logger(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Starting logic-server");
    tracing::debug!("Server config: {:?}", config);

    let registry = match modules::builtin_registry() {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("❌ Module registration failed: {}", e);
            std::process::exit(e.severity().exit_code().max(1));
        }
    };
    tracing::info!(
        "📦 {} modules, {} methods registered",
        registry.modules().len(),
        registry.method_count()
    );

    let server = RpcServer::new(&config, registry);

    match server.start().await {
        Ok(()) => {
            tracing::info!("✅ RPC Server stopped");
        }
        Err(e) => {
            tracing::error!(
                "❌ RPC Server failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                // 確保緩衝中的日誌寫出
                drop(_log_guard);
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
