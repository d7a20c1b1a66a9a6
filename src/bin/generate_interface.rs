use clap::Parser;
use logic_server::modules;
use logic_server::utils::logger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generate-interface")]
#[command(about = "Write the module/method manifest of the built-in modules as JSON")]
struct Args {
    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let registry = match modules::builtin_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };
    let manifest = registry.describe();

    let result = match &args.output {
        Some(path) => manifest.write_to(path).map(|_| {
            tracing::info!("📁 Interface written to {}", path.display());
        }),
        None => manifest.to_json_pretty().map(|json| println!("{}", json)),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code().max(1));
    }
}
