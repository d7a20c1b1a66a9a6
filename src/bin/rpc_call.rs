use clap::Parser;
use logic_server::config::toml_config::DEFAULT_SOCKET_PATH;
use logic_server::core::CallRequest;
use logic_server::utils::logger;
use logic_server::RpcClient;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rpc-call")]
#[command(about = "Send one call to a running logic-server and print the response")]
struct Args {
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[arg(short, long)]
    module: String,

    #[arg(long)]
    method: String,

    /// Parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    params: String,

    #[arg(long, default_value = "rpc-call")]
    origin: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let params = match serde_json::from_str(&args.params) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("❌ --params is not valid JSON: {}", e);
            std::process::exit(1);
        }
    };

    let request = CallRequest {
        module_id: args.module,
        unified_msg_origin: args.origin,
        method: args.method,
        params,
    };
    tracing::debug!("Sending {:?} to {}", request, args.socket.display());

    let client = RpcClient::new(&args.socket);
    match client.call_raw(&request).await {
        Ok(response) => {
            let ok = response.ok;
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("❌ {}", e),
            }
            if !ok {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    }
}
