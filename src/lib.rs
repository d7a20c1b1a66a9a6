pub mod config;
pub mod core;
pub mod domain;
pub mod modules;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServerConfig;

pub use self::core::{
    client::RpcClient,
    module::Module,
    registry::Registry,
    server::{RpcServer, ShutdownHandle},
};
pub use utils::error::{Result, RpcError};
