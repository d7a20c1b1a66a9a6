pub mod client;
pub mod codec;
pub mod context;
pub mod interface;
pub mod module;
pub mod registry;
pub mod server;

pub use crate::domain::model::{ApiMeta, CallRequest, CallResponse, Value};
pub use crate::domain::ports::{ApiHandler, ConfigProvider, LifecycleHook};
pub use crate::utils::error::Result;
