use crate::domain::model::Value;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub trait ConfigProvider: Send + Sync {
    fn socket_path(&self) -> &Path;
    fn max_frame_bytes(&self) -> usize;
    fn read_timeout(&self) -> Duration;
    fn shutdown_grace(&self) -> Duration;
}

/// 已註冊的 API 方法，以動態型別的參數呼叫
#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn call(&self, params: Value) -> Result<Value>;
}

/// 模組啟動或關閉時執行的鉤子
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}
