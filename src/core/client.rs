use crate::core::codec::{self, DEFAULT_MAX_FRAME_BYTES};
use crate::domain::model::{CallRequest, CallResponse};
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// 每次呼叫建立一條連線
#[derive(Debug, Clone)]
pub struct RpcClient {
    socket_path: PathBuf,
}

impl RpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn call_raw(&self, request: &CallRequest) -> Result<CallResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        codec::write_message(&mut stream, request).await?;
        codec::read_message(&mut stream, DEFAULT_MAX_FRAME_BYTES).await
    }

    pub async fn call<P, R>(
        &self,
        module_id: &str,
        unified_msg_origin: &str,
        method: &str,
        params: &P,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = CallRequest {
            module_id: module_id.to_string(),
            unified_msg_origin: unified_msg_origin.to_string(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        let data = self.call_raw(&request).await?.into_result()?;
        Ok(serde_json::from_value(data)?)
    }
}
