//! Unix socket RPC server. One request frame and one response frame per connection.

use crate::core::codec;
use crate::core::registry::Registry;
use crate::core::ConfigProvider;
use crate::domain::model::{CallRequest, CallResponse, Value};
use crate::utils::error::{Result, RpcError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

const BANNER: &str = "
#################################
#         Logic Server          #
#       RPC Server Started      #
#################################";

/// 從伺服器外部觸發停止
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

pub struct RpcServer {
    socket_path: PathBuf,
    max_frame_bytes: usize,
    read_timeout: Duration,
    shutdown_grace: Duration,
    registry: Arc<Registry>,
    running: AtomicBool,
    shut_down: AtomicBool,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl RpcServer {
    pub fn new<C: ConfigProvider>(config: &C, registry: Registry) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            socket_path: config.socket_path().to_path_buf(),
            max_frame_bytes: config.max_frame_bytes(),
            read_timeout: config.read_timeout(),
            shutdown_grace: config.shutdown_grace(),
            registry: Arc::new(registry),
            running: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            stop_tx: Arc::new(stop_tx),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// 啟動伺服器，直到收到 SIGINT/SIGTERM 或 ShutdownHandle 觸發
    pub async fn start(&self) -> Result<()> {
        self.serve(wait_for_shutdown_signal()).await
    }

    pub async fn serve<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.registry.run_start_hooks().await?;

        let listener = self.bind()?;
        tracing::info!("{}", BANNER);
        tracing::info!("RPC Server started at {}", self.socket_path.display());
        self.running.store(true, Ordering::SeqCst);

        let stopped = wait_for_stop(self.stop_tx.subscribe());
        tokio::pin!(signal);
        tokio::pin!(stopped);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                _ = &mut stopped => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&self.registry);
                        let max_frame_bytes = self.max_frame_bytes;
                        let read_timeout = self.read_timeout;
                        connections.spawn(async move {
                            handle_client(stream, &registry, max_frame_bytes, read_timeout).await;
                        });
                    }
                    Err(e) => tracing::error!("[RPC] accept failed: {}", e),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("[RPC] connection task failed: {}", e);
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        drop(listener);

        if !connections.is_empty() {
            tracing::info!("Waiting for {} in-flight connections", connections.len());
        }
        let drained =
            tokio::time::timeout(self.shutdown_grace, drain_connections(&mut connections)).await;
        if drained.is_err() {
            tracing::warn!(
                "Aborting {} connections still open after {:?}",
                connections.len(),
                self.shutdown_grace
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        // 鉤子執行期間 socket 檔仍存在
        let result = self.shutdown().await;

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", self.socket_path.display(), e);
            }
        }

        result
    }

    /// 執行關閉鉤子，只會執行一次
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Shutting down RPC Server...");
        self.registry.run_shutdown_hooks().await
    }

    fn bind(&self) -> Result<UnixListener> {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => tracing::debug!("Removed stale socket {}", self.socket_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RpcError::IoError(e)),
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(UnixListener::bind(&self.socket_path)?)
    }
}

async fn drain_connections(connections: &mut JoinSet<()>) {
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            tracing::error!("[RPC] connection task failed: {}", e);
        }
    }
}

/// 處理單一連線：讀一個請求、寫一個回應、關閉
///
/// `read_timeout` 內沒有收到完整請求時直接關閉連線，不寫回應。
pub async fn handle_client<S>(
    mut stream: S,
    registry: &Registry,
    max_frame_bytes: usize,
    read_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = tokio::time::timeout(read_timeout, codec::read_frame(&mut stream, max_frame_bytes));
    let frame = match read.await {
        Ok(frame) => frame,
        Err(_) => {
            tracing::warn!("[RPC] no request within {:?}, closing connection", read_timeout);
            return;
        }
    };

    let response = match frame {
        Ok(frame) => dispatch_frame(&frame, registry).await,
        Err(RpcError::ConnectionClosed) => {
            tracing::debug!("[RPC] client closed the connection before sending a request");
            return;
        }
        Err(e @ RpcError::FrameTooLarge { .. }) => {
            tracing::error!("[RPC] rejected request: {}", e);
            CallResponse::failure("", e.to_string())
        }
        Err(e) => {
            tracing::error!("[RPC] failed to read request: {}", e);
            return;
        }
    };

    if let Err(e) = codec::write_message(&mut stream, &response).await {
        tracing::error!("[RPC] failed to write response: {}", e);
        return;
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("[RPC] connection shutdown: {}", e);
    }
}

/// 解碼請求並呼叫對應處理函式；任何錯誤都轉成 ok=false 的回應
pub async fn dispatch_frame(frame: &[u8], registry: &Registry) -> CallResponse {
    let raw: Value = match codec::decode(frame) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!("[RPC] call failed: {}", e);
            return CallResponse::failure("", e.to_string());
        }
    };

    let origin = raw
        .get("unified_msg_origin")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let method = raw
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match dispatch(raw, registry).await {
        Ok(data) => {
            tracing::debug!("[RPC] call {} completed successfully", method);
            CallResponse::success(origin, data)
        }
        Err(e) => {
            tracing::error!("[RPC] call {} failed: {}", method, e);
            CallResponse::failure(origin, e.to_string())
        }
    }
}

async fn dispatch(raw: Value, registry: &Registry) -> Result<Value> {
    let call: CallRequest = serde_json::from_value(raw).map_err(|e| RpcError::InvalidRequest {
        message: e.to_string(),
    })?;
    if !call.params.is_object() {
        return Err(RpcError::InvalidRequest {
            message: "params must be a map".to_string(),
        });
    }
    tracing::debug!("[RPC] Received call: {}.{}", call.module_id, call.method);

    let handler = Arc::clone(&registry.resolve(&call.module_id, &call.method)?.handler);
    let method = call.method;
    let params = call.params;

    // 處理函式在獨立任務中執行，panic 只影響這次呼叫
    tokio::spawn(async move { handler.call(params).await })
        .await
        .map_err(|e| RpcError::Handler(format!("{} panicked: {}", method, e)))?
}

async fn wait_for_stop(mut rx: watch::Receiver<bool>) {
    loop {
        let stopped = *rx.borrow_and_update();
        if stopped {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Cannot install signal handlers ({}), falling back to ctrl-c", e);
            }
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module::Module;
    use serde_json::json;

    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    fn registry() -> Arc<Registry> {
        let mut module = Module::new("math", "Math", "");
        module
            .api("double", |p: Value| async move {
                let value = p["value"].as_i64().unwrap_or_default();
                Ok(json!({ "result": value * 2 }))
            })
            .unwrap()
            .api("explode", |_: Value| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(json!({}))
            })
            .unwrap();

        let mut registry = Registry::new();
        registry.register(module).unwrap();
        Arc::new(registry)
    }

    fn frame(value: &Value) -> Vec<u8> {
        codec::encode(value).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_success_echoes_origin() {
        let request = json!({
            "module_id": "math",
            "unified_msg_origin": "session-42",
            "method": "double",
            "params": {"value": 21}
        });
        let resp = dispatch_frame(&frame(&request), &registry()).await;
        assert!(resp.ok);
        assert_eq!(resp.unified_msg_origin, "session-42");
        assert_eq!(resp.data, Some(json!({"result": 42})));
    }

    #[tokio::test]
    async fn test_missing_field_keeps_origin() {
        let request = json!({"unified_msg_origin": "session-1", "method": "double"});
        let resp = dispatch_frame(&frame(&request), &registry()).await;
        assert!(!resp.ok);
        assert_eq!(resp.unified_msg_origin, "session-1");
        assert!(resp.error_message.starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_garbage_frame() {
        let resp = dispatch_frame(&[0xc1], &registry()).await;
        assert!(!resp.ok);
        assert_eq!(resp.unified_msg_origin, "");
        assert_eq!(resp.data, None);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_error_response() {
        let request = json!({
            "module_id": "math",
            "unified_msg_origin": "s",
            "method": "explode",
            "params": {}
        });
        let resp = dispatch_frame(&frame(&request), &registry()).await;
        assert!(!resp.ok);
        assert!(resp.error_message.contains("explode panicked"));
    }

    #[tokio::test]
    async fn test_handle_client_over_duplex() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move {
            handle_client(server, &registry(), 1024, READ_TIMEOUT).await
        });

        let request = json!({
            "module_id": "math",
            "unified_msg_origin": "s",
            "method": "missing",
            "params": {}
        });
        codec::write_message(&mut client, &request).await.unwrap();
        let resp: CallResponse = codec::read_message(&mut client, 1024).await.unwrap();
        task.await.unwrap();

        assert!(!resp.ok);
        assert_eq!(resp.error_message, "Unknown method: missing");
    }

    #[tokio::test]
    async fn test_oversized_request_gets_error_response() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move {
            handle_client(server, &registry(), 8, READ_TIMEOUT).await
        });

        client.write_all(&1000u32.to_be_bytes()).await.unwrap();
        let resp: CallResponse = codec::read_message(&mut client, 1024).await.unwrap();
        task.await.unwrap();

        assert!(!resp.ok);
        assert!(resp.error_message.contains("exceeds the limit"));
    }

    #[tokio::test]
    async fn test_empty_connection_writes_nothing() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        handle_client(server, &registry(), 1024, READ_TIMEOUT).await;
    }

    #[tokio::test]
    async fn test_params_must_be_a_map() {
        for params in [json!(5), Value::Null, json!([1, 2])] {
            let request = json!({
                "module_id": "math",
                "unified_msg_origin": "s",
                "method": "double",
                "params": params
            });
            let resp = dispatch_frame(&frame(&request), &registry()).await;
            assert!(!resp.ok);
            assert_eq!(resp.error_message, "Invalid request: params must be a map");
        }
    }

    #[tokio::test]
    async fn test_idle_client_is_dropped_after_read_timeout() {
        let (mut client, server) = tokio::io::duplex(64);
        tokio::time::timeout(
            READ_TIMEOUT,
            handle_client(server, &registry(), 1024, Duration::from_millis(100)),
        )
        .await
        .unwrap();

        // 伺服器端已關閉，沒有寫出任何資料
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut buf).await.unwrap();
        assert!(buf.is_empty());
    }
}
