use logic_server::core::codec;
use logic_server::core::{CallRequest, CallResponse};
use logic_server::modules::demo::{self, DemoState, TestParameters, TestResponse};
use logic_server::{Module, Registry, RpcClient, RpcError, RpcServer, ServerConfig};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

struct RunningServer {
    server: Arc<RpcServer>,
    task: JoinHandle<logic_server::Result<()>>,
    socket_path: PathBuf,
    _dir: TempDir,
}

impl RunningServer {
    async fn start(registry: Registry) -> Self {
        Self::start_with(registry, |_| {}).await
    }

    async fn start_with(registry: Registry, configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let socket_path = dir.path().join("run").join("logic.sock");

        let mut config = ServerConfig::default();
        config.server.socket_path = socket_path.clone();
        configure(&mut config);

        let server = Arc::new(RpcServer::new(&config, registry));
        let serving = Arc::clone(&server);
        let task = tokio::spawn(async move { serving.serve(std::future::pending()).await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while !server.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server did not start in time");

        Self {
            server,
            task,
            socket_path,
            _dir: dir,
        }
    }

    fn client(&self) -> RpcClient {
        RpcClient::new(&self.socket_path)
    }

    async fn stop(self) -> logic_server::Result<()> {
        self.server.shutdown_handle().trigger();
        self.task.await.unwrap()
    }
}

fn demo_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(demo::module().unwrap()).unwrap();
    registry
}

#[tokio::test]
async fn test_demo_call_round_trip() {
    let running = RunningServer::start(demo_registry()).await;

    let response: TestResponse = running
        .client()
        .call(
            demo::MODULE_ID,
            "session-1",
            "test_function",
            &TestParameters { value: 21 },
        )
        .await
        .unwrap();
    assert_eq!(response, TestResponse { result: 42 });

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_is_returned_to_client() {
    let running = RunningServer::start(demo_registry()).await;

    let request = CallRequest {
        module_id: demo::MODULE_ID.to_string(),
        unified_msg_origin: "session-err".to_string(),
        method: "test_function2".to_string(),
        params: json!({"value": 1}),
    };
    let response = running.client().call_raw(&request).await.unwrap();

    assert!(!response.ok);
    assert_eq!(response.unified_msg_origin, "session-err");
    assert_eq!(response.data, None);
    assert_eq!(response.error_message, "This is a test error.");

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_module_and_method() {
    let running = RunningServer::start(demo_registry()).await;
    let client = running.client();

    let err = client
        .call::<_, TestResponse>(demo::MODULE_ID, "s", "nope", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Remote(ref m) if m == "Unknown method: nope"));

    let err = client
        .call::<_, TestResponse>("ghost", "s", "test_function", &json!({"value": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Remote(ref m) if m == "Unknown module: ghost"));

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_params_are_reported() {
    let running = RunningServer::start(demo_registry()).await;

    let err = running
        .client()
        .call::<_, TestResponse>(demo::MODULE_ID, "s", "test_function", &json!({"value": "x"}))
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(message) => {
            assert!(message.starts_with("Invalid parameters for 'test_function'"))
        }
        other => panic!("unexpected error: {:?}", other),
    }

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_raw_frame_missing_fields() {
    let running = RunningServer::start(demo_registry()).await;

    let mut stream = UnixStream::connect(&running.socket_path).await.unwrap();
    codec::write_message(
        &mut stream,
        &json!({"unified_msg_origin": "partial", "method": "test_function"}),
    )
    .await
    .unwrap();
    let response: CallResponse = codec::read_message(&mut stream, 1024 * 1024).await.unwrap();

    assert!(!response.ok);
    assert_eq!(response.unified_msg_origin, "partial");
    assert!(response.error_message.contains("module_id"));

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_clients() {
    let running = RunningServer::start(demo_registry()).await;

    let mut calls = Vec::new();
    for value in 0..16i64 {
        let client = running.client();
        calls.push(tokio::spawn(async move {
            let origin = format!("session-{}", value);
            let resp: TestResponse = client
                .call(demo::MODULE_ID, &origin, "test_function", &TestParameters { value })
                .await
                .unwrap();
            (value, resp.result)
        }));
    }

    for call in calls {
        let (value, result) = call.await.unwrap();
        assert_eq!(result, value * 2);
    }

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_hooks_and_socket_cleanup() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let mut module = Module::new("counter", "Counter", "counts lifecycle events");
    let on_start = Arc::clone(&started);
    let on_stop = Arc::clone(&stopped);
    module
        .on_start_blocking(move || {
            on_start.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_shutdown_blocking(move || {
            on_stop.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    let demo_module = demo::module().unwrap();
    let demo_state = demo_module.get_context::<DemoState>().unwrap();

    let mut registry = Registry::new();
    registry.register(module).unwrap();
    registry.register(demo_module).unwrap();

    let running = RunningServer::start(registry).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(demo_state.initialized.load(Ordering::SeqCst));
    assert!(running.socket_path.exists());

    let socket_path = running.socket_path.clone();
    let server = Arc::clone(&running.server);
    running.stop().await.unwrap();

    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert!(!demo_state.initialized.load(Ordering::SeqCst));
    assert!(!socket_path.exists());
    assert!(!server.is_running());

    // 第二次呼叫不會重複執行關閉鉤子
    server.shutdown().await.unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_hooks_run_before_socket_removal() {
    let socket_seen = Arc::new(AtomicBool::new(false));

    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("logic.sock");

    let mut module = Module::new("watcher", "Watcher", "");
    let seen = Arc::clone(&socket_seen);
    let watched = socket_path.clone();
    module.on_shutdown_blocking(move || {
        seen.store(watched.exists(), Ordering::SeqCst);
        Ok(())
    });
    let mut registry = Registry::new();
    registry.register(module).unwrap();

    let running = RunningServer::start_with(registry, |config| {
        config.server.socket_path = socket_path.clone();
    })
    .await;
    running.stop().await.unwrap();

    assert!(socket_seen.load(Ordering::SeqCst));
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn test_idle_connection_does_not_block_stop() {
    let running = RunningServer::start_with(demo_registry(), |config| {
        config.server.read_timeout_secs = 60;
        config.server.shutdown_grace_secs = 1;
    })
    .await;

    // 連線後不送出任何請求
    let _idle = UnixStream::connect(&running.socket_path).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), running.stop())
        .await
        .expect("stop() hung on an idle connection")
        .unwrap();
}

#[tokio::test]
async fn test_idle_connection_is_closed_after_read_timeout() {
    let running = RunningServer::start_with(demo_registry(), |config| {
        config.server.read_timeout_secs = 1;
    })
    .await;

    let mut idle = UnixStream::connect(&running.socket_path).await.unwrap();
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), idle.read_to_end(&mut buf))
        .await
        .expect("idle connection was not closed")
        .unwrap();
    assert!(buf.is_empty());

    // 逾時的連線不影響後續呼叫
    let resp: TestResponse = running
        .client()
        .call(demo::MODULE_ID, "s", "test_function", &TestParameters { value: 4 })
        .await
        .unwrap();
    assert_eq!(resp.result, 8);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("logic.sock");
    std::fs::write(&socket_path, b"stale").unwrap();

    let mut config = ServerConfig::default();
    config.server.socket_path = socket_path.clone();
    let server = Arc::new(RpcServer::new(&config, demo_registry()));

    let serving = Arc::clone(&server);
    let handle = server.shutdown_handle();
    let task = tokio::spawn(async move { serving.serve(std::future::pending()).await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !server.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let resp: TestResponse = RpcClient::new(&socket_path)
        .call(demo::MODULE_ID, "s", "test_function", &TestParameters { value: 5 })
        .await
        .unwrap();
    assert_eq!(resp.result, 10);

    handle.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failing_start_hook_prevents_bind() {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("logic.sock");

    let mut module = Module::new("broken", "Broken", "");
    module.on_start_blocking(|| Err(anyhow::anyhow!("cannot open database")));
    let mut registry = Registry::new();
    registry.register(module).unwrap();

    let mut config = ServerConfig::default();
    config.server.socket_path = socket_path.clone();
    let server = RpcServer::new(&config, registry);

    let err = server.serve(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, RpcError::HookFailed { ref module, .. } if module == "broken"));
    assert!(!socket_path.exists());
}
