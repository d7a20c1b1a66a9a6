//! Demo module: shows API registration and lifecycle hooks.

use crate::core::module::Module;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

pub const MODULE_ID: &str = "test_module";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestParameters {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResponse {
    pub result: i64,
}

/// 由啟動/關閉鉤子切換
#[derive(Debug, Default)]
pub struct DemoState {
    pub initialized: AtomicBool,
}

pub fn module() -> Result<Module> {
    let mut m = Module::new(
        MODULE_ID,
        "TestModule",
        "A test module for demonstrating RPC functionality.",
    );
    m.set_context(DemoState::default());

    let ctx = m.context();
    m.on_start_blocking(move || {
        tracing::info!("TestModule: initializing resources");
        if let Some(state) = ctx.get::<DemoState>() {
            state.initialized.store(true, Ordering::SeqCst);
        }
        Ok(())
    });

    let ctx = m.context();
    m.on_shutdown_blocking(move || {
        tracing::info!("TestModule: releasing resources");
        if let Some(state) = ctx.get::<DemoState>() {
            state.initialized.store(false, Ordering::SeqCst);
        }
        Ok(())
    });

    m.api("test_function", test_function)?
        .api("test_function2", test_function2)?;

    Ok(m)
}

async fn test_function(params: TestParameters) -> anyhow::Result<TestResponse> {
    let Some(result) = params.value.checked_mul(2) else {
        anyhow::bail!("value {} is too large to double", params.value);
    };
    Ok(TestResponse { result })
}

async fn test_function2(_params: TestParameters) -> anyhow::Result<TestResponse> {
    anyhow::bail!("This is a test error.")
}
