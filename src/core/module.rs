use crate::core::context::ModuleContext;
use crate::domain::model::{ApiMeta, Value};
use crate::domain::ports::{ApiHandler, LifecycleHook};
use crate::utils::error::{Result, RpcError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// 註冊完成的 API 方法
#[derive(Clone)]
pub struct RegisteredApi {
    pub meta: ApiMeta,
    pub handler: Arc<dyn ApiHandler>,
}

/// 一組 API 方法與生命週期鉤子
pub struct Module {
    id: String,
    name: String,
    description: String,
    apis: Vec<RegisteredApi>,
    api_index: HashMap<String, usize>,
    start_hooks: Vec<Arc<dyn LifecycleHook>>,
    shutdown_hooks: Vec<Arc<dyn LifecycleHook>>,
    context: ModuleContext,
}

impl Module {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            apis: Vec::new(),
            api_index: HashMap::new(),
            start_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
            context: ModuleContext::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// 註冊非同步 API 方法
    pub fn api<F, Fut, P, R>(&mut self, method_name: impl Into<String>, f: F) -> Result<&mut Self>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let method_name = method_name.into();
        let handler = AsyncApi {
            method_name: method_name.clone(),
            f,
            _marker: PhantomData,
        };
        self.insert_api::<P, R>(method_name, false, Arc::new(handler))
    }

    /// 註冊同步 API 方法，呼叫時在 blocking 執行緒池中執行
    pub fn api_blocking<F, P, R>(
        &mut self,
        method_name: impl Into<String>,
        f: F,
    ) -> Result<&mut Self>
    where
        F: Fn(P) -> anyhow::Result<R> + Send + Sync + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let method_name = method_name.into();
        let handler = BlockingApi {
            method_name: method_name.clone(),
            f: Arc::new(f),
            _marker: PhantomData,
        };
        self.insert_api::<P, R>(method_name, true, Arc::new(handler))
    }

    fn insert_api<P, R>(
        &mut self,
        method_name: String,
        blocking: bool,
        handler: Arc<dyn ApiHandler>,
    ) -> Result<&mut Self> {
        if self.api_index.contains_key(&method_name) {
            return Err(RpcError::DuplicateMethod(method_name));
        }

        tracing::debug!("Registering API method: {}.{}", self.id, method_name);
        let meta = ApiMeta {
            module_id: self.id.clone(),
            method_name: method_name.clone(),
            param_type: short_type_name::<P>(),
            resp_type: short_type_name::<R>(),
            blocking,
        };
        self.api_index.insert(method_name, self.apis.len());
        self.apis.push(RegisteredApi { meta, handler });
        Ok(self)
    }

    pub fn on_start<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.start_hooks.push(Arc::new(AsyncHook(f)));
        self
    }

    pub fn on_start_blocking<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.start_hooks.push(Arc::new(BlockingHook(Arc::new(f))));
        self
    }

    pub fn on_shutdown<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shutdown_hooks.push(Arc::new(AsyncHook(f)));
        self
    }

    pub fn on_shutdown_blocking<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shutdown_hooks.push(Arc::new(BlockingHook(Arc::new(f))));
        self
    }

    pub fn set_context<T: Any + Send + Sync>(&self, value: T) {
        self.context.set(value);
    }

    pub fn get_context<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context.get::<T>()
    }

    /// 供處理函式與鉤子捕獲的上下文句柄
    pub fn context(&self) -> ModuleContext {
        self.context.clone()
    }

    pub fn find_api(&self, method_name: &str) -> Option<&RegisteredApi> {
        self.api_index.get(method_name).map(|&i| &self.apis[i])
    }

    pub fn apis(&self) -> &[RegisteredApi] {
        &self.apis
    }

    pub fn start_hooks(&self) -> &[Arc<dyn LifecycleHook>] {
        &self.start_hooks
    }

    pub fn shutdown_hooks(&self) -> &[Arc<dyn LifecycleHook>] {
        &self.shutdown_hooks
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("methods", &self.api_index.keys().collect::<Vec<_>>())
            .field("start_hooks", &self.start_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .finish()
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    // 只保留最後一段路徑，例如 logic_server::modules::demo::TestParameters -> TestParameters
    match full.find('<') {
        Some(generic_start) => {
            let (head, tail) = full.split_at(generic_start);
            format!("{}{}", head.rsplit("::").next().unwrap_or(head), tail)
        }
        None => full.rsplit("::").next().unwrap_or(full).to_string(),
    }
}

fn decode_params<P: DeserializeOwned>(method_name: &str, params: Value) -> Result<P> {
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams {
        method: method_name.to_string(),
        message: e.to_string(),
    })
}

fn encode_response<R: Serialize>(response: R) -> Result<Value> {
    Ok(serde_json::to_value(response)?)
}

struct AsyncApi<F, P, R> {
    method_name: String,
    f: F,
    _marker: PhantomData<fn(P) -> R>,
}

#[async_trait]
impl<F, Fut, P, R> ApiHandler for AsyncApi<F, P, R>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn call(&self, params: Value) -> Result<Value> {
        let params = decode_params::<P>(&self.method_name, params)?;
        let response = (self.f)(params)
            .await
            .map_err(|e| RpcError::Handler(e.to_string()))?;
        encode_response(response)
    }
}

struct BlockingApi<F, P, R> {
    method_name: String,
    f: Arc<F>,
    _marker: PhantomData<fn(P) -> R>,
}

#[async_trait]
impl<F, P, R> ApiHandler for BlockingApi<F, P, R>
where
    F: Fn(P) -> anyhow::Result<R> + Send + Sync + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn call(&self, params: Value) -> Result<Value> {
        let params = decode_params::<P>(&self.method_name, params)?;
        let f = Arc::clone(&self.f);
        let response = tokio::task::spawn_blocking(move || f(params))
            .await
            .map_err(|e| RpcError::Handler(format!("{} worker failed: {}", self.method_name, e)))?
            .map_err(|e| RpcError::Handler(e.to_string()))?;
        encode_response(response)
    }
}

struct AsyncHook<F>(F);

#[async_trait]
impl<F, Fut> LifecycleHook for AsyncHook<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

struct BlockingHook<F>(Arc<F>);

#[async_trait]
impl<F> LifecycleHook for BlockingHook<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        let f = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || f()).await?
    }
}
