use crate::core::interface::{InterfaceManifest, MethodInterface, ModuleInterface};
use crate::core::module::{Module, RegisteredApi};
use crate::utils::error::{Result, RpcError};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Start,
    Shutdown,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::Start => write!(f, "start"),
            HookPhase::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// 已載入的模組，依註冊順序保存
#[derive(Debug, Default)]
pub struct Registry {
    modules: Vec<Module>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Module) -> Result<()> {
        if self.index.contains_key(module.id()) {
            return Err(RpcError::DuplicateModule(module.id().to_string()));
        }

        tracing::info!(
            "Loaded module {} ({}) with {} methods",
            module.id(),
            module.name(),
            module.apis().len()
        );
        self.index.insert(module.id().to_string(), self.modules.len());
        self.modules.push(module);
        Ok(())
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.index.get(module_id).map(|&i| &self.modules[i])
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn method_count(&self) -> usize {
        self.modules.iter().map(|m| m.apis().len()).sum()
    }

    pub fn resolve(&self, module_id: &str, method: &str) -> Result<&RegisteredApi> {
        let module = self
            .module(module_id)
            .ok_or_else(|| RpcError::UnknownModule(module_id.to_string()))?;
        module
            .find_api(method)
            .ok_or_else(|| RpcError::UnknownMethod(method.to_string()))
    }

    /// 依序執行所有啟動鉤子，第一個失敗即中止
    pub async fn run_start_hooks(&self) -> Result<()> {
        for module in &self.modules {
            for hook in module.start_hooks() {
                hook.run()
                    .await
                    .map_err(|e| hook_failed(module, HookPhase::Start, e))?;
            }
        }
        Ok(())
    }

    /// 執行所有關閉鉤子；失敗會記錄並繼續，回傳第一個錯誤
    pub async fn run_shutdown_hooks(&self) -> Result<()> {
        let mut first_error = None;
        for module in &self.modules {
            for hook in module.shutdown_hooks() {
                if let Err(e) = hook.run().await {
                    let err = hook_failed(module, HookPhase::Shutdown, e);
                    tracing::error!("{}", err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn describe(&self) -> InterfaceManifest {
        let modules = self
            .modules
            .iter()
            .map(|module| ModuleInterface {
                id: module.id().to_string(),
                name: module.name().to_string(),
                description: module.description().to_string(),
                methods: module
                    .apis()
                    .iter()
                    .map(|api| MethodInterface {
                        method_name: api.meta.method_name.clone(),
                        param_type: api.meta.param_type.clone(),
                        resp_type: api.meta.resp_type.clone(),
                        blocking: api.meta.blocking,
                    })
                    .collect(),
            })
            .collect();

        InterfaceManifest::new(modules)
    }
}

fn hook_failed(module: &Module, phase: HookPhase, err: anyhow::Error) -> RpcError {
    RpcError::HookFailed {
        module: module.id().to_string(),
        phase: phase.to_string(),
        message: err.to_string(),
    }
}
