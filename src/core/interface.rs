use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 伺服器對外提供的模組與方法清單，供客戶端產生呼叫介面
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceManifest {
    pub server_version: String,
    pub generated_at: DateTime<Utc>,
    pub modules: Vec<ModuleInterface>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInterface {
    pub id: String,
    pub name: String,
    pub description: String,
    pub methods: Vec<MethodInterface>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInterface {
    pub method_name: String,
    pub param_type: String,
    pub resp_type: String,
    pub blocking: bool,
}

impl InterfaceManifest {
    pub fn new(modules: Vec<ModuleInterface>) -> Self {
        Self {
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            modules,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
