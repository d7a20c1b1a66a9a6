use crate::utils::error::{Result, RpcError};
use serde::{Deserialize, Serialize};

pub use serde_json::Value;

/// 客戶端送來的單次呼叫
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// 模組唯一識別碼
    pub module_id: String,
    /// 會話的唯一 ID，原樣帶回回應中
    pub unified_msg_origin: String,
    pub method: String,
    pub params: Value,
}

/// 伺服器回傳給客戶端的結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub ok: bool,
    pub unified_msg_origin: String,
    pub data: Option<Value>,
    pub error_message: String,
}

impl CallResponse {
    pub fn success(unified_msg_origin: impl Into<String>, data: Value) -> Self {
        Self {
            ok: true,
            unified_msg_origin: unified_msg_origin.into(),
            data: Some(data),
            error_message: String::new(),
        }
    }

    pub fn failure(unified_msg_origin: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            ok: false,
            unified_msg_origin: unified_msg_origin.into(),
            data: None,
            error_message: error_message.into(),
        }
    }

    /// 失敗回應轉為 `RpcError::Remote`
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(RpcError::Remote(self.error_message))
        }
    }
}

/// API 方法的註冊資訊
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMeta {
    pub module_id: String,
    pub method_name: String,
    pub param_type: String,
    pub resp_type: String,
    /// 在 blocking 執行緒池中執行
    pub blocking: bool,
}
