use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("MessagePack encode error: {0}")]
    EncodeError(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    DecodeError(#[from] rmp_serde::decode::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Frame of {size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Module '{0}' already registered")]
    DuplicateModule(String),

    #[error("Method '{0}' already registered")]
    DuplicateMethod(String),

    #[error("Invalid parameters for '{method}': {message}")]
    InvalidParams { method: String, message: String },

    /// 處理函式回傳的錯誤，訊息原樣回傳給呼叫端
    #[error("{0}")]
    Handler(String),

    #[error("{phase} hook of module '{module}' failed: {message}")]
    HookFailed {
        module: String,
        phase: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Remote call failed: {0}")]
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Protocol,
    Dispatch,
    Registration,
    Handler,
    Configuration,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 依嚴重程度決定程式結束碼
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl RpcError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RpcError::IoError(_) => ErrorCategory::Io,
            RpcError::EncodeError(_)
            | RpcError::DecodeError(_)
            | RpcError::SerializationError(_)
            | RpcError::FrameTooLarge { .. }
            | RpcError::ConnectionClosed
            | RpcError::InvalidRequest { .. } => ErrorCategory::Protocol,
            RpcError::UnknownModule(_)
            | RpcError::UnknownMethod(_)
            | RpcError::InvalidParams { .. } => ErrorCategory::Dispatch,
            RpcError::DuplicateModule(_) | RpcError::DuplicateMethod(_) => {
                ErrorCategory::Registration
            }
            RpcError::Handler(_) | RpcError::HookFailed { .. } => ErrorCategory::Handler,
            RpcError::ConfigError { .. } | RpcError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            RpcError::Remote(_) => ErrorCategory::Remote,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Protocol | ErrorCategory::Dispatch => ErrorSeverity::Medium,
            ErrorCategory::Handler | ErrorCategory::Remote => ErrorSeverity::High,
            ErrorCategory::Registration | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RpcError::IoError(e) => format!("System I/O failure: {}", e),
            RpcError::ConnectionClosed => "The server closed the connection unexpectedly".to_string(),
            RpcError::FrameTooLarge { size, limit } => {
                format!("Message too large ({} bytes, limit {} bytes)", size, limit)
            }
            RpcError::UnknownModule(id) => format!("No module named '{}' is loaded", id),
            RpcError::UnknownMethod(name) => format!("No method named '{}' is registered", name),
            RpcError::DuplicateModule(_) | RpcError::DuplicateMethod(_) => {
                format!("Module registration failed: {}", self)
            }
            RpcError::ConfigError { .. } | RpcError::InvalidConfigValueError { .. } => {
                format!("Configuration problem: {}", self)
            }
            RpcError::Remote(message) => format!("Server returned an error: {}", message),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Io => "Check that the socket directory exists and is writable",
            ErrorCategory::Protocol => "Make sure the client sends length-prefixed MessagePack frames",
            ErrorCategory::Dispatch => "Run generate_interface to list the available modules and methods",
            ErrorCategory::Registration => "Give every module and method a unique name",
            ErrorCategory::Handler => "Inspect logs/error for the failing handler or hook",
            ErrorCategory::Configuration => "Fix the configuration file or command line flags",
            ErrorCategory::Remote => "Inspect the server logs for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
