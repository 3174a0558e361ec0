use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 发起请求前的参数校验失败（不会产生任何网络调用）
    #[error("参数校验失败: {field} 不能为空")]
    Validation { field: &'static str },

    /// 服务端返回非成功状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    Request {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// 网络不可达、超时等传输层错误
    #[error("网络请求失败 ({endpoint}): {message}")]
    Transport { endpoint: String, message: String },

    /// 必需的响应体无法解析
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 未登录，且未启用开发身份
    #[error("未登录，且当前配置未启用开发身份")]
    NotAuthenticated,

    /// 持久化存储读写失败
    #[error("存储错误 ({key}): {message}")]
    Storage { key: String, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 响应属于已被取代的任务代次，已丢弃
    #[error("任务已被新的提交取代")]
    Superseded,
}

impl AppError {
    pub fn transport(endpoint: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::Transport {
            endpoint: endpoint.into(),
            message: err.to_string(),
        }
    }

    pub fn storage(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::Storage {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// 面板上展示给用户的错误文本
    ///
    /// 请求失败直接展示服务端给出的 detail（或 `Failed (<status>)`），
    /// 其余错误给出简短描述。
    pub fn display_message(&self) -> String {
        match self {
            AppError::Request { message, .. } => message.clone(),
            AppError::Transport { message, .. } => format!("Network error: {}", message),
            AppError::Validation { field } => format!("Missing {}", field),
            AppError::Json(e) => format!("Invalid response: {}", e),
            AppError::NotAuthenticated => "Please sign in first".to_string(),
            AppError::Storage { message, .. } => format!("Storage error: {}", message),
            AppError::Config(msg) => format!("Configuration error: {}", msg),
            AppError::Superseded => "Superseded by a newer job".to_string(),
        }
    }

    /// 是否为传输层错误（请求未到达服务端）
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport { .. })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
