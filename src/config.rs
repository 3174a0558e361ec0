use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 后端鉴权模式
///
/// 与服务端的 `AUTH_MODE` 取值一致。只有 `dev-noverify` 下客户端才会在
/// 未登录时附带开发身份头。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Prod,
    DevNoVerify,
}

impl FromStr for AuthMode {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(AuthMode::Prod),
            "dev-noverify" => Ok(AuthMode::DevNoVerify),
            other => Err(AppError::Config(format!("未知的 AUTH_MODE: {}", other))),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 后端 API 地址
    pub api_base_url: String,
    /// 会话存储文件（多个进程共享同一个令牌）
    pub storage_file: String,
    /// 任务状态轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 连续轮询失败多少次后停止并报错
    pub max_poll_failures: u32,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    pub auth_mode: AuthMode,
    /// 开发模式下使用的身份邮箱
    pub dev_email: String,
    /// 退出登录后跳转的路径
    pub login_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            storage_file: ".dataset-client-session.json".to_string(),
            poll_interval_ms: 1500,
            max_poll_failures: 3,
            request_timeout_secs: 30,
            auth_mode: AuthMode::Prod,
            dev_email: "dev@local.test".to_string(),
            login_path: "/login".to_string(),
            verbose_logging: false,
        }
    }
}

/// TOML 配置文件，所有字段可选，只覆盖出现的部分
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    api_base_url: Option<String>,
    storage_file: Option<String>,
    poll_interval_ms: Option<u64>,
    max_poll_failures: Option<u32>,
    request_timeout_secs: Option<u64>,
    auth_mode: Option<String>,
    dev_email: Option<String>,
    login_path: Option<String>,
    verbose_logging: Option<bool>,
}

impl Config {
    /// 加载配置：默认值 → `CLIENT_CONFIG` 指向的 TOML 文件 → 环境变量
    pub fn load() -> AppResult<Self> {
        let mut config = match std::env::var("CLIENT_CONFIG") {
            Ok(path) => Self::from_toml_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("读取 {} 失败: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(v) = file.api_base_url {
            config.api_base_url = v;
        }
        if let Some(v) = file.storage_file {
            config.storage_file = v;
        }
        if let Some(v) = file.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = file.max_poll_failures {
            config.max_poll_failures = v;
        }
        if let Some(v) = file.request_timeout_secs {
            config.request_timeout_secs = v;
        }
        if let Some(v) = file.auth_mode {
            config.auth_mode = v.parse()?;
        }
        if let Some(v) = file.dev_email {
            config.dev_email = v;
        }
        if let Some(v) = file.login_path {
            config.login_path = v;
        }
        if let Some(v) = file.verbose_logging {
            config.verbose_logging = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(v) = std::env::var("API_BASE") {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var("SESSION_STORAGE_FILE") {
            self.storage_file = v;
        }
        self.poll_interval_ms = env_parse("POLL_INTERVAL_MS", self.poll_interval_ms);
        self.max_poll_failures = env_parse("MAX_POLL_FAILURES", self.max_poll_failures);
        self.request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", self.request_timeout_secs);
        if let Ok(v) = std::env::var("AUTH_MODE") {
            self.auth_mode = v.parse()?;
        }
        if let Ok(v) = std::env::var("DEV_EMAIL") {
            self.dev_email = v;
        }
        if let Ok(v) = std::env::var("LOGIN_PATH") {
            self.login_path = v;
        }
        self.verbose_logging = env_parse("VERBOSE_LOGGING", self.verbose_logging);
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::Config("api_base_url 不能为空".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms 必须大于 0".to_string()));
        }
        if self.max_poll_failures == 0 {
            return Err(AppError::Config("max_poll_failures 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 开发身份邮箱，仅在 `dev-noverify` 模式下可用
    pub fn dev_identity(&self) -> Option<&str> {
        match self.auth_mode {
            AuthMode::DevNoVerify => Some(self.dev_email.as_str()),
            AuthMode::Prod => None,
        }
    }
}

/// 读取并解析环境变量，缺失或解析失败时使用默认值
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
