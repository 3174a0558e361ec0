use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Stopped,
    Unknown,
}

/// 终态的三种结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalOutcome {
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    /// 解析服务端的状态字符串，兼容任务队列自身的写法
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "deferred" | "scheduled" => JobStatus::Queued,
            "running" | "started" => JobStatus::Running,
            "succeeded" | "finished" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "stopped" | "canceled" | "cancelled" => JobStatus::Stopped,
            _ => JobStatus::Unknown,
        }
    }

    pub fn terminal_outcome(self) -> Option<TerminalOutcome> {
        match self {
            JobStatus::Succeeded => Some(TerminalOutcome::Succeeded),
            JobStatus::Failed => Some(TerminalOutcome::Failed),
            JobStatus::Stopped => Some(TerminalOutcome::Stopped),
            JobStatus::Queued | JobStatus::Running | JobStatus::Unknown => None,
        }
    }

    /// 终态之后不再轮询
    pub fn is_terminal(self) -> bool {
        self.terminal_outcome().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(JobStatus::parse(&raw))
    }
}

/// 任务结果统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(v: Option<f64>) -> String {
            v.map(|x| format!("{:.3}", x)).unwrap_or_else(|| "-".to_string())
        }
        write!(
            f,
            "count={} min={} max={} mean={}",
            self.count,
            show(self.min),
            show(self.max),
            show(self.mean)
        )
    }
}

/// 客户端持有的任务
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub result_summary: Option<Summary>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            result_summary: None,
        }
    }
}

/// `POST /jobs` 的成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueResponse {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub job_id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// 数据库中的任务记录（`GET /jobs/{id}` 里的 `db` 字段）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// 内嵌的 JSON 字符串，需要再解析一次
    #[serde(default)]
    pub result_summary: Option<String>,
}

/// `GET /jobs/{id}` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub db: Option<JobRecord>,
}

impl JobStatusResponse {
    /// 顶层 `status` 优先，缺失时退回 `db.status`
    pub fn effective_status(&self) -> JobStatus {
        self.status
            .or_else(|| self.db.as_ref().and_then(|db| db.status))
            .unwrap_or(JobStatus::Unknown)
    }

    pub fn summary_payload(&self) -> Option<&str> {
        self.db.as_ref().and_then(|db| db.result_summary.as_deref())
    }
}

/// 服务端错误体，`detail` 可能是字符串也可能是校验错误数组
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
