//! # Dataset Client
//!
//! 数据集浏览服务的客户端：会话令牌管理与异步任务跟踪
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `HttpTransport` - 发送 HTTP 请求
//! - `StorageHub` - 多个上下文共享的持久存储，写入时通知其它上下文
//!
//! ### ② 会话与客户端（Session / Clients / Services）
//! - `SessionStore` - 令牌的读写删，以及跨上下文同步
//! - `AuthenticatedRequestBuilder` - 为请求附加身份头
//! - `ApiClient` - 后端接口
//! - `ResultSummaryParser` - 结果摘要的尽力解析
//!
//! ### ③ 流程层（Workflow）
//! - `JobController` - 提交 → 轮询 → 终态
//! - `JobPanelState` - 面向界面的任务面板状态
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator::App` - 命令行入口，管理资源生命周期
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ApiClient, AuthenticatedRequestBuilder, JobLinks};
pub use config::{AuthMode, Config};
pub use error::{AppError, AppResult};
pub use infrastructure::{HttpTransport, StorageHub};
pub use models::{Job, JobStatus, Summary};
pub use orchestrator::{App, Command};
pub use services::{ResultSummaryParser, SummaryOutcome};
pub use session::{SessionStore, TOKEN_KEY};
pub use workflow::{JobController, JobPanelState, PanelPhase};
