//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (命令分派、生命周期)
//!     ↓
//! workflow::JobController (单个任务的提交与轮询)
//!     ↓
//! clients (ApiClient / AuthenticatedRequestBuilder)  +  session (SessionStore)
//!     ↓
//! infrastructure (HttpTransport / StorageHub)
//! ```

pub mod app;

pub use app::{App, Command};
