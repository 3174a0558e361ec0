//! 任务控制器 - 流程层
//!
//! 核心职责：驱动一个任务的完整生命周期
//!
//! 流程顺序：
//! 1. enqueue → 带身份的 `POST /jobs`
//! 2. 固定间隔轮询公开的 `GET /jobs/{id}`
//! 3. 遇到终态（succeeded / failed / stopped）停止
//!
//! 每次提交都会递增代次；轮询响应在应用前必须与当前代次一致，
//! 被新任务取代的旧响应一律丢弃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clients::{ApiClient, JobLinks};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobStatus, JobStatusResponse};
use crate::services::{ResultSummaryParser, SummaryOutcome};
use crate::workflow::job_panel::{JobPanelState, PanelPhase};

/// 单次轮询的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Terminal,
    /// 响应属于旧代次或旧任务，已丢弃
    Stale,
}

struct ControllerInner {
    api: Arc<ApiClient>,
    state: watch::Sender<JobPanelState>,
    generation: AtomicU64,
    poll_interval: Duration,
    max_poll_failures: u32,
}

/// 任务控制器
///
/// 每个面板一个实例，同一时刻只跟踪一个任务。
pub struct JobController {
    inner: Arc<ControllerInner>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl JobController {
    pub fn new(api: Arc<ApiClient>, poll_interval: Duration, max_poll_failures: u32) -> Self {
        let (state, _) = watch::channel(JobPanelState::default());
        Self {
            inner: Arc::new(ControllerInner {
                api,
                state,
                generation: AtomicU64::new(0),
                poll_interval,
                max_poll_failures: max_poll_failures.max(1),
            }),
            poll_task: Mutex::new(None),
        }
    }

    pub fn from_config(api: Arc<ApiClient>, config: &Config) -> Self {
        Self::new(api, config.poll_interval(), config.max_poll_failures)
    }

    /// 当前状态快照
    pub fn state(&self) -> JobPanelState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobPanelState> {
        self.inner.state.subscribe()
    }

    pub fn set_y(&self, y: impl Into<String>) {
        let y = y.into();
        self.inner.state.send_modify(|s| s.y = y);
    }

    /// 日志和结果下载地址；有任务 ID 后始终有效
    pub fn links(&self) -> Option<JobLinks> {
        let state = self.inner.state.borrow();
        state
            .job_id()
            .and_then(|id| self.inner.api.job_links(id).ok())
    }

    /// 提交任务并开始轮询
    ///
    /// `dataset_id` 为空时不发请求、不改变面板状态，返回校验错误。
    /// 提交失败时回到 `Idle` 并把错误文本写入面板。
    pub async fn enqueue(&self, dataset_id: &str, y: &str) -> AppResult<Job> {
        if dataset_id.is_empty() {
            debug!("dataset_id 为空，忽略提交");
            return Err(AppError::Validation {
                field: "dataset_id",
            });
        }

        let generation = self.begin_generation();
        self.inner.state.send_modify(|s| {
            s.y = y.to_string();
            s.job = None;
            s.error = None;
            s.polling = false;
            s.phase = PanelPhase::Enqueuing;
        });
        info!("📋 提交任务: dataset={} y={}", dataset_id, y);

        let result = self.inner.api.enqueue_job(dataset_id, y).await;

        match result {
            Err(e) => {
                let message = e.display_message();
                let applied = self.inner.update_if_current(generation, |s| {
                    s.phase = PanelPhase::Idle;
                    s.polling = false;
                    s.error = Some(message);
                });
                if !applied {
                    return Err(AppError::Superseded);
                }
                error!("❌ 任务提交失败: {}", e);
                Err(e)
            }
            Ok(resp) => {
                let job = Job::new(resp.job_id, resp.status.unwrap_or(JobStatus::Queued));
                let snapshot = job.clone();
                let applied = self.inner.update_if_current(generation, |s| {
                    s.job = Some(snapshot);
                    s.polling = true;
                    s.phase = PanelPhase::Polling;
                });
                if !applied {
                    debug!("任务 {} 的提交结果已被新的提交取代", job.job_id);
                    return Err(AppError::Superseded);
                }

                info!("✓ 任务已提交: {} ({})", job.job_id, job.status);
                self.start_polling(generation, job.job_id.clone());
                Ok(job)
            }
        }
    }

    /// 轮询因连续失败停止后，针对同一任务重新开始轮询
    pub fn resume_polling(&self) -> bool {
        let job_id = {
            let state = self.inner.state.borrow();
            match (&state.phase, state.job_id()) {
                (PanelPhase::Stalled, Some(id)) => id.to_string(),
                _ => return false,
            }
        };

        let generation = self.begin_generation();
        let resumed = self.inner.update_if_current(generation, |s| {
            s.polling = true;
            s.error = None;
            s.phase = PanelPhase::Polling;
        });
        if resumed {
            info!("🔄 恢复轮询任务 {}", job_id);
            self.start_polling(generation, job_id);
        }
        resumed
    }

    /// 面板关闭：停止轮询并丢弃任务状态
    pub fn teardown(&self) {
        self.begin_generation();
        self.inner.state.send_replace(JobPanelState::default());
        debug!("任务面板已关闭");
    }

    /// 等待当前提交/轮询结束（终态、失败或停止）
    pub async fn wait_until_settled(&self) -> JobPanelState {
        let mut rx = self.inner.state.subscribe();
        let settled = rx.wait_for(|s| s.is_settled()).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll_task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 取消当前轮询并进入新代次
    fn begin_generation(&self) -> u64 {
        let mut task = self.lock_task();
        if let Some(handle) = task.take() {
            handle.abort();
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn start_polling(&self, generation: u64, job_id: String) {
        let mut task = self.lock_task();
        if !self.inner.is_current(generation) {
            return;
        }
        if let Some(old) = task.take() {
            old.abort();
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(poll_loop(inner, generation, job_id)));
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}

impl ControllerInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// 只有代次仍然一致时才修改状态；检查和修改在同一把锁内完成
    fn update_if_current(&self, generation: u64, f: impl FnOnce(&mut JobPanelState)) -> bool {
        self.state.send_if_modified(|s| {
            if !self.is_current(generation) {
                return false;
            }
            f(s);
            true
        })
    }

    fn apply_status(&self, generation: u64, job_id: &str, resp: &JobStatusResponse) -> TickOutcome {
        let status = resp.effective_status();
        let summary = resp.summary_payload().map(ResultSummaryParser::decode);
        let mut outcome = TickOutcome::Stale;

        self.state.send_if_modified(|s| {
            if !self.is_current(generation) {
                return false;
            }
            let Some(job) = s.job.as_mut().filter(|job| job.job_id == job_id) else {
                return false;
            };

            job.status = status;
            if let Some(SummaryOutcome::Decoded(summary)) = summary {
                job.result_summary = Some(summary);
            }

            match status.terminal_outcome() {
                Some(terminal) => {
                    s.polling = false;
                    s.phase = PanelPhase::Terminal(terminal);
                    outcome = TickOutcome::Terminal;
                }
                None => outcome = TickOutcome::Continue,
            }
            true
        });

        outcome
    }

    fn mark_stalled(&self, generation: u64, err: &AppError) {
        let message = format!("Lost contact with job: {}", err.display_message());
        self.update_if_current(generation, |s| {
            s.polling = false;
            s.phase = PanelPhase::Stalled;
            s.error = Some(message);
        });
    }
}

/// 固定间隔轮询；上一次请求完成之前不会发出下一次
async fn poll_loop(inner: Arc<ControllerInner>, generation: u64, job_id: String) {
    let period = inner.poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        ticker.tick().await;
        if !inner.is_current(generation) {
            break;
        }

        match inner.api.job_status(&job_id).await {
            Ok(resp) => {
                failures = 0;
                match inner.apply_status(generation, &job_id, &resp) {
                    TickOutcome::Continue => {
                        debug!("任务 {} 状态: {}", job_id, resp.effective_status());
                    }
                    TickOutcome::Terminal => {
                        info!("✓ 任务 {} 结束: {}", job_id, resp.effective_status());
                        break;
                    }
                    TickOutcome::Stale => {
                        debug!("丢弃任务 {} 的过期响应", job_id);
                        break;
                    }
                }
            }
            Err(e) => {
                if !inner.is_current(generation) {
                    break;
                }
                failures += 1;
                if failures < inner.max_poll_failures {
                    warn!(
                        "⚠️ 查询任务 {} 失败 ({}/{}): {}",
                        job_id, failures, inner.max_poll_failures, e
                    );
                    continue;
                }
                error!("❌ 任务 {} 连续 {} 次查询失败，停止轮询: {}", job_id, failures, e);
                inner.mark_stalled(generation, &e);
                break;
            }
        }
    }
}
