//! 任务面板状态
//!
//! 面板打开时创建，只由它的 JobController 修改，面板关闭或切换数据集时重置。

use crate::models::{Job, JobStatus, Summary, TerminalOutcome};

/// 面板所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Idle,
    Enqueuing,
    Polling,
    Terminal(TerminalOutcome),
    /// 连续轮询失败达到上限，已停止并报错，可恢复
    Stalled,
}

/// 面向界面的聚合状态
#[derive(Debug, Clone, PartialEq)]
pub struct JobPanelState {
    /// 当前参数 `y`
    pub y: String,
    pub job: Option<Job>,
    pub polling: bool,
    pub error: Option<String>,
    pub phase: PanelPhase,
}

impl Default for JobPanelState {
    fn default() -> Self {
        Self {
            y: "temperature".to_string(),
            job: None,
            polling: false,
            error: None,
            phase: PanelPhase::Idle,
        }
    }
}

impl JobPanelState {
    pub fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|job| job.status)
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.job.as_ref().and_then(|job| job.result_summary.as_ref())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.job_id.as_str())
    }

    /// 不再有进行中的提交或轮询
    pub fn is_settled(&self) -> bool {
        !self.polling && self.phase != PanelPhase::Enqueuing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_panel_is_idle_and_settled() {
        let state = JobPanelState::default();
        assert_eq!(state.phase, PanelPhase::Idle);
        assert_eq!(state.y, "temperature");
        assert!(state.is_settled());
        assert_eq!(state.status(), None);
    }

    #[test]
    fn enqueuing_is_not_settled() {
        let state = JobPanelState {
            phase: PanelPhase::Enqueuing,
            ..Default::default()
        };
        assert!(!state.is_settled());
    }
}
