//! 结果摘要解析 - 业务能力层
//!
//! 任务状态里的 `result_summary` 是一段内嵌的 JSON 字符串。解析失败不代表
//! 任务失败，只表示暂时没有摘要。

use crate::models::Summary;
use tracing::debug;

/// 解析结果：要么得到摘要，要么没有
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Decoded(Summary),
    Absent,
}

impl SummaryOutcome {
    pub fn into_summary(self) -> Option<Summary> {
        match self {
            SummaryOutcome::Decoded(summary) => Some(summary),
            SummaryOutcome::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SummaryOutcome::Absent)
    }
}

pub struct ResultSummaryParser;

impl ResultSummaryParser {
    /// 尽力解析；任何格式问题都返回 `Absent`，从不报错
    pub fn decode(raw: &str) -> SummaryOutcome {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SummaryOutcome::Absent;
        }

        match serde_json::from_str::<Summary>(trimmed) {
            Ok(summary) => SummaryOutcome::Decoded(summary),
            Err(e) => {
                debug!("结果摘要无法解析，忽略: {}", e);
                SummaryOutcome::Absent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_stats() {
        let outcome =
            ResultSummaryParser::decode(r#"{"count": 3, "min": 1.0, "max": 5.5, "mean": 3.25}"#);
        assert_eq!(
            outcome,
            SummaryOutcome::Decoded(Summary {
                count: 3,
                min: Some(1.0),
                max: Some(5.5),
                mean: Some(3.25),
            })
        );
    }

    #[test]
    fn null_stats_for_empty_column() {
        let summary = ResultSummaryParser::decode(
            r#"{"count": 0, "min": null, "max": null, "mean": null}"#,
        )
        .into_summary()
        .unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
    }

    #[test]
    fn malformed_input_is_absent() {
        for raw in ["{not json", "", "   ", "[1, 2]", r#"{"min": 1.0}"#, "null"] {
            assert!(ResultSummaryParser::decode(raw).is_absent(), "{raw:?}");
        }
    }
}
