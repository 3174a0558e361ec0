use serde::{Deserialize, Serialize};

/// 数据集列表项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} ({})", self.id, self.name, self.region)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    #[serde(default)]
    pub non_null: u64,
}

/// 数据集预览（前若干行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub stored_path: String,
}

impl DatasetPreview {
    /// 取出某行某列的显示文本，缺失时为空串
    pub fn cell(&self, row: usize, column: &str) -> String {
        match self.data.get(row).and_then(|r| r.get(column)) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// 数据集下的原始文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub file_id: String,
    pub stored_path: String,
    pub original_name: String,
    pub bytes: u64,
}

/// 时间序列图的查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeseriesQuery {
    pub y: String,
    pub time_col: String,
    pub resample: String,
}

impl Default for TimeseriesQuery {
    fn default() -> Self {
        Self {
            y: "temperature".to_string(),
            time_col: "time".to_string(),
            resample: "D".to_string(),
        }
    }
}

/// `GET /me` 返回的当前用户
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
