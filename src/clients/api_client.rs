/// 数据集 API 客户端
///
/// 封装所有与后端 API 相关的调用逻辑：数据集浏览、任务提交和状态查询
use crate::clients::AuthenticatedRequestBuilder;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{HttpRequest, HttpResponse, HttpTransport};
use crate::models::{
    Dataset, DatasetFile, DatasetPreview, EnqueueResponse, ErrorBody, JobStatusResponse,
    TimeseriesQuery, UserProfile,
};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// 任务的日志和结果下载地址，只由任务 ID 决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLinks {
    pub logs_url: String,
    pub result_url: String,
}

pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    auth: AuthenticatedRequestBuilder,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        auth: AuthenticatedRequestBuilder,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            auth,
        }
    }

    pub fn auth(&self) -> &AuthenticatedRequestBuilder {
        &self.auth
    }

    /// 由路径段拼出完整地址；每一段都单独转义，ID 中的 `/`、`?`、`#` 不会改变路由
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let invalid = |reason: String| {
            AppError::Config(format!("无效的 API 地址 {}: {}", self.base_url, reason))
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("不能作为基础地址".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_with_query(&self, segments: &[&str], params: &[(&str, &str)]) -> AppResult<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// 获取数据集列表
    pub async fn list_datasets(&self) -> AppResult<Vec<Dataset>> {
        let url = self.endpoint(&["datasets"])?;
        self.get_json(HttpRequest::get(url)).await
    }

    /// 获取数据集预览；服务端返回的错误对象会以其 `detail` 报告
    pub async fn dataset_preview(&self, dataset_id: &str) -> AppResult<DatasetPreview> {
        let url = self.endpoint(&["datasets", dataset_id, "preview"])?;
        let value: serde_json::Value = self.get_json(HttpRequest::get(url)).await?;

        if value.get("columns").is_none() {
            let body: ErrorBody = serde_json::from_value(value)?;
            return Err(AppError::Request {
                endpoint: format!("/datasets/{}/preview", dataset_id),
                status: 200,
                message: body
                    .detail_text()
                    .unwrap_or_else(|| "Preview unavailable".to_string()),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn dataset_files(&self, dataset_id: &str) -> AppResult<Vec<DatasetFile>> {
        let url = self.endpoint(&["datasets", dataset_id, "files"])?;
        self.get_json(HttpRequest::get(url)).await
    }

    /// GeoJSON 原样返回，由地图渲染方解释
    pub async fn dataset_geojson(&self, dataset_id: &str) -> AppResult<serde_json::Value> {
        let url = self.endpoint(&["datasets", dataset_id, "geojson"])?;
        let value: serde_json::Value = self.get_json(HttpRequest::get(url)).await?;

        if let Some(detail) = value.get("detail") {
            let message = detail
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| detail.to_string());
            return Err(AppError::Request {
                endpoint: format!("/datasets/{}/geojson", dataset_id),
                status: 200,
                message,
            });
        }
        Ok(value)
    }

    /// 时间序列图片地址（直接作为图片引用，不在这里下载）
    pub fn timeseries_url(&self, dataset_id: &str, query: &TimeseriesQuery) -> AppResult<String> {
        let url = self.endpoint_with_query(
            &["datasets", dataset_id, "timeseries"],
            &[
                ("y", query.y.as_str()),
                ("time_col", query.time_col.as_str()),
                ("resample", query.resample.as_str()),
            ],
        )?;
        Ok(url.into())
    }

    /// 提交任务（需要身份）
    pub async fn enqueue_job(&self, dataset_id: &str, y: &str) -> AppResult<EnqueueResponse> {
        let url = self.endpoint_with_query(&["jobs"], &[("dataset_id", dataset_id), ("y", y)])?;
        let request = self.auth.decorate(&HttpRequest::post(url))?;
        self.get_json(request).await
    }

    /// 查询任务状态（公开接口，不附带身份）
    pub async fn job_status(&self, job_id: &str) -> AppResult<JobStatusResponse> {
        let url = self.endpoint(&["jobs", job_id])?;
        self.get_json(HttpRequest::get(url)).await
    }

    pub fn job_links(&self, job_id: &str) -> AppResult<JobLinks> {
        Ok(JobLinks {
            logs_url: self.endpoint(&["jobs", job_id, "logs"])?.into(),
            result_url: self.endpoint(&["jobs", job_id, "result"])?.into(),
        })
    }

    /// 查询当前用户，只使用 Bearer 令牌
    pub async fn current_user(&self) -> AppResult<UserProfile> {
        let token = self
            .auth
            .session()
            .token()
            .ok_or(AppError::NotAuthenticated)?;
        let mut request = HttpRequest::get(self.endpoint(&["me"])?);
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| AppError::storage(crate::session::TOKEN_KEY, e))?;
        request.headers.insert(AUTHORIZATION, value);
        self.get_json(request).await
    }

    /// 发送请求并解析 JSON；非成功状态转换为 `AppError::Request`
    async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> AppResult<T> {
        let endpoint = request.path().to_string();
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let message = failure_message(&response);
            warn!("{} 返回 {}: {}", endpoint, response.status, message);
            return Err(AppError::Request {
                endpoint,
                status: response.status,
                message,
            });
        }

        debug!("{} 返回 {} 字节", endpoint, response.body.len());
        response.json()
    }
}

/// 失败响应的展示文本：优先使用服务端的 `detail`，否则 `Failed (<status>)`
pub fn failure_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.detail_text())
        .unwrap_or_else(|| format!("Failed ({})", response.status))
}
