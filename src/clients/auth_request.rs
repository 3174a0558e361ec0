//! 带身份的请求构造
//!
//! 有令牌时附带 `Authorization: Bearer <token>`；没有令牌时，只有在开发
//! 模式下才附带固定的开发身份头，生产配置下直接拒绝发送。

use crate::error::{AppError, AppResult};
use crate::infrastructure::HttpRequest;
use crate::session::SessionStore;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::debug;

/// 开发身份头
pub const DEV_EMAIL_HEADER: &str = "x-dev-email";

pub struct AuthenticatedRequestBuilder {
    session: Arc<SessionStore>,
    dev_identity: Option<String>,
}

impl AuthenticatedRequestBuilder {
    /// `dev_identity` 只应在开发配置下传入
    pub fn new(session: Arc<SessionStore>, dev_identity: Option<String>) -> Self {
        Self {
            session,
            dev_identity,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// 返回附加了身份头的新请求，不修改调用方传入的请求
    pub fn decorate(&self, request: &HttpRequest) -> AppResult<HttpRequest> {
        let mut decorated = request.clone();
        let dev_header = HeaderName::from_static(DEV_EMAIL_HEADER);

        // 每次都重新读取存储，不缓存登录状态
        match self.session.token() {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| AppError::storage(crate::session::TOKEN_KEY, e))?;
                decorated.headers.remove(&dev_header);
                decorated.headers.insert(AUTHORIZATION, value);
                debug!("{} 使用 Bearer 令牌", request.path());
            }
            None => {
                let email = self
                    .dev_identity
                    .as_deref()
                    .ok_or(AppError::NotAuthenticated)?;
                let value = HeaderValue::from_str(email)
                    .map_err(|e| AppError::Config(format!("DEV_EMAIL 无效: {}", e)))?;
                decorated.headers.remove(AUTHORIZATION);
                decorated.headers.insert(dev_header, value);
                debug!("{} 使用开发身份 {}", request.path(), email);
            }
        }

        Ok(decorated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{MemoryStorage, StorageHub};
    use crate::session::LogNavigator;
    use reqwest::header::CONTENT_TYPE;

    fn builder(dev_identity: Option<&str>) -> AuthenticatedRequestBuilder {
        let hub = StorageHub::new(Arc::new(MemoryStorage::new()));
        let session = SessionStore::new(hub.open_context(), Arc::new(LogNavigator), "/login");
        AuthenticatedRequestBuilder::new(Arc::new(session), dev_identity.map(str::to_string))
    }

    #[test]
    fn without_token_uses_dev_identity() {
        let builder = builder(Some("dev@local.test"));
        let request = HttpRequest::post("http://localhost:8000/jobs?dataset_id=1&y=temperature");

        let decorated = builder.decorate(&request).unwrap();

        assert_eq!(decorated.headers.get(DEV_EMAIL_HEADER).unwrap(), "dev@local.test");
        assert!(decorated.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn with_token_uses_bearer_only() {
        let builder = builder(Some("dev@local.test"));
        builder.session().set("abc").unwrap();
        let request = HttpRequest::post("http://localhost:8000/jobs");

        let decorated = builder.decorate(&request).unwrap();

        assert_eq!(decorated.headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert!(decorated.headers.get(DEV_EMAIL_HEADER).is_none());
    }

    #[test]
    fn caller_headers_are_left_untouched() {
        let builder = builder(None);
        builder.session().set("abc").unwrap();
        let mut request = HttpRequest::post("http://localhost:8000/jobs");
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let decorated = builder.decorate(&request).unwrap();

        assert_eq!(request.headers.len(), 1);
        assert!(request.headers.get(AUTHORIZATION).is_none());
        assert_eq!(decorated.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(decorated.headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn production_without_token_is_refused() {
        let builder = builder(None);
        let request = HttpRequest::post("http://localhost:8000/jobs");

        let err = builder.decorate(&request).unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));
    }

    #[test]
    fn token_is_reread_on_every_call() {
        let builder = builder(Some("dev@local.test"));
        let request = HttpRequest::get("http://localhost:8000/me");

        builder.session().set("first").unwrap();
        let first = builder.decorate(&request).unwrap();
        builder.session().set("second").unwrap();
        let second = builder.decorate(&request).unwrap();

        assert_eq!(first.headers.get(AUTHORIZATION).unwrap(), "Bearer first");
        assert_eq!(second.headers.get(AUTHORIZATION).unwrap(), "Bearer second");
    }
}
