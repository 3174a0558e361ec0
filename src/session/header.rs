//! 页头的登录状态展示
//!
//! 已登录时尝试通过 `/me` 查询邮箱；查询失败只影响显示文本，不影响登录状态。
//! 登录状态每次变化（包括来自其它上下文的变化）都会重新计算展示内容。

use crate::clients::ApiClient;
use crate::session::CrossContextSync;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// 页头展示的登录信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthDisplay {
    pub authenticated: bool,
    pub email: Option<String>,
}

impl AuthDisplay {
    pub fn label(&self) -> &str {
        match (&self.email, self.authenticated) {
            (_, false) => "Login",
            (Some(email), true) => email.as_str(),
            (None, true) => "Signed in",
        }
    }
}

pub struct AuthHeader {
    api: Arc<ApiClient>,
    display: watch::Sender<AuthDisplay>,
}

impl AuthHeader {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (display, _) = watch::channel(AuthDisplay::default());
        Self { api, display }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthDisplay> {
        self.display.subscribe()
    }

    /// 跟随会话的登录状态：立即计算一次，之后每次变化都重新计算
    pub fn follow_session(self: &Arc<Self>) -> CrossContextSync {
        let mut authenticated = self.api.auth().session().subscribe();
        let header = Arc::clone(self);

        let handle = tokio::spawn(async move {
            header.refresh().await;
            while authenticated.changed().await.is_ok() {
                let auth_display = header.refresh().await;
                debug!("页头更新: {}", auth_display.label());
            }
        });

        CrossContextSync::from_handle(handle)
    }

    /// 重新读取令牌，计算并发布展示内容
    pub async fn refresh(&self) -> AuthDisplay {
        let display = self.compute().await;
        self.display.send_replace(display.clone());
        display
    }

    async fn compute(&self) -> AuthDisplay {
        if !self.api.auth().session().read() {
            return AuthDisplay::default();
        }

        let email = match self.api.current_user().await {
            Ok(profile) => profile.email,
            Err(e) => {
                debug!("查询当前用户失败: {}", e);
                None
            }
        };

        AuthDisplay {
            authenticated: true,
            email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(AuthDisplay::default().label(), "Login");
        let signed_in = AuthDisplay {
            authenticated: true,
            email: None,
        };
        assert_eq!(signed_in.label(), "Signed in");
        let with_email = AuthDisplay {
            authenticated: true,
            email: Some("ana@example.test".to_string()),
        };
        assert_eq!(with_email.label(), "ana@example.test");
    }
}
