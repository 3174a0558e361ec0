//! 会话令牌存储
//!
//! 令牌保存在共享持久存储的固定键下，"是否登录"只看这个键是否有非空值。
//! 本上下文的写入立即反映到本地订阅者；其它上下文依赖存储变更通知同步。

use crate::error::AppResult;
use crate::infrastructure::{StorageContext, StorageNotice};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 令牌所在的持久化键
pub const TOKEN_KEY: &str = "sb-access-token";

/// 页面跳转能力
///
/// 退出登录必须整页重新加载到登录页，而不是局部刷新状态。
pub trait Navigator: Send + Sync {
    fn hard_reload(&self, path: &str);
}

/// 只记录日志的跳转实现（命令行场景）
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn hard_reload(&self, path: &str) {
        info!("↪️ 重新加载到 {}", path);
    }
}

/// 会话存储
pub struct SessionStore {
    storage: StorageContext,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    authenticated: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(
        storage: StorageContext,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        let initial = read_token(&storage).is_some();
        let (authenticated, _) = watch::channel(initial);
        Self {
            storage,
            navigator,
            login_path: login_path.into(),
            authenticated,
        }
    }

    /// 保存令牌；本上下文立即视为已登录
    pub fn set(&self, token: &str) -> AppResult<()> {
        self.storage.set_item(TOKEN_KEY, token)?;
        debug!("[上下文 {}] 令牌已写入", self.storage.id());
        self.refresh();
        Ok(())
    }

    /// 当前是否持有非空令牌
    pub fn read(&self) -> bool {
        self.token().is_some()
    }

    pub fn token(&self) -> Option<String> {
        read_token(&self.storage)
    }

    /// 删除令牌并整页跳转到登录页
    pub fn remove(&self) -> AppResult<()> {
        self.storage.remove_item(TOKEN_KEY)?;
        self.authenticated.send_replace(false);
        info!("[上下文 {}] 已退出登录", self.storage.id());
        self.navigator.hard_reload(&self.login_path);
        Ok(())
    }

    /// 重新读取存储并发布派生的登录状态
    pub fn refresh(&self) -> bool {
        let authed = self.read();
        self.authenticated.send_if_modified(|current| {
            let changed = *current != authed;
            *current = authed;
            changed
        });
        authed
    }

    /// 订阅本上下文的登录状态
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// 启动跨上下文同步：令牌键的变更或通知丢失时重新读取
    pub fn watch_cross_context(self: &Arc<Self>) -> CrossContextSync {
        let mut events = self.storage.subscribe();
        let store = Arc::clone(self);

        let handle = tokio::spawn(async move {
            while let Some(notice) = events.next().await {
                if !notice.may_affect(TOKEN_KEY) {
                    continue;
                }
                let authed = store.refresh();
                match notice {
                    StorageNotice::Changed(event) => debug!(
                        "[上下文 {}] 收到上下文 {} 的令牌变更，登录状态: {}",
                        store.storage.id(),
                        event.origin,
                        authed
                    ),
                    StorageNotice::Missed(skipped) => debug!(
                        "[上下文 {}] 丢失 {} 条通知，重新读取登录状态: {}",
                        store.storage.id(),
                        skipped,
                        authed
                    ),
                }
            }
        });

        CrossContextSync::from_handle(handle)
    }
}

fn read_token(storage: &StorageContext) -> Option<String> {
    match storage.get_item(TOKEN_KEY) {
        Ok(Some(token)) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(e) => {
            warn!("读取令牌失败，按未登录处理: {}", e);
            None
        }
    }
}

/// 跨上下文同步任务句柄，`stop()` 或 drop 时结束监听
pub struct CrossContextSync {
    handle: Option<JoinHandle<()>>,
}

impl CrossContextSync {
    pub(crate) fn from_handle(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CrossContextSync {
    fn drop(&mut self) {
        self.stop();
    }
}
