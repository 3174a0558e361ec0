//! 持久化键值存储 - 基础设施层
//!
//! 模拟浏览器同源下共享的持久存储：多个上下文（标签页/进程）共用同一份数据，
//! 任何一个上下文写入后，其它上下文会收到一条变更通知，写入者自己不会收到。

use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// 存储上下文标识
pub type ContextId = u64;

const EVENT_CAPACITY: usize = 64;

/// 存储变更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// 新值，`None` 表示被删除
    pub new_value: Option<String>,
    /// 写入方的上下文
    pub origin: ContextId,
}

/// 订阅方收到的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageNotice {
    Changed(StorageEvent),
    /// 通知积压被丢弃，订阅方需要重新读取关心的键
    Missed(u64),
}

impl StorageNotice {
    /// 是否可能涉及 `key`；丢失的通知无法判断，一律视为涉及
    pub fn may_affect(&self, key: &str) -> bool {
        match self {
            StorageNotice::Changed(event) => event.key == key,
            StorageNotice::Missed(_) => true,
        }
    }
}

/// 持久化键值存储后端
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> AppResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove_item(&self, key: &str) -> AppResult<()>;
}

/// 内存存储，测试和单进程场景使用
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let items = self.items.read().map_err(|e| AppError::storage(key, e))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut items = self.items.write().map_err(|e| AppError::storage(key, e))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        let mut items = self.items.write().map_err(|e| AppError::storage(key, e))?;
        items.remove(key);
        Ok(())
    }
}

/// JSON 文件存储
///
/// 每次读取都直接读文件，因此能看到其它进程写入的值。
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, key: &str) -> AppResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| AppError::storage(key, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::storage(key, e)),
        }
    }

    fn save(&self, key: &str, items: &HashMap<String, String>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, content).map_err(|e| AppError::storage(key, e))
    }

    fn update(&self, key: &str, f: impl FnOnce(&mut HashMap<String, String>)) -> AppResult<()> {
        let _guard = self.write_lock.lock().map_err(|e| AppError::storage(key, e))?;
        let mut items = self.load(key)?;
        f(&mut items);
        self.save(key, &items)
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.load(key)?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.update(key, |items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        self.update(key, |items| {
            items.remove(key);
        })
    }
}

/// 共享存储中心
///
/// 持有后端存储和变更广播通道，为每个上下文分配唯一标识。
pub struct StorageHub {
    backend: Arc<dyn KeyValueStorage>,
    events: broadcast::Sender<StorageEvent>,
    next_context: AtomicU64,
}

impl StorageHub {
    pub fn new(backend: Arc<dyn KeyValueStorage>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            backend,
            events,
            next_context: AtomicU64::new(1),
        })
    }

    /// 打开一个新的上下文（相当于新开一个标签页）
    pub fn open_context(self: &Arc<Self>) -> StorageContext {
        let id = self.next_context.fetch_add(1, Ordering::Relaxed);
        debug!("打开存储上下文 #{}", id);
        StorageContext {
            id,
            hub: Arc::clone(self),
        }
    }

    fn publish(&self, event: StorageEvent) {
        // 没有订阅者时发送失败，属于正常情况
        let _ = self.events.send(event);
    }
}

/// 单个上下文对共享存储的视图
#[derive(Clone)]
pub struct StorageContext {
    id: ContextId,
    hub: Arc<StorageHub>,
}

impl StorageContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        self.hub.backend.get_item(key)
    }

    /// 写入；仅当值真正发生变化时才通知其它上下文
    pub fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let previous = self.hub.backend.get_item(key)?;
        self.hub.backend.set_item(key, value)?;

        if previous.as_deref() != Some(value) {
            self.hub.publish(StorageEvent {
                key: key.to_string(),
                new_value: Some(value.to_string()),
                origin: self.id,
            });
        }
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> AppResult<()> {
        let previous = self.hub.backend.get_item(key)?;
        self.hub.backend.remove_item(key)?;

        if previous.is_some() {
            self.hub.publish(StorageEvent {
                key: key.to_string(),
                new_value: None,
                origin: self.id,
            });
        }
        Ok(())
    }

    /// 订阅其它上下文产生的变更
    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents {
            own_id: self.id,
            rx: self.hub.events.subscribe(),
        }
    }
}

/// 变更通知流，自动过滤本上下文自己的写入
pub struct StorageEvents {
    own_id: ContextId,
    rx: broadcast::Receiver<StorageEvent>,
}

impl StorageEvents {
    /// 等待下一条来自其它上下文的变更；通道关闭时返回 `None`
    pub async fn next(&mut self) -> Option<StorageNotice> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.own_id => continue,
                Ok(event) => return Some(StorageNotice::Changed(event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("存储变更通知积压，丢失 {} 条", skipped);
                    return Some(StorageNotice::Missed(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn writer_does_not_receive_its_own_event() {
        let hub = StorageHub::new(Arc::new(MemoryStorage::new()));
        let a = hub.open_context();
        let b = hub.open_context();
        let mut a_events = a.subscribe();
        let mut b_events = b.subscribe();

        a.set_item("k", "v").unwrap();

        let Some(StorageNotice::Changed(event)) = b_events.next().await else {
            panic!("b 应收到变更通知");
        };
        assert_eq!(event.key, "k");
        assert_eq!(event.new_value.as_deref(), Some("v"));
        assert_eq!(event.origin, a.id());

        let own = tokio::time::timeout(Duration::from_millis(50), a_events.next()).await;
        assert!(own.is_err(), "写入者不应收到自己的通知");
    }

    #[tokio::test]
    async fn unchanged_value_is_not_broadcast() {
        let hub = StorageHub::new(Arc::new(MemoryStorage::new()));
        let a = hub.open_context();
        let b = hub.open_context();
        a.set_item("k", "v").unwrap();

        let mut b_events = b.subscribe();
        a.set_item("k", "v").unwrap();
        a.remove_item("missing").unwrap();

        let next = tokio::time::timeout(Duration::from_millis(50), b_events.next()).await;
        assert!(next.is_err());
        assert_eq!(b.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_told_it_missed_events() {
        let hub = StorageHub::new(Arc::new(MemoryStorage::new()));
        let a = hub.open_context();
        let b = hub.open_context();
        let mut b_events = b.subscribe();

        for i in 0..EVENT_CAPACITY + 3 {
            a.set_item("theme", &i.to_string()).unwrap();
        }

        let notice = b_events.next().await.unwrap();
        assert_eq!(notice, StorageNotice::Missed(3));
        assert!(notice.may_affect("sb-access-token"));

        // 积压之后仍能继续收到剩余的通知
        let Some(StorageNotice::Changed(event)) = b_events.next().await else {
            panic!("积压之后应继续收到通知");
        };
        assert_eq!(event.new_value.as_deref(), Some("3"));
        assert!(!StorageNotice::Changed(event).may_affect("sb-access-token"));
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "dataset-client-storage-{}-{}.json",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        let first = FileStorage::new(&path);
        first.set_item("sb-access-token", "abc").unwrap();
        first.set_item("other", "1").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(second.get_item("sb-access-token").unwrap().as_deref(), Some("abc"));

        second.remove_item("sb-access-token").unwrap();
        assert_eq!(first.get_item("sb-access-token").unwrap(), None);
        assert_eq!(first.get_item("other").unwrap().as_deref(), Some("1"));

        let _ = std::fs::remove_file(&path);
    }
}
