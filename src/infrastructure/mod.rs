pub mod storage;
pub mod transport;

pub use storage::{
    ContextId, FileStorage, KeyValueStorage, MemoryStorage, StorageContext, StorageEvent,
    StorageEvents, StorageHub, StorageNotice,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
