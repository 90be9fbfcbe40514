use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::StoreError;
use crate::logging::{log, log_storage_failure, obj, v_str, Domain, Level};

/// Durable string key-value store the history is flushed to.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_ms INTEGER NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_ms = excluded.updated_ms",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

/// In-process store with switchable availability, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    writes: usize,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones share state, so a test can keep a handle after moving the store.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }

    pub fn writes(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().ok().and_then(|i| i.values.get(key).cloned())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(inner.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }
}

struct WriteRequest {
    key: String,
    value: String,
}

/// Hands writes to a background task so a flush never stalls the caller.
///
/// Reads go straight to the wrapped store. Writes are applied in the order
/// they were enqueued; a failed write is logged and dropped. The queue is
/// bounded: while it is full `set` fails with `StoreError::Unavailable`.
pub struct WriteBehindStore<S> {
    inner: Arc<Mutex<S>>,
    tx: mpsc::Sender<WriteRequest>,
}

impl<S> WriteBehindStore<S>
where
    S: KvStore + Send + 'static,
{
    /// Must be called from within a tokio runtime. The returned handle
    /// resolves once every enqueued write has been attempted and all senders
    /// are gone.
    pub fn spawn(store: S, capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let inner = Arc::new(Mutex::new(store));
        let (tx, mut rx) = mpsc::channel::<WriteRequest>(capacity.max(1));
        let writer = Arc::clone(&inner);
        let handle = tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let store = Arc::clone(&writer);
                let key = req.key.clone();
                let res = tokio::task::spawn_blocking(move || {
                    let mut guard = store
                        .lock()
                        .map_err(|_| StoreError::Unavailable("store handle poisoned".to_string()))?;
                    guard.set(&req.key, &req.value)
                })
                .await;
                match res {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => log_storage_failure("set", &key, &err),
                    Err(join_err) => log_storage_failure("set", &key, &join_err),
                }
            }
            log(
                Level::Debug,
                Domain::Storage,
                "writer_stopped",
                obj(&[("msg", v_str("write queue drained"))]),
            );
        });
        (Self { inner, tx }, handle)
    }
}

impl<S: KvStore> KvStore for WriteBehindStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let store = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store handle poisoned".to_string()))?;
        store.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let req = WriteRequest {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.tx.try_send(req).map_err(|err| match err {
            TrySendError::Full(_) => StoreError::Unavailable("write queue full".to_string()),
            TrySendError::Closed(_) => StoreError::Unavailable("writer task stopped".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_set_then_get_overwrites() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "[1]").unwrap();
        store.set("k", "[2]").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn sqlite_without_init_reports_backend_error() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(store.get("k"), Err(StoreError::Backend(_))));
    }

    #[test]
    fn memory_store_offline_rejects_both_directions() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.set_unavailable(true);
        assert!(matches!(store.get("k"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.set("k", "w"), Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn write_behind_applies_writes_in_order() {
        let backing = MemoryStore::new();
        let probe = backing.handle();
        let (mut store, writer) = WriteBehindStore::spawn(backing, 8);
        for i in 0..5 {
            store.set("k", &format!("[{}]", i)).unwrap();
        }
        drop(store);
        writer.await.unwrap();
        assert_eq!(probe.raw("k").as_deref(), Some("[4]"));
        assert_eq!(probe.writes(), 5);
    }

    #[tokio::test]
    async fn write_behind_failure_does_not_surface_to_caller() {
        let backing = MemoryStore::new();
        let probe = backing.handle();
        probe.set_unavailable(true);
        let (mut store, writer) = WriteBehindStore::spawn(backing, 4);
        assert!(store.set("k", "[]").is_ok());
        drop(store);
        writer.await.unwrap();
        assert_eq!(probe.writes(), 0);
    }

    #[tokio::test]
    async fn write_behind_refuses_writes_while_queue_is_full() {
        let backing = MemoryStore::new();
        let probe = backing.handle();
        // current-thread runtime: the writer cannot drain until this task yields
        let (mut store, writer) = WriteBehindStore::spawn(backing, 2);
        store.set("k", "[1]").unwrap();
        store.set("k", "[2]").unwrap();
        assert!(matches!(store.set("k", "[3]"), Err(StoreError::Unavailable(_))));
        drop(store);
        writer.await.unwrap();
        assert_eq!(probe.raw("k").as_deref(), Some("[2]"));
        assert_eq!(probe.writes(), 2);
    }

    #[tokio::test]
    async fn full_queue_defers_history_to_next_batch() {
        use crate::history::{HistoryStore, PersistOutcome};

        let backing = MemoryStore::new();
        let probe = backing.handle();
        let (store, writer) = WriteBehindStore::spawn(backing, 1);
        let mut history = HistoryStore::new(store, "h", 100, 1);
        assert_eq!(history.append_at(1, 1.0).unwrap(), PersistOutcome::Written { samples: 1 });
        assert!(matches!(history.append_at(2, 2.0), Err(StoreError::Unavailable(_))));
        assert_eq!(history.unsaved(), 0);
        assert_eq!(history.len(), 2);
        history.dispose().ok();
        writer.await.unwrap();
        assert_eq!(probe.writes(), 1);
    }
}
