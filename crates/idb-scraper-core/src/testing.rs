//! In-memory page channel for engine tests
//!
//! Models one origin's databases and answers storage requests with the same
//! envelopes the in-page scripts produce, including injected failures and
//! hangs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::channel::StorageChannel;
use crate::error::ChannelError;
use crate::protocol::{FailureKind, ScriptReply, StorageRequest};

const HANG: Duration = Duration::from_secs(3600);

#[derive(Clone)]
enum OpenBehavior {
    Normal,
    Fail(String),
    Hang,
    SchemaReadFails(String),
}

#[derive(Clone)]
enum StoreBehavior {
    Records,
    TransactionFails(String),
    ScanFails(String),
    Hang,
    Reply(Value),
}

#[derive(Clone)]
pub struct FakeStore {
    records: Vec<(Value, Value)>,
    behavior: StoreBehavior,
}

impl FakeStore {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            behavior: StoreBehavior::Records,
        }
    }

    pub fn with_record(mut self, key: Value, value: Value) -> Self {
        self.records.push((key, value));
        self
    }

    pub fn failing_transaction(mut self, message: &str) -> Self {
        self.behavior = StoreBehavior::TransactionFails(message.to_string());
        self
    }

    pub fn failing_scan(mut self, message: &str) -> Self {
        self.behavior = StoreBehavior::ScanFails(message.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.behavior = StoreBehavior::Hang;
        self
    }

    pub fn replying(mut self, raw: Value) -> Self {
        self.behavior = StoreBehavior::Reply(raw);
        self
    }
}

#[derive(Clone)]
pub struct FakeDatabase {
    open: OpenBehavior,
    stores: Vec<(String, FakeStore)>,
}

impl FakeDatabase {
    fn new() -> Self {
        Self {
            open: OpenBehavior::Normal,
            stores: Vec::new(),
        }
    }

    pub fn with_store(mut self, name: &str, build: impl FnOnce(FakeStore) -> FakeStore) -> Self {
        self.stores.push((name.to_string(), build(FakeStore::new())));
        self
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.open = OpenBehavior::Fail(message.to_string());
        self
    }

    pub fn failing_schema_read(mut self, message: &str) -> Self {
        self.open = OpenBehavior::SchemaReadFails(message.to_string());
        self
    }

    pub fn hanging_open(mut self) -> Self {
        self.open = OpenBehavior::Hang;
        self
    }

    fn store(&self, name: &str) -> Option<&FakeStore> {
        self.stores.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }
}

/// Open connection; closed when dropped, including on cancellation
struct Connection {
    open: Arc<AtomicUsize>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeOrigin {
    databases: Vec<(String, FakeDatabase)>,
    enumeration: bool,
    broken: bool,
    open: Arc<AtomicUsize>,
    log: Mutex<Vec<StorageRequest>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        Self {
            databases: Vec::new(),
            enumeration: true,
            broken: false,
            open: Arc::new(AtomicUsize::new(0)),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_database(
        mut self,
        name: &str,
        build: impl FnOnce(FakeDatabase) -> FakeDatabase,
    ) -> Self {
        self.databases
            .push((name.to_string(), build(FakeDatabase::new())));
        self
    }

    pub fn without_enumeration(mut self) -> Self {
        self.enumeration = false;
        self
    }

    pub fn with_broken_channel(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Connections currently open; zero once every call has returned
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StorageRequest> {
        self.log.lock().clone()
    }

    fn database(&self, name: &str) -> Option<&FakeDatabase> {
        self.databases.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    async fn connect(&self, name: &str) -> Result<(Connection, &FakeDatabase), ScriptReply> {
        let Some(db) = self.database(name) else {
            return Err(ScriptReply::error(
                FailureKind::Open,
                "Could not open database: AbortError",
            ));
        };

        match &db.open {
            OpenBehavior::Fail(message) => {
                return Err(ScriptReply::error(FailureKind::Open, message.clone()))
            }
            OpenBehavior::Hang => {
                tokio::time::sleep(HANG).await;
            }
            OpenBehavior::Normal | OpenBehavior::SchemaReadFails(_) => {}
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        let connection = Connection {
            open: Arc::clone(&self.open),
        };
        Ok((connection, db))
    }

    async fn list_object_stores(&self, name: &str) -> ScriptReply {
        let (_connection, db) = match self.connect(name).await {
            Ok(opened) => opened,
            Err(reply) => return reply,
        };

        if let OpenBehavior::SchemaReadFails(message) = &db.open {
            return ScriptReply::error(FailureKind::SchemaRead, message.clone());
        }

        let names: Vec<&str> = db.stores.iter().map(|(n, _)| n.as_str()).collect();
        ScriptReply::ok(json!(names))
    }

    async fn extract_store(&self, name: &str, store: &str) -> Result<Value, ChannelError> {
        let (_connection, db) = match self.connect(name).await {
            Ok(opened) => opened,
            Err(reply) => return Ok(reply.to_value()),
        };

        let Some(store) = db.store(store) else {
            return Ok(ScriptReply::error(FailureKind::Transaction, "NotFoundError").to_value());
        };

        let reply = match &store.behavior {
            StoreBehavior::Records => {
                let keys: Vec<&Value> = store.records.iter().map(|(k, _)| k).collect();
                let values: Vec<&Value> = store.records.iter().map(|(_, v)| v).collect();
                ScriptReply::ok(json!({ "keys": keys, "values": values }))
            }
            StoreBehavior::TransactionFails(message) => {
                ScriptReply::error(FailureKind::Transaction, message.clone())
            }
            StoreBehavior::ScanFails(message) => {
                ScriptReply::error(FailureKind::Scan, message.clone())
            }
            StoreBehavior::Hang => {
                tokio::time::sleep(HANG).await;
                ScriptReply::ok(json!({ "keys": [], "values": [] }))
            }
            StoreBehavior::Reply(raw) => return Ok(raw.clone()),
        };

        Ok(reply.to_value())
    }
}

#[async_trait]
impl StorageChannel for FakeOrigin {
    async fn request(
        &self,
        request: &StorageRequest,
        _operation_timeout: Option<Duration>,
    ) -> Result<Value, ChannelError> {
        self.log.lock().push(request.clone());

        if self.broken {
            return Err(ChannelError::Closed);
        }

        match request {
            StorageRequest::ListDatabases => {
                if !self.enumeration {
                    return Ok(ScriptReply::error(
                        FailureKind::Unavailable,
                        "indexedDB.databases() not supported",
                    )
                    .to_value());
                }
                let names: Vec<&str> = self.databases.iter().map(|(n, _)| n.as_str()).collect();
                Ok(ScriptReply::ok(json!(names)).to_value())
            }
            StorageRequest::ListObjectStores { database } => {
                Ok(self.list_object_stores(database).await.to_value())
            }
            StorageRequest::ExtractStore { database, store } => {
                self.extract_store(database, store).await
            }
        }
    }
}
