//! Test doubles shared by the hook tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::db::Database;
use crate::error::RemoteError;
use crate::notify::{NotificationLog, Notifier};
use crate::remote::{Collection, Operation, Order, RemoteDataService};
use crate::session::{Identity, Session};

type Call = (Collection, Operation);

#[derive(Default)]
struct Script {
    failures: HashSet<Call>,
    delays: HashMap<Call, VecDeque<Duration>>,
}

/// Wraps the in-memory database and lets a test fail or slow down single calls.
/// A scripted failure never reaches the database. A delay is applied after the
/// database has answered, so it models a slow response rather than a slow write.
pub struct ScriptedRemote {
    inner: Arc<Database>,
    script: Mutex<Script>,
}

impl ScriptedRemote {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            script: Mutex::new(Script::default()),
        }
    }

    /// Make the next call of this kind fail.
    pub fn fail_once(&self, collection: Collection, operation: Operation) {
        self.lock().failures.insert((collection, operation));
    }

    /// Hold back the response of the next call of this kind.
    pub fn delay_next(&self, collection: Collection, operation: Operation, delay: Duration) {
        self.lock()
            .delays
            .entry((collection, operation))
            .or_default()
            .push_back(delay);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, collection: Collection, operation: Operation) -> Result<(), RemoteError> {
        if self.lock().failures.remove(&(collection, operation)) {
            return Err(RemoteError::new(collection, operation, "scripted failure"));
        }
        Ok(())
    }

    async fn hold(&self, collection: Collection, operation: Operation) {
        let delay = self
            .lock()
            .delays
            .get_mut(&(collection, operation))
            .and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteDataService for ScriptedRemote {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner: Uuid,
        order: Order,
    ) -> Result<Vec<Value>, RemoteError> {
        self.take_failure(collection, Operation::Select)?;
        let result = self.inner.select_by_owner(collection, owner, order).await;
        self.hold(collection, Operation::Select).await;
        result
    }

    async fn select_by_id(&self, collection: Collection, id: Uuid) -> Result<Value, RemoteError> {
        self.take_failure(collection, Operation::SelectById)?;
        let result = self.inner.select_by_id(collection, id).await;
        self.hold(collection, Operation::SelectById).await;
        result
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, RemoteError> {
        self.take_failure(collection, Operation::Insert)?;
        let result = self.inner.insert(collection, row).await;
        self.hold(collection, Operation::Insert).await;
        result
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        self.take_failure(collection, Operation::Update)?;
        let result = self.inner.update(collection, id, patch).await;
        self.hold(collection, Operation::Update).await;
        result
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), RemoteError> {
        self.take_failure(collection, Operation::Delete)?;
        let result = self.inner.delete(collection, id).await;
        self.hold(collection, Operation::Delete).await;
        result
    }
}

/// Everything a hook needs, wired to an in-memory database with alice signed in.
pub struct Harness {
    pub db: Arc<Database>,
    pub scripted: Arc<ScriptedRemote>,
    pub session: Session,
    pub log: Arc<NotificationLog>,
    pub alice: Identity,
}

impl Harness {
    pub fn new() -> Self {
        let session = Session::new();
        let db = Arc::new(Database::open_in_memory(session.clone()).unwrap());
        let alice = db.sign_in("alice@example.com", Some("Alice Example")).unwrap();
        Self {
            scripted: Arc::new(ScriptedRemote::new(Arc::clone(&db))),
            db,
            session,
            log: Arc::new(NotificationLog::new()),
            alice,
        }
    }

    pub fn remote(&self) -> Arc<dyn RemoteDataService> {
        self.scripted.clone()
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.log.clone()
    }
}

/// Poll until `check` holds, letting spawned tasks run in between.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}
