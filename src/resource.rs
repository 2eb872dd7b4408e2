use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, RemoteError, Result};
use crate::notify::{Notification, Notifier};
use crate::remote::{Collection, Operation, Order, RemoteDataService};
use crate::session::{Identity, Session};
use crate::store::{Keyed, LoadPhase, ResourceStore};

/// How a resource finds the current user's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// Every row whose owner column matches the user, newest first.
    Owned,
    /// The single row whose id is the user's id.
    OwnRow,
}

pub trait Entity: Keyed + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;
    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    const SCOPE: FetchScope = FetchScope::Owned;
}

#[derive(Serialize)]
struct Owned<'a, D> {
    user_id: Uuid,
    #[serde(flatten)]
    fields: &'a D,
}

/// Build an insert row tagged with its owner.
pub(crate) fn owned_row<D: Serialize>(owner: Uuid, fields: &D) -> Result<Value> {
    serde_json::to_value(Owned {
        user_id: owner,
        fields,
    })
    .map_err(|e| Error::Invalid(e.to_string()))
}

pub(crate) fn decode<T: Entity>(operation: Operation, row: Value) -> Result<T, RemoteError> {
    serde_json::from_value(row).map_err(|e| {
        RemoteError::new(T::COLLECTION, operation, format!("unexpected row shape: {}", e))
    })
}

/// The fetch/create/update/delete unit for one entity type.
///
/// Holds the authoritative list for the signed-in user, reconciles it after
/// every successful remote write, and reports each outcome through the
/// notifier. Failures are logged, surfaced once as a destructive
/// notification, and returned to the caller; they are never retried.
pub struct Resource<T: Entity> {
    remote: Arc<dyn RemoteDataService>,
    session: Session,
    notifier: Arc<dyn Notifier>,
    store: Arc<ResourceStore<T>>,
}

impl<T: Entity> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            session: self.session.clone(),
            notifier: Arc::clone(&self.notifier),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: Entity> Resource<T> {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        session: Session,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            remote,
            session,
            notifier,
            store: Arc::new(ResourceStore::new()),
        }
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteDataService> {
        &self.remote
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn items(&self) -> Vec<T> {
        self.store.items()
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.store.get(id)
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn phase(&self) -> LoadPhase {
        self.store.phase()
    }

    pub(crate) fn require_identity(&self) -> Result<Identity> {
        self.session.current().ok_or(Error::SignedOut)
    }

    /// Reload the list for the signed-in user.
    ///
    /// Results that come back after the identity changed are dropped, and the
    /// previous user's list goes with them.
    pub async fn fetch(&self) -> Result<()> {
        let Some(identity) = self.session.current() else {
            self.store.reset();
            return Ok(());
        };
        let issued_for = self.session.generation();

        self.store.begin_fetch();
        let result = self.load(&identity).await;

        if self.session.generation() != issued_for {
            tracing::debug!(
                collection = %T::COLLECTION,
                user = %identity.user_id,
                "dropping fetch issued for a previous identity"
            );
            self.store.abandon_fetch(issued_for);
            return Ok(());
        }

        match result {
            Ok(items) => {
                self.store.finish_fetch(issued_for, items);
                Ok(())
            }
            Err(err) => {
                tracing::error!(collection = %T::COLLECTION, error = %err, "Error fetching {}", T::PLURAL);
                self.notifier.notify(Notification::destructive(
                    &format!("Error fetching {}", T::PLURAL),
                    "Please try again later.",
                ));
                self.store.fail_fetch(issued_for);
                Err(err.into())
            }
        }
    }

    async fn load(&self, identity: &Identity) -> Result<Vec<T>, RemoteError> {
        let rows = match T::SCOPE {
            FetchScope::Owned => {
                self.remote
                    .select_by_owner(T::COLLECTION, identity.user_id, Order::newest_first())
                    .await?
            }
            FetchScope::OwnRow => vec![
                self.remote
                    .select_by_id(T::COLLECTION, identity.user_id)
                    .await?,
            ],
        };
        rows.into_iter()
            .map(|row| decode(Operation::Select, row))
            .collect()
    }

    /// True if the identity changed while a write issued at `issued_for` was in flight.
    fn switched_since(&self, issued_for: u64, operation: Operation, id: Uuid) -> bool {
        if self.session.generation() == issued_for {
            return false;
        }
        tracing::debug!(
            collection = %T::COLLECTION,
            %operation,
            %id,
            "dropping write response issued for a previous identity"
        );
        true
    }

    /// Insert one row owned by the signed-in user and put it at the front of the list.
    ///
    /// If the identity changes before the row comes back, the row is returned
    /// but neither listed nor announced.
    pub async fn create<D, F>(&self, fields: &D, success: F) -> Result<T>
    where
        D: Serialize + Sync,
        F: FnOnce(&T) -> Notification + Send,
    {
        let identity = self.require_identity()?;
        let issued_for = self.session.generation();
        let row = owned_row(identity.user_id, fields)?;
        let ticket = self.store.ticket();

        let result = self
            .remote
            .insert(T::COLLECTION, row)
            .await
            .and_then(|row| decode::<T>(Operation::Insert, row));

        match result {
            Ok(entity) => {
                if self.switched_since(issued_for, Operation::Insert, entity.key()) {
                    return Ok(entity);
                }
                if !self.store.prepend(ticket, entity.clone()) {
                    tracing::debug!(collection = %T::COLLECTION, id = %entity.key(), "dropping stale insert response");
                }
                self.notifier.notify(success(&entity));
                Ok(entity)
            }
            Err(err) => Err(self.report(Operation::Insert, err)),
        }
    }

    /// Send a partial update and swap the echoed row into the list.
    pub async fn update<P>(&self, id: Uuid, patch: &P, success: Notification) -> Result<T>
    where
        P: Serialize + Sync,
    {
        let patch = serde_json::to_value(patch).map_err(|e| Error::Invalid(e.to_string()))?;
        let issued_for = self.session.generation();
        let ticket = self.store.ticket();

        let result = self
            .remote
            .update(T::COLLECTION, id, patch)
            .await
            .and_then(|row| decode::<T>(Operation::Update, row));

        match result {
            Ok(entity) => {
                if self.switched_since(issued_for, Operation::Update, id) {
                    return Ok(entity);
                }
                if !self.store.replace(ticket, entity.clone()) {
                    tracing::debug!(collection = %T::COLLECTION, %id, "dropping stale update response");
                }
                self.notifier.notify(success);
                Ok(entity)
            }
            Err(err) => Err(self.report(Operation::Update, err)),
        }
    }

    pub async fn delete(&self, id: Uuid, success: Notification) -> Result<()> {
        let issued_for = self.session.generation();
        let ticket = self.store.ticket();

        match self.remote.delete(T::COLLECTION, id).await {
            Ok(()) => {
                if self.switched_since(issued_for, Operation::Delete, id) {
                    return Ok(());
                }
                if !self.store.remove(ticket, id) {
                    tracing::debug!(collection = %T::COLLECTION, %id, "dropping stale delete response");
                }
                self.notifier.notify(success);
                Ok(())
            }
            Err(err) => Err(self.report(Operation::Delete, err)),
        }
    }

    fn report(&self, operation: Operation, err: RemoteError) -> Error {
        let verb = match operation {
            Operation::Insert => "adding",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
            Operation::Select | Operation::SelectById => "fetching",
        };
        tracing::error!(
            collection = %T::COLLECTION,
            %operation,
            error = %err,
            "Error {} {}",
            verb,
            T::SINGULAR
        );
        self.notifier.notify(Notification::destructive(
            &format!("Error {} {}", verb, T::SINGULAR),
            "Please try again.",
        ));
        err.into()
    }

    /// Fetch now, then again every time the signed-in user changes. The list is
    /// cleared before each re-fetch so the previous user's rows never linger.
    pub async fn follow_session(&self) {
        let mut rx = self.session.subscribe();
        let mut seen = rx.borrow_and_update().generation;
        let _ = self.fetch().await;

        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().generation;
            if current == seen {
                continue;
            }
            seen = current;
            self.store.reset();
            let _ = self.fetch().await;
        }
    }

    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let hook = self.clone();
        tokio::spawn(async move { hook.follow_session().await })
    }
}
