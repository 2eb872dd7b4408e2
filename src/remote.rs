use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::RemoteError;

/// The four row collections the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Jobs,
    Reminders,
    Notes,
    Profiles,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Jobs => "jobs",
            Collection::Reminders => "reminders",
            Collection::Notes => "notes",
            Collection::Profiles => "profiles",
        }
    }

    /// Column holding the owning user's id. A profile is keyed by its owner.
    pub fn owner_column(&self) -> &'static str {
        match self {
            Collection::Profiles => "id",
            _ => "user_id",
        }
    }

    /// Projection requested from the backend, including the job label join.
    pub fn projection(&self) -> &'static str {
        match self {
            Collection::Reminders | Collection::Notes => "*,jobs(company,position)",
            _ => "*",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    SelectById,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::SelectById => "select by id",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn newest_first() -> Self {
        Self {
            column: "created_at",
            ascending: false,
        }
    }
}

/// Row-oriented query/mutation interface of the hosted backend.
///
/// Rows travel as JSON objects using the backend's column names. Owner scoping
/// and access rules are enforced on the other side of this trait.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner: Uuid,
        order: Order,
    ) -> Result<Vec<Value>, RemoteError>;

    async fn select_by_id(&self, collection: Collection, id: Uuid) -> Result<Value, RemoteError>;

    /// Insert one row and return it as stored, with server-assigned fields.
    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, RemoteError>;

    /// Apply a partial update to one row and return the row as stored.
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RemoteError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), RemoteError>;
}
