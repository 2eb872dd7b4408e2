use uuid::Uuid;

use crate::remote::{Collection, Operation};

/// Any failure reported by the remote data service. Permission, validation and
/// transport failures all land here unclassified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{operation} on {collection} failed: {message}")]
pub struct RemoteError {
    pub collection: Collection,
    pub operation: Operation,
    pub message: String,
}

impl RemoteError {
    pub fn new(collection: Collection, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            collection,
            operation,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("not signed in")]
    SignedOut,

    #[error("{0} is not in the loaded list")]
    NotLoaded(Uuid),

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
