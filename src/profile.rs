use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Profile, ProfilePatch};
use crate::notify::{Notification, Notifier};
use crate::remote::{Collection, RemoteDataService};
use crate::resource::{Entity, FetchScope, Resource};
use crate::session::Session;
use crate::store::{Keyed, LoadPhase};

impl Keyed for Profile {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Entity for Profile {
    const COLLECTION: Collection = Collection::Profiles;
    const SINGULAR: &'static str = "profile";
    const PLURAL: &'static str = "profile";
    const SCOPE: FetchScope = FetchScope::OwnRow;
}

/// The signed-in user's own profile row.
#[derive(Clone)]
pub struct ProfileHook {
    resource: Resource<Profile>,
}

impl ProfileHook {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        session: Session,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resource: Resource::new(remote, session, notifier),
        }
    }

    pub fn profile(&self) -> Option<Profile> {
        self.resource.items().into_iter().next()
    }

    pub fn is_loading(&self) -> bool {
        self.resource.is_loading()
    }

    pub fn phase(&self) -> LoadPhase {
        self.resource.phase()
    }

    pub async fn fetch(&self) -> Result<()> {
        self.resource.fetch().await
    }

    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        self.resource.spawn_refresh()
    }

    pub async fn update(&self, patch: &ProfilePatch) -> Result<Profile> {
        if patch.is_empty() {
            return Err(Error::Invalid("nothing to update".to_string()));
        }
        let identity = self.resource.require_identity()?;
        self.resource
            .update(
                identity.user_id,
                patch,
                Notification::success("Profile updated successfully!"),
            )
            .await
    }

    /// Full name when set, otherwise "User".
    pub fn display_name(&self) -> String {
        self.profile()
            .and_then(|p| p.full_name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "User".to_string())
    }
}
