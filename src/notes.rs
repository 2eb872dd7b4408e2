use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Note, NoteDraft, NotePatch};
use crate::notify::{Notification, Notifier};
use crate::remote::{Collection, RemoteDataService};
use crate::resource::{Entity, Resource};
use crate::session::Session;
use crate::store::{Keyed, LoadPhase};

impl Keyed for Note {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Entity for Note {
    const COLLECTION: Collection = Collection::Notes;
    const SINGULAR: &'static str = "note";
    const PLURAL: &'static str = "notes";
}

#[derive(Clone)]
pub struct Notes {
    resource: Resource<Note>,
}

impl Notes {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        session: Session,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resource: Resource::new(remote, session, notifier),
        }
    }

    pub fn notes(&self) -> Vec<Note> {
        self.resource.items()
    }

    pub fn get(&self, id: Uuid) -> Option<Note> {
        self.resource.get(id)
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

    pub async fn add(&self, draft: &NoteDraft) -> Result<Note> {
        draft.validate()?;
        self.resource
            .create(draft, |_| Notification::success("Note added successfully!"))
            .await
    }

    pub async fn update(&self, id: Uuid, patch: &NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return Err(Error::Invalid("nothing to update".to_string()));
        }
        self.resource
            .update(id, patch, Notification::success("Note updated successfully!"))
            .await
    }

    pub async fn toggle_pin(&self, id: Uuid) -> Result<Note> {
        let current = self.get(id).ok_or(Error::NotLoaded(id))?;
        let patch = NotePatch {
            pin: Some(!current.pin),
            ..Default::default()
        };
        let success = if current.pin {
            Notification::success("Note unpinned")
        } else {
            Notification::success("Note pinned")
        };
        self.resource.update(id, &patch, success).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.resource
            .delete(id, Notification::success("Note deleted successfully!"))
            .await
    }

    /// What the notes view shows for `query`.
    pub fn visible(&self, query: &str) -> Vec<Note> {
        visible(&self.notes(), query)
    }
}

/// Notes whose title or content contains `query`, ignoring case.
pub fn search(notes: &[Note], query: &str) -> Vec<Note> {
    let needle = query.to_lowercase();
    notes
        .iter()
        .filter(|note| {
            needle.is_empty()
                || note.title.to_lowercase().contains(&needle)
                || note.content.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Pinned notes first; list order is otherwise kept.
pub fn arrange(notes: &[Note]) -> Vec<Note> {
    let mut arranged = notes.to_vec();
    arranged.sort_by_key(|note| !note.pin);
    arranged
}

pub fn visible(notes: &[Note], query: &str) -> Vec<Note> {
    arrange(&search(notes, query))
}
