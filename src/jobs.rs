use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Job, JobDraft, JobPatch, JobStatus, Note, NoteDraft};
use crate::notify::{Notification, Notifier};
use crate::remote::{Collection, Operation, RemoteDataService};
use crate::resource::{decode, owned_row, Entity, Resource};
use crate::session::Session;
use crate::store::{Keyed, LoadPhase};

impl Keyed for Job {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Entity for Job {
    const COLLECTION: Collection = Collection::Jobs;
    const SINGULAR: &'static str = "job";
    const PLURAL: &'static str = "jobs";
}

/// Outcome of [`Jobs::add`]. The job stands on its own; the linked note, if one
/// was requested, succeeded or failed separately.
#[derive(Debug)]
pub struct JobCreated {
    pub job: Job,
    pub note: Option<Result<Note>>,
}

/// Job applications of the signed-in user.
#[derive(Clone)]
pub struct Jobs {
    resource: Resource<Job>,
}

impl Jobs {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        session: Session,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resource: Resource::new(remote, session, notifier),
        }
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.resource.items()
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
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

    pub async fn add(&self, draft: &JobDraft) -> Result<JobCreated> {
        draft.validate()?;
        let job = self
            .resource
            .create(draft, |job| {
                Notification::success("Job added successfully!").with_description(format!(
                    "{} at {} has been added.",
                    job.position, job.company
                ))
            })
            .await?;

        let note = match draft.linked_note(job.id) {
            Some(note) => Some(self.add_linked_note(job.user_id, &note).await),
            None => None,
        };
        Ok(JobCreated { job, note })
    }

    async fn add_linked_note(&self, owner: Uuid, draft: &NoteDraft) -> Result<Note> {
        // Another user signed in while the job was being saved
        if self.resource.require_identity()?.user_id != owner {
            return Err(Error::SignedOut);
        }
        let row = owned_row(owner, draft)?;

        self.resource
            .remote()
            .insert(Collection::Notes, row)
            .await
            .and_then(|row| decode::<Note>(Operation::Insert, row))
            .map_err(|err| {
                tracing::error!(error = %err, "Error adding note for new job");
                self.resource.notifier().notify(Notification::destructive(
                    "Error adding note",
                    "The job was saved, but its note could not be created.",
                ));
                Error::from(err)
            })
    }

    pub async fn update(&self, id: Uuid, patch: &JobPatch) -> Result<Job> {
        if patch.is_empty() {
            return Err(Error::Invalid("nothing to update".to_string()));
        }
        self.resource
            .update(id, patch, Notification::success("Job updated successfully!"))
            .await
    }

    pub async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<Job> {
        self.update(id, &JobPatch::status(status)).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.resource
            .delete(id, Notification::success("Job deleted successfully!"))
            .await
    }
}

/// Jobs whose company or position contains `search` (ignoring case) and whose
/// status is one of `statuses`. An empty status set matches every status.
pub fn filter(jobs: &[Job], search: &str, statuses: &[JobStatus]) -> Vec<Job> {
    let needle = search.to_lowercase();
    jobs.iter()
        .filter(|job| {
            needle.is_empty()
                || job.company.to_lowercase().contains(&needle)
                || job.position.to_lowercase().contains(&needle)
        })
        .filter(|job| statuses.is_empty() || statuses.contains(&job.status))
        .cloned()
        .collect()
}

/// Number of jobs per status, with every status present.
pub fn status_counts(jobs: &[Job]) -> BTreeMap<JobStatus, usize> {
    let mut counts: BTreeMap<JobStatus, usize> =
        JobStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for job in jobs {
        *counts.entry(job.status).or_insert(0) += 1;
    }
    counts
}
