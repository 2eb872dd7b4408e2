use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Reminder, ReminderDraft, ReminderPatch};
use crate::notify::{Notification, Notifier};
use crate::remote::{Collection, RemoteDataService};
use crate::resource::{Entity, Resource};
use crate::session::Session;
use crate::store::{Keyed, LoadPhase};

/// How many completed reminders the job detail view shows.
pub const COMPLETED_SHOWN: usize = 5;

impl Keyed for Reminder {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Entity for Reminder {
    const COLLECTION: Collection = Collection::Reminders;
    const SINGULAR: &'static str = "reminder";
    const PLURAL: &'static str = "reminders";
}

#[derive(Clone)]
pub struct Reminders {
    resource: Resource<Reminder>,
}

impl Reminders {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        session: Session,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resource: Resource::new(remote, session, notifier),
        }
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.resource.items()
    }

    pub fn get(&self, id: Uuid) -> Option<Reminder> {
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

    pub async fn add(&self, draft: &ReminderDraft) -> Result<Reminder> {
        draft.validate()?;
        self.resource
            .create(draft, |_| Notification::success("Reminder added successfully!"))
            .await
    }

    pub async fn update(&self, id: Uuid, patch: &ReminderPatch) -> Result<Reminder> {
        if patch.is_empty() {
            return Err(Error::Invalid("nothing to update".to_string()));
        }
        self.resource
            .update(id, patch, Notification::success("Reminder updated successfully!"))
            .await
    }

    /// Flip the completed flag of a loaded reminder.
    pub async fn toggle(&self, id: Uuid) -> Result<Reminder> {
        let current = self.get(id).ok_or(Error::NotLoaded(id))?;
        let patch = ReminderPatch {
            completed: Some(!current.completed),
            ..Default::default()
        };
        let success = if current.completed {
            Notification::success("Reminder marked as pending")
        } else {
            Notification::success("Reminder completed!")
        };
        self.resource.update(id, &patch, success).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.resource
            .delete(id, Notification::success("Reminder deleted successfully!"))
            .await
    }
}

/// Open reminders attached to a job, soonest first.
pub fn pending_for_job(reminders: &[Reminder], job_id: Uuid) -> Vec<Reminder> {
    let mut pending: Vec<Reminder> = reminders
        .iter()
        .filter(|r| !r.completed && r.job_id == Some(job_id))
        .cloned()
        .collect();
    pending.sort_by_key(|r| r.due_date);
    pending
}

/// Completed reminders attached to a job, in list order, at most
/// [`COMPLETED_SHOWN`] of them.
pub fn completed_for_job(reminders: &[Reminder], job_id: Uuid) -> Vec<Reminder> {
    reminders
        .iter()
        .filter(|r| r.completed && r.job_id == Some(job_id))
        .take(COMPLETED_SHOWN)
        .cloned()
        .collect()
}

pub fn overdue(reminders: &[Reminder], today: NaiveDate) -> Vec<Reminder> {
    let mut late: Vec<Reminder> = reminders
        .iter()
        .filter(|r| !r.completed && r.due_date < today)
        .cloned()
        .collect();
    late.sort_by_key(|r| r.due_date);
    late
}

pub fn due_today(reminders: &[Reminder], today: NaiveDate) -> Vec<Reminder> {
    reminders
        .iter()
        .filter(|r| !r.completed && r.due_date == today)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Jobs;
    use crate::models::{JobDraft, ReminderKind};
    use crate::remote::Operation;
    use crate::testing::Harness;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn hook(h: &Harness) -> Reminders {
        Reminders::new(h.remote(), h.session.clone(), h.notifier())
    }

    fn draft(title: &str, job_id: Option<Uuid>, due: &str) -> ReminderDraft {
        ReminderDraft {
            job_id,
            title: title.to_string(),
            description: None,
            due_date: date(due),
            kind: ReminderKind::FollowUp,
        }
    }

    #[tokio::test]
    async fn test_add_carries_job_label() {
        let h = Harness::new();
        let jobs = Jobs::new(h.remote(), h.session.clone(), h.notifier());
        let job = jobs
            .add(&JobDraft::new("Acme", "Engineer", date("2024-01-01")))
            .await
            .unwrap()
            .job;

        let reminders = hook(&h);
        let reminder = reminders
            .add(&draft("Send thank-you", Some(job.id), "2024-01-05"))
            .await
            .unwrap();
        assert_eq!(reminder.job_id, Some(job.id));
        assert_eq!(reminder.job.as_ref().unwrap().company, "Acme");
        assert!(!reminder.completed);
        assert_eq!(reminders.reminders(), vec![reminder]);
        assert_eq!(h.log.latest().unwrap().title, "Reminder added successfully!");
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_completed() {
        let h = Harness::new();
        let reminders = hook(&h);
        let id = reminders
            .add(&draft("Follow up", None, "2024-01-05"))
            .await
            .unwrap()
            .id;

        assert!(reminders.toggle(id).await.unwrap().completed);
        assert!(reminders.get(id).unwrap().completed);
        assert_eq!(h.log.latest().unwrap().title, "Reminder completed!");

        assert!(!reminders.toggle(id).await.unwrap().completed);
        assert!(!reminders.get(id).unwrap().completed);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id() {
        let h = Harness::new();
        let reminders = hook(&h);
        let missing = Uuid::new_v4();
        assert!(matches!(
            reminders.toggle(missing).await,
            Err(Error::NotLoaded(id)) if id == missing
        ));
        assert!(h.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_state() {
        let h = Harness::new();
        let reminders = hook(&h);
        let id = reminders
            .add(&draft("Follow up", None, "2024-01-05"))
            .await
            .unwrap()
            .id;
        h.log.clear();

        h.scripted.fail_once(Collection::Reminders, Operation::Update);
        assert!(reminders.toggle(id).await.is_err());
        assert!(!reminders.get(id).unwrap().completed);
        assert_eq!(h.log.destructive_count(), 1);
        assert_eq!(h.log.latest().unwrap().title, "Error updating reminder");
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let h = Harness::new();
        let reminders = hook(&h);
        assert!(matches!(
            reminders.add(&draft(" ", None, "2024-01-05")).await,
            Err(Error::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected_and_description_clears() {
        let h = Harness::new();
        let reminders = hook(&h);
        let mut with_notes = draft("Follow up", None, "2024-01-05");
        with_notes.description = Some("Ask about timeline".to_string());
        let id = reminders.add(&with_notes).await.unwrap().id;
        h.log.clear();

        assert!(matches!(
            reminders.update(id, &ReminderPatch::default()).await,
            Err(Error::Invalid(_))
        ));
        assert!(h.log.entries().is_empty());

        let patch = ReminderPatch {
            description: Some(None),
            ..Default::default()
        };
        let edited = reminders.update(id, &patch).await.unwrap();
        assert_eq!(edited.description, None);
        assert_eq!(h.log.latest().unwrap().title, "Reminder updated successfully!");
    }

    fn reminder(job_id: Option<Uuid>, due: &str, completed: bool) -> Reminder {
        let now = Utc::now();
        Reminder {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            job_id,
            title: format!("due {}", due),
            description: None,
            due_date: date(due),
            kind: ReminderKind::Other,
            completed,
            created_at: now,
            updated_at: now,
            job: None,
        }
    }

    #[test]
    fn test_job_views_split_by_completion() {
        let job = Uuid::new_v4();
        let mut list = vec![
            reminder(Some(job), "2024-02-10", false),
            reminder(Some(job), "2024-02-01", false),
            reminder(None, "2024-02-01", false),
        ];
        for day in 1..=7 {
            list.push(reminder(Some(job), &format!("2024-01-0{}", day), true));
        }

        let pending = pending_for_job(&list, job);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].due_date, date("2024-02-01"));

        let completed = completed_for_job(&list, job);
        assert_eq!(completed.len(), COMPLETED_SHOWN);
        assert_eq!(completed[0].due_date, date("2024-01-01"));
    }

    #[test]
    fn test_dashboard_views() {
        let today = date("2024-03-10");
        let list = vec![
            reminder(None, "2024-03-10", false),
            reminder(None, "2024-03-08", false),
            reminder(None, "2024-03-01", false),
            reminder(None, "2024-03-01", true),
            reminder(None, "2024-03-11", false),
        ];

        let late = overdue(&list, today);
        assert_eq!(late.len(), 2);
        assert_eq!(late[0].due_date, date("2024-03-01"));
        assert_eq!(due_today(&list, today).len(), 1);
    }
}
