use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Waiting,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Applied,
        JobStatus::Interview,
        JobStatus::Offer,
        JobStatus::Rejected,
        JobStatus::Waiting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Applied => "Applied",
            JobStatus::Interview => "Interview",
            JobStatus::Offer => "Offer",
            JobStatus::Rejected => "Rejected",
            JobStatus::Waiting => "Waiting",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "job status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    #[serde(rename = "Follow-up")]
    FollowUp,
    #[serde(rename = "Interview Prep")]
    InterviewPrep,
    #[serde(rename = "Thank You")]
    ThankYou,
    Other,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::FollowUp => "Follow-up",
            ReminderKind::InterviewPrep => "Interview Prep",
            ReminderKind::ThankYou => "Thank You",
            ReminderKind::Other => "Other",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReminderKind {
    type Err = UnknownVariant;

    // Accepts the wire names as well as CLI spellings like "follow-up" or "thank_you"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squashed: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match squashed.as_str() {
            "followup" => Ok(ReminderKind::FollowUp),
            "interviewprep" | "prep" => Ok(ReminderKind::InterviewPrep),
            "thankyou" => Ok(ReminderKind::ThankYou),
            "other" => Ok(ReminderKind::Other),
            _ => Err(UnknownVariant {
                kind: "reminder type",
                value: s.to_string(),
            }),
        }
    }
}

/// Company/position label the backend embeds into note and reminder rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLabel {
    pub company: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub status: JobStatus,
    pub applied_date: NaiveDate,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub job_id: Option<Uuid>, // weak back-reference, display only
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename = "jobs", skip_serializing_if = "Option::is_none")]
    pub job: Option<JobLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub job_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub pin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename = "jobs", skip_serializing_if = "Option::is_none")]
    pub job: Option<JobLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Insert payloads ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDraft {
    pub company: String,
    pub position: String,
    pub status: JobStatus,
    pub applied_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    // Linked note, created separately after the job row exists
    #[serde(skip)]
    pub note_title: Option<String>,
    #[serde(skip)]
    pub note_content: Option<String>,
}

impl JobDraft {
    pub fn new(company: &str, position: &str, applied_date: NaiveDate) -> Self {
        Self {
            company: company.to_string(),
            position: position.to_string(),
            status: JobStatus::Applied,
            applied_date,
            salary: None,
            location: None,
            job_url: None,
            note_title: None,
            note_content: None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.company.trim().is_empty() {
            return Err(Error::Invalid("company is required".to_string()));
        }
        if self.position.trim().is_empty() {
            return Err(Error::Invalid("position is required".to_string()));
        }
        Ok(())
    }

    /// The note to create alongside the job, if the caller supplied one.
    pub fn linked_note(&self, job_id: Uuid) -> Option<NoteDraft> {
        let title = self.note_title.as_deref().map(str::trim).unwrap_or_default();
        let content = self.note_content.as_deref().unwrap_or_default();
        if title.is_empty() && content.trim().is_empty() {
            return None;
        }
        let title = if title.is_empty() { "New Note" } else { title };
        Some(NoteDraft {
            job_id: Some(job_id),
            title: title.to_string(),
            content: content.to_string(),
            pin: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
}

impl ReminderDraft {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::Invalid("reminder title is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub pin: bool,
}

impl NoteDraft {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::Invalid("note title is required".to_string()));
        }
        Ok(())
    }
}

// --- Partial updates ---
//
// `None` leaves a column alone. Nullable columns take `Some(None)`, which is
// sent as `null` and clears the value.

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<Option<String>>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReminderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ReminderPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<bool>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
