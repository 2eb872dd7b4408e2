use chrono::NaiveDate;

use crate::models::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Applied,
    InProgress,
    Offer,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub label: String,
    pub date: NaiveDate,
}

/// The application event, followed by the current status when the job has
/// moved past Applied. The status event is dated by the last update.
pub fn events(job: &Job) -> Vec<TimelineEvent> {
    let mut events = vec![TimelineEvent {
        kind: EventKind::Applied,
        label: "Application submitted".to_string(),
        date: job.applied_date,
    }];

    if job.status != JobStatus::Applied {
        let kind = match job.status {
            JobStatus::Offer => EventKind::Offer,
            JobStatus::Rejected => EventKind::Rejected,
            _ => EventKind::InProgress,
        };
        events.push(TimelineEvent {
            kind,
            label: format!("Status: {}", job.status),
            date: job.updated_at.date_naive(),
        });
    }
    events
}

/// Most recent application first.
pub fn by_applied_date(jobs: &[Job]) -> Vec<Job> {
    let mut sorted = jobs.to_vec();
    sorted.sort_by(|a, b| b.applied_date.cmp(&a.applied_date));
    sorted
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// "today", "3 days ago", "in 2 days".
pub fn relative_days(date: NaiveDate, today: NaiveDate) -> String {
    let days = (date - today).num_days();
    let unit = |n: i64| if n == 1 { "day" } else { "days" };
    match days {
        0 => "today".to_string(),
        d if d < 0 => format!("{} {} ago", -d, unit(-d)),
        d => format!("in {} {}", d, unit(d)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn job(applied: &str, status: JobStatus) -> Job {
        let updated = Utc.with_ymd_and_hms(2024, 2, 20, 9, 30, 0).unwrap();
        Job {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            company: "Acme".to_string(),
            position: "Engineer".to_string(),
            status,
            applied_date: date(applied),
            salary: None,
            location: None,
            job_url: None,
            created_at: updated,
            updated_at: updated,
        }
    }

    #[test]
    fn test_applied_job_has_single_event() {
        let events = events(&job("2024-02-01", JobStatus::Applied));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Applied);
        assert_eq!(events[0].date, date("2024-02-01"));
    }

    #[test]
    fn test_status_event_is_classified() {
        let offer = events(&job("2024-02-01", JobStatus::Offer));
        assert_eq!(offer[1].kind, EventKind::Offer);
        assert_eq!(offer[1].date, date("2024-02-20"));
        assert_eq!(offer[1].label, "Status: Offer");

        assert_eq!(events(&job("2024-02-01", JobStatus::Rejected))[1].kind, EventKind::Rejected);
        assert_eq!(events(&job("2024-02-01", JobStatus::Waiting))[1].kind, EventKind::InProgress);
        assert_eq!(events(&job("2024-02-01", JobStatus::Interview))[1].kind, EventKind::InProgress);
    }

    #[test]
    fn test_sorted_by_applied_date_desc() {
        let jobs = vec![
            job("2024-01-10", JobStatus::Applied),
            job("2024-03-01", JobStatus::Applied),
            job("2024-02-15", JobStatus::Applied),
        ];
        let dates: Vec<_> = by_applied_date(&jobs).iter().map(|j| j.applied_date).collect();
        assert_eq!(dates, vec![date("2024-03-01"), date("2024-02-15"), date("2024-01-10")]);
    }

    #[test]
    fn test_relative_days() {
        let today = date("2024-03-10");
        assert_eq!(relative_days(today, today), "today");
        assert_eq!(relative_days(date("2024-03-07"), today), "3 days ago");
        assert_eq!(relative_days(date("2024-03-09"), today), "1 day ago");
        assert_eq!(relative_days(date("2024-03-12"), today), "in 2 days");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(date("2024-01-05")), "Jan 5, 2024");
    }
}
