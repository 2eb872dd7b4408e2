mod tui;

use anyhow::{anyhow, bail, Context, Result};
use applytrack::config::{Backend, Config};
use applytrack::db::Database;
use applytrack::jobs::{self, Jobs};
use applytrack::models::{
    JobDraft, JobPatch, JobStatus, NoteDraft, NotePatch, ReminderDraft, ReminderKind,
};
use applytrack::notes::{self, Notes};
use applytrack::notify::{ConsoleNotifier, NotificationLog, Notifier};
use applytrack::profile::ProfileHook;
use applytrack::reminders::{self, Reminders};
use applytrack::remote::RemoteDataService;
use applytrack::rest::RestClient;
use applytrack::session::{Identity, Session};
use applytrack::store::Keyed;
use applytrack::timeline;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "applytrack")]
#[command(about = "Track job applications, follow-up reminders and notes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Sign in to the local database, creating the profile on first use
    Login {
        /// Email address
        email: String,

        /// Full name shown on the dashboard
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Sign out of the local database
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Add a job application
    Add {
        /// Company name
        company: String,

        /// Position title
        position: String,

        /// Status (applied, interview, offer, rejected, waiting)
        #[arg(short, long, default_value = "applied")]
        status: String,

        /// Date applied (YYYY-MM-DD, default today)
        #[arg(short = 'd', long)]
        applied: Option<String>,

        /// Salary or range
        #[arg(long)]
        salary: Option<String>,

        /// Location
        #[arg(short, long)]
        location: Option<String>,

        /// Posting URL
        #[arg(short, long)]
        url: Option<String>,

        /// Title of a note to attach
        #[arg(long)]
        note_title: Option<String>,

        /// Content of a note to attach
        #[arg(long)]
        note: Option<String>,
    },

    /// List job applications
    List {
        /// Match company or position
        #[arg(short, long)]
        search: Option<String>,

        /// Only these statuses (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
    },

    /// Show job details with timeline, reminders and notes
    Show {
        /// Job ID (any unique prefix)
        id: String,
    },

    /// Change the status of a job
    Status {
        /// Job ID (any unique prefix)
        id: String,

        /// New status (applied, interview, offer, rejected, waiting)
        status: String,
    },

    /// Edit job fields
    Edit {
        /// Job ID (any unique prefix)
        id: String,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        position: Option<String>,

        /// Date applied (YYYY-MM-DD)
        #[arg(short = 'd', long)]
        applied: Option<String>,

        /// Salary ("" clears it)
        #[arg(long)]
        salary: Option<String>,

        /// Location ("" clears it)
        #[arg(short, long)]
        location: Option<String>,

        /// Posting URL ("" clears it)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Delete a job
    Delete {
        /// Job ID (any unique prefix)
        id: String,
    },

    /// Manage reminders
    Reminder {
        #[command(subcommand)]
        command: ReminderCommands,
    },

    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Status summary and reminders due
    Dashboard,

    /// Browse jobs interactively
    Browse {
        /// Match company or position
        #[arg(short, long)]
        search: Option<String>,

        /// Only these statuses (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ReminderCommands {
    /// Add a reminder
    Add {
        /// What to do
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: String,

        /// Job ID the reminder belongs to
        #[arg(short, long)]
        job: Option<String>,

        /// Type (follow-up, interview-prep, thank-you, other)
        #[arg(short = 't', long = "type", default_value = "follow-up")]
        kind: String,

        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// List reminders
    List {
        /// Include completed reminders
        #[arg(short, long)]
        all: bool,
    },

    /// Mark a reminder as completed
    Done {
        /// Reminder ID (any unique prefix)
        id: String,
    },

    /// Delete a reminder
    Delete {
        /// Reminder ID (any unique prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Add a note
    Add {
        /// Note title
        title: String,

        /// Note body
        #[arg(short, long, default_value = "")]
        content: String,

        /// Job ID the note belongs to
        #[arg(short, long)]
        job: Option<String>,
    },

    /// List notes, pinned first
    List {
        /// Match title or content
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Edit a note
    Edit {
        /// Note ID (any unique prefix)
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Pin or unpin a note
    Pin {
        /// Note ID (any unique prefix)
        id: String,
    },

    /// Delete a note
    Delete {
        /// Note ID (any unique prefix)
        id: String,
    },
}

/// One hook per entity type, sharing the backend, session and notifier.
pub struct Hooks {
    pub jobs: Jobs,
    pub reminders: Reminders,
    pub notes: Notes,
    pub profile: ProfileHook,
}

impl Hooks {
    fn new(remote: Arc<dyn RemoteDataService>, session: &Session, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            jobs: Jobs::new(Arc::clone(&remote), session.clone(), Arc::clone(&notifier)),
            reminders: Reminders::new(Arc::clone(&remote), session.clone(), Arc::clone(&notifier)),
            notes: Notes::new(Arc::clone(&remote), session.clone(), Arc::clone(&notifier)),
            profile: ProfileHook::new(remote, session.clone(), notifier),
        }
    }
}

fn short(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// An edit flag for a nullable column: an empty value clears it.
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

fn parse_statuses(values: &[String]) -> Result<Vec<JobStatus>> {
    values
        .iter()
        .map(|v| v.parse::<JobStatus>().map_err(anyhow::Error::from))
        .collect()
}

/// Find the single loaded item whose id starts with `prefix`.
fn resolve<T: Keyed>(items: &[T], prefix: &str, kind: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("An {} ID is required", kind);
    }
    let matches: Vec<Uuid> = items
        .iter()
        .map(Keyed::key)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No {} matches '{}'", kind, prefix),
        _ => bail!(
            "'{}' matches {} {}s; use more characters",
            prefix,
            matches.len(),
            kind
        ),
    }
}

fn require_local<'a>(local: &'a Option<Arc<Database>>, command: &str) -> Result<&'a Database> {
    local
        .as_deref()
        .ok_or_else(|| anyhow!("'{}' is only available with the local database", command))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let session = Session::resolving();

    let (remote, local): (Arc<dyn RemoteDataService>, Option<Arc<Database>>) = match &config.backend
    {
        Backend::Local { path } => {
            let db = Arc::new(Database::open(path, session.clone())?);
            let remote: Arc<dyn RemoteDataService> = db.clone();
            (remote, Some(db))
        }
        Backend::Hosted {
            url,
            anon_key,
            access_token,
            user_id,
            email,
        } => {
            session.sign_in(Identity::new(*user_id, email).with_access_token(access_token));
            let remote: Arc<dyn RemoteDataService> =
                Arc::new(RestClient::new(url, anon_key, session.clone()));
            (remote, None)
        }
    };

    match cli.command {
        Commands::Init => {
            let db = require_local(&local, "init")?;
            db.init()?;
            if let Some(path) = db.path() {
                println!("Database initialized at {}", path.display());
            }
            return Ok(());
        }

        Commands::Login { email, name } => {
            let db = require_local(&local, "login")?;
            db.ensure_initialized()?;
            let identity = db.sign_in(&email, name.as_deref())?;
            println!("Signed in as {}", identity.email);
            return Ok(());
        }

        Commands::Logout => {
            let db = require_local(&local, "logout")?;
            db.ensure_initialized()?;
            db.sign_out()?;
            println!("Signed out.");
            return Ok(());
        }

        _ => {}
    }

    if let Some(db) = &local {
        db.ensure_initialized()?;
        if db.restore_session()?.is_none() {
            session.sign_out();
        }
    }
    if session.current().is_none() {
        bail!("Not signed in. Run 'applytrack login <email>' first.");
    }

    if let Commands::Browse { search, statuses } = &cli.command {
        let statuses = parse_statuses(statuses)?;
        let log = Arc::new(NotificationLog::new());
        let hooks = Hooks::new(remote, &session, log.clone());
        return tui::run_browse(&hooks, &log, search.as_deref().unwrap_or(""), &statuses).await;
    }

    let hooks = Hooks::new(remote, &session, Arc::new(ConsoleNotifier));
    run(cli.command, &hooks, &session).await
}

async fn run(command: Commands, hooks: &Hooks, session: &Session) -> Result<()> {
    match command {
        Commands::Whoami => {
            hooks.profile.fetch().await?;
            let email = match hooks.profile.profile() {
                Some(profile) => profile.email,
                None => session.current().map(|i| i.email).unwrap_or_default(),
            };
            println!("{} <{}>", hooks.profile.display_name(), email);
        }

        Commands::Add {
            company,
            position,
            status,
            applied,
            salary,
            location,
            url,
            note_title,
            note,
        } => {
            let applied_date = match applied {
                Some(date) => parse_date(&date)?,
                None => Local::now().date_naive(),
            };
            let draft = JobDraft {
                status: status.parse()?,
                salary,
                location,
                job_url: url,
                note_title,
                note_content: note,
                ..JobDraft::new(&company, &position, applied_date)
            };
            let created = hooks.jobs.add(&draft).await?;
            println!("ID: {}", short(created.job.id));
            if let Some(Ok(note)) = created.note {
                println!("Note: {} ({})", note.title, short(note.id));
            }
        }

        Commands::List { search, statuses } => {
            hooks.jobs.fetch().await?;
            let statuses = parse_statuses(&statuses)?;
            let jobs = jobs::filter(&hooks.jobs.jobs(), search.as_deref().unwrap_or(""), &statuses);
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<8} {:<10} {:<22} {:<28} {:<10}",
                    "ID", "STATUS", "COMPANY", "POSITION", "APPLIED"
                );
                println!("{}", "-".repeat(82));
                for job in jobs {
                    println!(
                        "{:<8} {:<10} {:<22} {:<28} {:<10}",
                        short(job.id),
                        job.status,
                        truncate(&job.company, 20),
                        truncate(&job.position, 26),
                        job.applied_date
                    );
                }
            }
        }

        Commands::Show { id } => {
            hooks.jobs.fetch().await?;
            hooks.reminders.fetch().await?;
            hooks.notes.fetch().await?;
            let id = resolve(&hooks.jobs.jobs(), &id, "job")?;
            let job = hooks.jobs.get(id).ok_or_else(|| anyhow!("Job {} not found.", short(id)))?;
            let today = Local::now().date_naive();

            println!("{} at {}", job.position, job.company);
            println!("ID: {}", job.id);
            println!("Status: {}", job.status);
            println!("Applied: {}", timeline::format_date(job.applied_date));
            if let Some(salary) = &job.salary {
                println!("Salary: {}", salary);
            }
            if let Some(location) = &job.location {
                println!("Location: {}", location);
            }
            if let Some(url) = &job.job_url {
                println!("URL: {}", url);
            }

            println!("\n--- Timeline ---");
            for event in timeline::events(&job) {
                println!(
                    "  {} - {} ({})",
                    timeline::format_date(event.date),
                    event.label,
                    timeline::relative_days(event.date, today)
                );
            }

            let all_reminders = hooks.reminders.reminders();
            let pending = reminders::pending_for_job(&all_reminders, job.id);
            let completed = reminders::completed_for_job(&all_reminders, job.id);
            println!("\n--- Reminders ---");
            if pending.is_empty() && completed.is_empty() {
                println!("  No reminders.");
            }
            for reminder in pending {
                println!(
                    "  [ ] {} {} ({}, due {})",
                    short(reminder.id),
                    reminder.title,
                    reminder.kind,
                    timeline::relative_days(reminder.due_date, today)
                );
            }
            for reminder in completed {
                println!("  [x] {} {}", short(reminder.id), reminder.title);
            }

            let job_notes: Vec<_> = hooks
                .notes
                .notes()
                .into_iter()
                .filter(|n| n.job_id == Some(job.id))
                .collect();
            println!("\n--- Notes ---");
            if job_notes.is_empty() {
                println!("  No notes.");
            }
            for note in notes::arrange(&job_notes) {
                let pin = if note.pin { "*" } else { " " };
                println!("  {} {} {}", pin, short(note.id), note.title);
                for line in textwrap::fill(&note.content, 70).lines() {
                    println!("      {}", line);
                }
            }
        }

        Commands::Status { id, status } => {
            hooks.jobs.fetch().await?;
            let id = resolve(&hooks.jobs.jobs(), &id, "job")?;
            hooks.jobs.set_status(id, status.parse()?).await?;
        }

        Commands::Edit {
            id,
            company,
            position,
            applied,
            salary,
            location,
            url,
        } => {
            hooks.jobs.fetch().await?;
            let id = resolve(&hooks.jobs.jobs(), &id, "job")?;
            let patch = JobPatch {
                company,
                position,
                applied_date: applied.as_deref().map(parse_date).transpose()?,
                salary: clearable(salary),
                location: clearable(location),
                job_url: clearable(url),
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("Nothing to change. Pass at least one field to edit.");
            }
            hooks.jobs.update(id, &patch).await?;
        }

        Commands::Delete { id } => {
            hooks.jobs.fetch().await?;
            let id = resolve(&hooks.jobs.jobs(), &id, "job")?;
            hooks.jobs.delete(id).await?;
        }

        Commands::Reminder { command } => run_reminder(command, hooks).await?,

        Commands::Note { command } => run_note(command, hooks).await?,

        Commands::Dashboard => {
            hooks.profile.fetch().await?;
            hooks.jobs.fetch().await?;
            hooks.reminders.fetch().await?;
            let today = Local::now().date_naive();
            let all_jobs = hooks.jobs.jobs();

            println!("Welcome back, {}!", hooks.profile.display_name());
            println!("\n{} applications", all_jobs.len());
            for (status, count) in jobs::status_counts(&all_jobs) {
                println!("  {:<10} {:>4}", status, count);
            }

            let all_reminders = hooks.reminders.reminders();
            let overdue = reminders::overdue(&all_reminders, today);
            let due_today = reminders::due_today(&all_reminders, today);
            println!("\nOverdue reminders: {}", overdue.len());
            for reminder in overdue {
                println!(
                    "  {} {} (due {})",
                    short(reminder.id),
                    reminder.title,
                    timeline::relative_days(reminder.due_date, today)
                );
            }
            println!("Due today: {}", due_today.len());
            for reminder in due_today {
                println!("  {} {}", short(reminder.id), reminder.title);
            }

            let recent = timeline::by_applied_date(&all_jobs);
            if !recent.is_empty() {
                println!("\nRecent applications:");
                for job in recent.iter().take(5) {
                    println!(
                        "  {:<12} {} at {} ({})",
                        job.status.as_str(),
                        job.position,
                        job.company,
                        timeline::relative_days(job.applied_date, today)
                    );
                }
            }
        }

        // Handled in main before the hooks are built
        Commands::Init | Commands::Login { .. } | Commands::Logout | Commands::Browse { .. } => {}
    }
    Ok(())
}

async fn run_reminder(command: ReminderCommands, hooks: &Hooks) -> Result<()> {
    match command {
        ReminderCommands::Add {
            title,
            due,
            job,
            kind,
            description,
        } => {
            let job_id = match job {
                Some(prefix) => {
                    hooks.jobs.fetch().await?;
                    Some(resolve(&hooks.jobs.jobs(), &prefix, "job")?)
                }
                None => None,
            };
            let draft = ReminderDraft {
                job_id,
                title,
                description,
                due_date: parse_date(&due)?,
                kind: kind.parse::<ReminderKind>()?,
            };
            let reminder = hooks.reminders.add(&draft).await?;
            println!("ID: {}", short(reminder.id));
        }

        ReminderCommands::List { all } => {
            hooks.reminders.fetch().await?;
            let today = Local::now().date_naive();
            let mut list: Vec<_> = hooks
                .reminders
                .reminders()
                .into_iter()
                .filter(|r| all || !r.completed)
                .collect();
            list.sort_by_key(|r| (r.completed, r.due_date));

            if list.is_empty() {
                println!("No reminders found.");
            } else {
                println!(
                    "{:<8} {:<4} {:<12} {:<15} {:<28} {:<20}",
                    "ID", "DONE", "DUE", "TYPE", "TITLE", "JOB"
                );
                println!("{}", "-".repeat(92));
                for reminder in list {
                    let job = reminder
                        .job
                        .as_ref()
                        .map(|j| format!("{} ({})", j.company, j.position))
                        .unwrap_or_else(|| "-".to_string());
                    let due = if !reminder.completed && reminder.due_date < today {
                        format!("{}!", reminder.due_date)
                    } else {
                        reminder.due_date.to_string()
                    };
                    println!(
                        "{:<8} {:<4} {:<12} {:<15} {:<28} {:<20}",
                        short(reminder.id),
                        if reminder.completed { "x" } else { "" },
                        due,
                        reminder.kind.as_str(),
                        truncate(&reminder.title, 26),
                        truncate(&job, 20)
                    );
                }
            }
        }

        ReminderCommands::Done { id } => {
            hooks.reminders.fetch().await?;
            let id = resolve(&hooks.reminders.reminders(), &id, "reminder")?;
            match hooks.reminders.get(id) {
                Some(reminder) if reminder.completed => println!("Reminder already completed."),
                _ => {
                    hooks.reminders.toggle(id).await?;
                }
            }
        }

        ReminderCommands::Delete { id } => {
            hooks.reminders.fetch().await?;
            let id = resolve(&hooks.reminders.reminders(), &id, "reminder")?;
            hooks.reminders.delete(id).await?;
        }
    }
    Ok(())
}

async fn run_note(command: NoteCommands, hooks: &Hooks) -> Result<()> {
    match command {
        NoteCommands::Add { title, content, job } => {
            let job_id = match job {
                Some(prefix) => {
                    hooks.jobs.fetch().await?;
                    Some(resolve(&hooks.jobs.jobs(), &prefix, "job")?)
                }
                None => None,
            };
            let draft = NoteDraft {
                job_id,
                title,
                content,
                pin: false,
            };
            let note = hooks.notes.add(&draft).await?;
            println!("ID: {}", short(note.id));
        }

        NoteCommands::List { search } => {
            hooks.notes.fetch().await?;
            let visible = hooks.notes.visible(search.as_deref().unwrap_or(""));
            if visible.is_empty() {
                println!("No notes found.");
            }
            for note in visible {
                let pin = if note.pin { "*" } else { " " };
                let job = note
                    .job
                    .as_ref()
                    .map(|j| format!(" [{} - {}]", j.company, j.position))
                    .unwrap_or_default();
                println!("{} {} {}{}", pin, short(note.id), note.title, job);
                for line in textwrap::fill(&note.content, 70).lines() {
                    println!("    {}", line);
                }
            }
        }

        NoteCommands::Edit { id, title, content } => {
            hooks.notes.fetch().await?;
            let id = resolve(&hooks.notes.notes(), &id, "note")?;
            let patch = NotePatch {
                title,
                content,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("Nothing to change. Pass --title or --content.");
            }
            hooks.notes.update(id, &patch).await?;
        }

        NoteCommands::Pin { id } => {
            hooks.notes.fetch().await?;
            let id = resolve(&hooks.notes.notes(), &id, "note")?;
            hooks.notes.toggle_pin(id).await?;
        }

        NoteCommands::Delete { id } => {
            hooks.notes.fetch().await?;
            let id = resolve(&hooks.notes.notes(), &id, "note")?;
            hooks.notes.delete(id).await?;
        }
    }
    Ok(())
}
