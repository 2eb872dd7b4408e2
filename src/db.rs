use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::types::{ToSql, Type, Value as SqlValue};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::models::{Job, JobLabel, JobStatus, Note, Profile, Reminder, ReminderKind};
use crate::remote::{Collection, Operation, Order, RemoteDataService};
use crate::session::{Identity, Session};

/// Local SQLite stand-in for the hosted backend.
///
/// Implements the same row contract as the REST backend: the database assigns
/// ids and timestamps, embeds the job label into notes and reminders, rejects
/// unknown columns, and only ever shows a user their own rows. It also acts as
/// the sign-in provider for the command line.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    session: Session,
}

impl Database {
    pub fn open(path: &Path, session: Session) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::with_connection(conn, Some(path.to_path_buf()), session)
    }

    pub fn open_in_memory(session: Session) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self::with_connection(conn, None, session)?;
        db.init()?;
        Ok(db)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>, session: Session) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            session,
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "applytrack")
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("applytrack.db"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn init(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                company TEXT NOT NULL,
                position TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Applied'
                    CHECK (status IN ('Applied', 'Interview', 'Offer', 'Rejected', 'Waiting')),
                applied_date TEXT NOT NULL,
                salary TEXT,
                location TEXT,
                job_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                job_id TEXT REFERENCES jobs(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                description TEXT,
                due_date TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'Follow-up'
                    CHECK (type IN ('Follow-up', 'Interview Prep', 'Thank You', 'Other')),
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                job_id TEXT REFERENCES jobs(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                pin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS active_session (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_user ON jobs(user_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_job ON reminders(job_id);
            CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);
            CREATE INDEX IF NOT EXISTS idx_notes_job ON notes(job_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'applytrack init' first."
            ));
        }
        Ok(())
    }

    // --- Sign-in ---

    /// Sign in as `email`, creating the profile on first use, and remember the
    /// session for later runs.
    pub fn sign_in(&self, email: &str, full_name: Option<&str>) -> Result<Identity> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            bail!("An email address is required to sign in");
        }

        let id = {
            let conn = self.conn();
            let existing = conn.query_row(
                "SELECT id FROM profiles WHERE LOWER(email) = ?1",
                [&email],
                |row| row.get::<_, String>(0),
            );
            let id = match existing {
                Ok(id) => {
                    let id = Uuid::parse_str(&id)?;
                    if let Some(name) = full_name {
                        conn.execute(
                            "UPDATE profiles SET full_name = ?1, updated_at = ?2 WHERE id = ?3",
                            params![name, now_timestamp(), id.to_string()],
                        )?;
                    }
                    id
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    let id = Uuid::new_v4();
                    let now = now_timestamp();
                    conn.execute(
                        "INSERT INTO profiles (id, email, full_name, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![id.to_string(), email, full_name, now],
                    )?;
                    id
                }
                Err(e) => return Err(e.into()),
            };
            conn.execute(
                "INSERT INTO active_session (slot, user_id) VALUES (1, ?1)
                 ON CONFLICT(slot) DO UPDATE SET user_id = excluded.user_id",
                [id.to_string()],
            )?;
            id
        };

        let identity = Identity::new(id, &email);
        self.session.sign_in(identity.clone());
        Ok(identity)
    }

    /// Pick up the session left by a previous `sign_in`, if any.
    pub fn restore_session(&self) -> Result<Option<Identity>> {
        let result = self.conn().query_row(
            "SELECT p.id, p.email FROM active_session s JOIN profiles p ON p.id = s.user_id",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );
        let (id, email) = match result {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let identity = Identity::new(Uuid::parse_str(&id)?, &email);
        self.session.sign_in(identity.clone());
        Ok(Some(identity))
    }

    pub fn sign_out(&self) -> Result<()> {
        self.conn().execute("DELETE FROM active_session", [])?;
        self.session.sign_out();
        Ok(())
    }

    // --- Row access ---

    fn authenticated(&self, collection: Collection, operation: Operation) -> Result<Uuid, RemoteError> {
        self.session
            .current()
            .map(|identity| identity.user_id)
            .ok_or_else(|| RemoteError::new(collection, operation, "not authenticated"))
    }

    fn select_rows(&self, collection: Collection, clause: &str, params: &[&dyn ToSql]) -> Result<Vec<Value>> {
        let (base, _) = select_sql(collection);
        let sql = format!("{} {}", base, clause);
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let values = match collection {
            Collection::Jobs => to_json(stmt.query_map(params, row_to_job)?)?,
            Collection::Reminders => to_json(stmt.query_map(params, row_to_reminder)?)?,
            Collection::Notes => to_json(stmt.query_map(params, row_to_note)?)?,
            Collection::Profiles => to_json(stmt.query_map(params, row_to_profile)?)?,
        };
        Ok(values)
    }

    fn select_owned(&self, collection: Collection, owner: Uuid, order: Order) -> Result<Vec<Value>> {
        let (_, alias) = select_sql(collection);
        if !columns(collection).contains(&order.column) {
            bail!("column '{}' does not exist on '{}'", order.column, collection);
        }
        let direction = if order.ascending { "ASC" } else { "DESC" };
        let clause = format!(
            "WHERE {alias}.{owner_col} = ?1 ORDER BY {alias}.\"{column}\" {direction}, {alias}.rowid {direction}",
            owner_col = collection.owner_column(),
            column = order.column,
        );
        self.select_rows(collection, &clause, params![owner.to_string()])
    }

    fn select_one(&self, collection: Collection, id: Uuid, owner: Uuid) -> Result<Value> {
        let (_, alias) = select_sql(collection);
        let clause = format!(
            "WHERE {alias}.id = ?1 AND {alias}.{owner_col} = ?2",
            owner_col = collection.owner_column(),
        );
        self.select_rows(collection, &clause, params![id.to_string(), owner.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no {} row with id {}", collection, id))
    }

    fn insert_row(&self, collection: Collection, row: Value, owner: Uuid) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = now_timestamp();
        let conn = self.conn();

        match collection {
            Collection::Jobs => {
                let job: JobInsert = serde_json::from_value(row).context("Invalid job row")?;
                check_owner(job.user_id, owner)?;
                conn.execute(
                    "INSERT INTO jobs (id, user_id, company, position, status, applied_date,
                                       salary, location, job_url, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    params![
                        id.to_string(),
                        job.user_id.to_string(),
                        job.company,
                        job.position,
                        job.status.as_str(),
                        job.applied_date.to_string(),
                        job.salary,
                        job.location,
                        job.job_url,
                        now
                    ],
                )?;
            }
            Collection::Reminders => {
                let reminder: ReminderInsert =
                    serde_json::from_value(row).context("Invalid reminder row")?;
                check_owner(reminder.user_id, owner)?;
                conn.execute(
                    "INSERT INTO reminders (id, user_id, job_id, title, description, due_date,
                                            type, completed, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    params![
                        id.to_string(),
                        reminder.user_id.to_string(),
                        reminder.job_id.map(|j| j.to_string()),
                        reminder.title,
                        reminder.description,
                        reminder.due_date.to_string(),
                        reminder.kind.as_str(),
                        reminder.completed,
                        now
                    ],
                )?;
            }
            Collection::Notes => {
                let note: NoteInsert = serde_json::from_value(row).context("Invalid note row")?;
                check_owner(note.user_id, owner)?;
                conn.execute(
                    "INSERT INTO notes (id, user_id, job_id, title, content, pin, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        id.to_string(),
                        note.user_id.to_string(),
                        note.job_id.map(|j| j.to_string()),
                        note.title,
                        note.content,
                        note.pin,
                        now
                    ],
                )?;
            }
            Collection::Profiles => bail!("profiles are created by signing in"),
        }
        Ok(id)
    }

    fn update_row(&self, collection: Collection, id: Uuid, patch: Value, owner: Uuid) -> Result<()> {
        let Value::Object(fields) = patch else {
            bail!("update body must be a JSON object");
        };

        let mut assignments = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();
        for (column, value) in fields {
            let kind = updatable_columns(collection)
                .iter()
                .find(|(name, _)| *name == column)
                .map(|(_, kind)| *kind)
                .ok_or_else(|| anyhow!("column '{}' of '{}' cannot be updated", column, collection))?;
            values.push(
                kind.convert(value)
                    .with_context(|| format!("Invalid value for '{}'", column))?,
            );
            assignments.push(format!("\"{}\" = ?{}", column, values.len()));
        }
        values.push(SqlValue::Text(now_timestamp()));
        assignments.push(format!("updated_at = ?{}", values.len()));

        let sql = format!(
            "UPDATE {table} SET {set} WHERE id = ?{id_idx} AND {owner_col} = ?{owner_idx}",
            table = collection.table(),
            set = assignments.join(", "),
            id_idx = values.len() + 1,
            owner_col = collection.owner_column(),
            owner_idx = values.len() + 2,
        );
        values.push(SqlValue::Text(id.to_string()));
        values.push(SqlValue::Text(owner.to_string()));

        let changed = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(values))?;
        if changed == 0 {
            bail!("no {} row with id {}", collection, id);
        }
        Ok(())
    }

    fn delete_row(&self, collection: Collection, id: Uuid, owner: Uuid) -> Result<()> {
        // Rows hidden from this user are silently left alone
        self.conn().execute(
            &format!(
                "DELETE FROM {} WHERE id = ?1 AND {} = ?2",
                collection.table(),
                collection.owner_column()
            ),
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(())
    }
}

fn remote_failure(collection: Collection, operation: Operation, err: anyhow::Error) -> RemoteError {
    RemoteError::new(collection, operation, format!("{:#}", err))
}

#[async_trait]
impl RemoteDataService for Database {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner: Uuid,
        order: Order,
    ) -> Result<Vec<Value>, RemoteError> {
        let user = self.authenticated(collection, Operation::Select)?;
        if owner != user {
            // Other users' rows are invisible, not an error
            return Ok(Vec::new());
        }
        self.select_owned(collection, owner, order)
            .map_err(|e| remote_failure(collection, Operation::Select, e))
    }

    async fn select_by_id(&self, collection: Collection, id: Uuid) -> Result<Value, RemoteError> {
        let user = self.authenticated(collection, Operation::SelectById)?;
        self.select_one(collection, id, user)
            .map_err(|e| remote_failure(collection, Operation::SelectById, e))
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, RemoteError> {
        let user = self.authenticated(collection, Operation::Insert)?;
        self.insert_row(collection, row, user)
            .and_then(|id| self.select_one(collection, id, user))
            .map_err(|e| remote_failure(collection, Operation::Insert, e))
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        let user = self.authenticated(collection, Operation::Update)?;
        self.update_row(collection, id, patch, user)
            .and_then(|()| self.select_one(collection, id, user))
            .map_err(|e| remote_failure(collection, Operation::Update, e))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), RemoteError> {
        let user = self.authenticated(collection, Operation::Delete)?;
        self.delete_row(collection, id, user)
            .map_err(|e| remote_failure(collection, Operation::Delete, e))
    }
}

// --- Insert payloads as the backend accepts them ---

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JobInsert {
    user_id: Uuid,
    company: String,
    position: String,
    status: JobStatus,
    applied_date: NaiveDate,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    job_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReminderInsert {
    user_id: Uuid,
    #[serde(default)]
    job_id: Option<Uuid>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    due_date: NaiveDate,
    #[serde(rename = "type")]
    kind: ReminderKind,
    #[serde(default)]
    completed: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoteInsert {
    user_id: Uuid,
    #[serde(default)]
    job_id: Option<Uuid>,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    pin: bool,
}

fn check_owner(row_owner: Uuid, user: Uuid) -> Result<()> {
    if row_owner != user {
        bail!("new row violates row-level security policy");
    }
    Ok(())
}

// --- Column metadata ---

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    NullableText,
    Date,
    NullableId,
    Flag,
}

impl ColumnKind {
    fn convert(self, value: Value) -> Result<SqlValue> {
        let converted = match (self, value) {
            (ColumnKind::NullableText | ColumnKind::NullableId, Value::Null) => SqlValue::Null,
            (ColumnKind::Text | ColumnKind::NullableText, Value::String(s)) => SqlValue::Text(s),
            (ColumnKind::Date, Value::String(s)) => {
                SqlValue::Text(NaiveDate::from_str(&s)?.to_string())
            }
            (ColumnKind::NullableId, Value::String(s)) => {
                SqlValue::Text(Uuid::parse_str(&s)?.to_string())
            }
            (ColumnKind::Flag, Value::Bool(b)) => SqlValue::Integer(i64::from(b)),
            (kind, other) => bail!("{} is not a valid {:?} value", other, kind),
        };
        Ok(converted)
    }
}

fn updatable_columns(collection: Collection) -> &'static [(&'static str, ColumnKind)] {
    use ColumnKind::*;
    match collection {
        Collection::Jobs => &[
            ("company", Text),
            ("position", Text),
            ("status", Text),
            ("applied_date", Date),
            ("salary", NullableText),
            ("location", NullableText),
            ("job_url", NullableText),
        ],
        Collection::Reminders => &[
            ("job_id", NullableId),
            ("title", Text),
            ("description", NullableText),
            ("due_date", Date),
            ("type", Text),
            ("completed", Flag),
        ],
        Collection::Notes => &[
            ("job_id", NullableId),
            ("title", Text),
            ("content", Text),
            ("pin", Flag),
        ],
        Collection::Profiles => &[("email", Text), ("full_name", NullableText)],
    }
}

fn columns(collection: Collection) -> Vec<&'static str> {
    let mut names = vec!["id", "created_at", "updated_at"];
    if collection != Collection::Profiles {
        names.push("user_id");
    }
    names.extend(updatable_columns(collection).iter().map(|(name, _)| *name));
    names
}

fn select_sql(collection: Collection) -> (&'static str, &'static str) {
    match collection {
        Collection::Jobs => (
            "SELECT j.id, j.user_id, j.company, j.position, j.status, j.applied_date,
                    j.salary, j.location, j.job_url, j.created_at, j.updated_at
             FROM jobs j",
            "j",
        ),
        Collection::Reminders => (
            "SELECT r.id, r.user_id, r.job_id, r.title, r.description, r.due_date, r.type,
                    r.completed, r.created_at, r.updated_at, j.company, j.position
             FROM reminders r
             LEFT JOIN jobs j ON r.job_id = j.id",
            "r",
        ),
        Collection::Notes => (
            "SELECT n.id, n.user_id, n.job_id, n.title, n.content, n.pin,
                    n.created_at, n.updated_at, j.company, j.position
             FROM notes n
             LEFT JOIN jobs j ON n.job_id = j.id",
            "n",
        ),
        Collection::Profiles => (
            "SELECT p.id, p.email, p.full_name, p.created_at, p.updated_at FROM profiles p",
            "p",
        ),
    }
}

// --- Row mapping ---

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<Value>> {
    rows.map(|row| Ok(serde_json::to_value(row?)?)).collect()
}

fn parse_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_col<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn job_label(row: &Row, idx: usize) -> rusqlite::Result<Option<JobLabel>> {
    let company: Option<String> = row.get(idx)?;
    let position: Option<String> = row.get(idx + 1)?;
    Ok(match (company, position) {
        (Some(company), Some(position)) => Some(JobLabel { company, position }),
        _ => None,
    })
}

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        company: row.get(2)?,
        position: row.get(3)?,
        status: parse_col(row, 4)?,
        applied_date: parse_col(row, 5)?,
        salary: row.get(6)?,
        location: row.get(7)?,
        job_url: row.get(8)?,
        created_at: parse_col(row, 9)?,
        updated_at: parse_col(row, 10)?,
    })
}

fn row_to_reminder(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        job_id: parse_opt_col(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        due_date: parse_col(row, 5)?,
        kind: parse_col(row, 6)?,
        completed: row.get(7)?,
        created_at: parse_col(row, 8)?,
        updated_at: parse_col(row, 9)?,
        job: job_label(row, 10)?,
    })
}

fn row_to_note(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        job_id: parse_opt_col(row, 2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        pin: row.get(5)?,
        created_at: parse_col(row, 6)?,
        updated_at: parse_col(row, 7)?,
        job: job_label(row, 8)?,
    })
}

fn row_to_profile(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: parse_col(row, 0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        created_at: parse_col(row, 3)?,
        updated_at: parse_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signed_in_db() -> (Database, Identity) {
        let db = Database::open_in_memory(Session::new()).unwrap();
        let identity = db.sign_in("alice@example.com", Some("Alice")).unwrap();
        (db, identity)
    }

    fn job_row(owner: Uuid, company: &str) -> Value {
        json!({
            "user_id": owner,
            "company": company,
            "position": "Engineer",
            "status": "Applied",
            "applied_date": "2024-01-01",
        })
    }

    #[test]
    fn test_init_is_idempotent() {
        let db = Database::open_in_memory(Session::new()).unwrap();
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_ensure_initialized_before_init() {
        let conn = Connection::open_in_memory().unwrap();
        let db = Database::with_connection(conn, None, Session::new()).unwrap();
        assert!(db.ensure_initialized().is_err());
    }

    #[test]
    fn test_sign_in_reuses_profile_and_updates_session() {
        let db = Database::open_in_memory(Session::new()).unwrap();
        let first = db.sign_in("Alice@Example.com", None).unwrap();
        let again = db.sign_in("alice@example.com", Some("Alice A.")).unwrap();
        assert_eq!(first.user_id, again.user_id);
        assert_eq!(db.session().current().unwrap().user_id, first.user_id);

        db.sign_out().unwrap();
        assert!(db.session().current().is_none());
        assert!(db.restore_session().unwrap().is_none());
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applytrack.db");

        let db = Database::open(&path, Session::new()).unwrap();
        db.init().unwrap();
        let identity = db.sign_in("alice@example.com", None).unwrap();
        drop(db);

        let reopened = Database::open(&path, Session::new()).unwrap();
        reopened.ensure_initialized().unwrap();
        let restored = reopened.restore_session().unwrap().unwrap();
        assert_eq!(restored, identity);
        assert_eq!(reopened.session().current(), Some(identity));
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let (db, alice) = signed_in_db();
        let row = db.insert(Collection::Jobs, job_row(alice.user_id, "Acme")).await.unwrap();
        let job: Job = serde_json::from_value(row).unwrap();
        assert_eq!(job.company, "Acme");
        assert_eq!(job.user_id, alice.user_id);
        assert_eq!(job.status, JobStatus::Applied);
        assert_eq!(job.created_at, job.updated_at);
    }

    #[tokio::test]
    async fn test_select_is_newest_first() {
        let (db, alice) = signed_in_db();
        for company in ["First", "Second", "Third"] {
            db.insert(Collection::Jobs, job_row(alice.user_id, company)).await.unwrap();
        }
        let rows = db
            .select_by_owner(Collection::Jobs, alice.user_id, Order::newest_first())
            .await
            .unwrap();
        let companies: Vec<_> = rows.iter().map(|r| r["company"].as_str().unwrap()).collect();
        assert_eq!(companies, vec!["Third", "Second", "First"]);
    }

    #[tokio::test]
    async fn test_rows_of_other_users_are_invisible() {
        let (db, alice) = signed_in_db();
        let row = db.insert(Collection::Jobs, job_row(alice.user_id, "Acme")).await.unwrap();
        let job_id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let bob = db.sign_in("bob@example.com", None).unwrap();
        let mine = db
            .select_by_owner(Collection::Jobs, bob.user_id, Order::newest_first())
            .await
            .unwrap();
        assert!(mine.is_empty());
        let theirs = db
            .select_by_owner(Collection::Jobs, alice.user_id, Order::newest_first())
            .await
            .unwrap();
        assert!(theirs.is_empty());

        assert!(db.select_by_id(Collection::Jobs, job_id).await.is_err());
        assert!(db
            .update(Collection::Jobs, job_id, json!({ "status": "Offer" }))
            .await
            .is_err());
        db.delete(Collection::Jobs, job_id).await.unwrap();

        // Still there for its owner
        db.sign_in("alice@example.com", None).unwrap();
        assert!(db.select_by_id(Collection::Jobs, job_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_for_someone_else_is_rejected() {
        let (db, _alice) = signed_in_db();
        let err = db
            .insert(Collection::Jobs, job_row(Uuid::new_v4(), "Acme"))
            .await
            .unwrap_err();
        assert_eq!(err.operation, Operation::Insert);
        assert!(err.message.contains("row-level security"));
    }

    #[tokio::test]
    async fn test_calls_without_session_fail() {
        let db = Database::open_in_memory(Session::new()).unwrap();
        let err = db
            .select_by_owner(Collection::Notes, Uuid::new_v4(), Order::newest_first())
            .await
            .unwrap_err();
        assert_eq!(err.message, "not authenticated");
    }

    #[tokio::test]
    async fn test_unknown_columns_are_rejected() {
        let (db, alice) = signed_in_db();
        let mut row = job_row(alice.user_id, "Acme");
        row["title"] = json!("stray note title");
        assert!(db.insert(Collection::Jobs, row).await.is_err());

        let row = db.insert(Collection::Jobs, job_row(alice.user_id, "Acme")).await.unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();
        assert!(db.update(Collection::Jobs, id, json!({ "user_id": Uuid::new_v4() })).await.is_err());
        assert!(db.update(Collection::Jobs, id, json!({ "status": "Hired" })).await.is_err());
        assert!(db.update(Collection::Jobs, id, json!({ "applied_date": "soon" })).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_update_echoes_row() {
        let (db, alice) = signed_in_db();
        let row = db.insert(Collection::Jobs, job_row(alice.user_id, "Acme")).await.unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let updated = db
            .update(Collection::Jobs, id, json!({ "status": "Interview", "salary": "120k" }))
            .await
            .unwrap();
        let job: Job = serde_json::from_value(updated).unwrap();
        assert_eq!(job.status, JobStatus::Interview);
        assert_eq!(job.salary.as_deref(), Some("120k"));
        assert_eq!(job.company, "Acme");
        assert!(job.updated_at >= job.created_at);
    }

    #[tokio::test]
    async fn test_notes_embed_job_label_and_survive_job_delete() {
        let (db, alice) = signed_in_db();
        let job = db.insert(Collection::Jobs, job_row(alice.user_id, "Acme")).await.unwrap();
        let job_id = Uuid::parse_str(job["id"].as_str().unwrap()).unwrap();

        let note = db
            .insert(
                Collection::Notes,
                json!({ "user_id": alice.user_id, "job_id": job_id, "title": "Prep", "content": "STAR" }),
            )
            .await
            .unwrap();
        let note: Note = serde_json::from_value(note).unwrap();
        assert_eq!(note.job.as_ref().unwrap().company, "Acme");
        assert!(!note.pin);

        db.delete(Collection::Jobs, job_id).await.unwrap();
        let note = db.select_by_id(Collection::Notes, note.id).await.unwrap();
        let note: Note = serde_json::from_value(note).unwrap();
        assert_eq!(note.job_id, None);
        assert_eq!(note.job, None);
    }

    #[tokio::test]
    async fn test_profile_is_selected_by_owner_id() {
        let (db, alice) = signed_in_db();
        let row = db.select_by_id(Collection::Profiles, alice.user_id).await.unwrap();
        let profile: Profile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.full_name.as_deref(), Some("Alice"));

        assert!(db
            .insert(Collection::Profiles, json!({ "id": alice.user_id, "email": "x@y.z" }))
            .await
            .is_err());
    }
}
