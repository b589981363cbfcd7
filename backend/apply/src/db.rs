//! Database layer: pool setup, migrations and queries.
//!
//! Every query takes a `&mut SqliteConnection` so the same function runs
//! on a plain pooled connection or inside a transaction (`&mut *tx`).

use std::str::FromStr;

use grant_workflow::{
    project::{NewProject, ProjectChange},
    types::{
        Approval, Contract, ContractId, Determination, DeterminationId, DocumentCategory, Outcome,
        PacketFile, PacketFileId, Project, ProjectId, ProjectStatus, Role, Submission,
        SubmissionId, User, UserId,
    },
    Event, WorkflowError, WorkflowKind, WorkflowStatus,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use tracing::info;

use crate::errors::Result;
use crate::events::{entity_columns, ActivityRecord};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ─────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    full_name: String,
    email: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = WorkflowError;

    fn try_from(row: UserRow) -> std::result::Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            role: Role::from_str(&row.role)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: i64,
    title: String,
    user_id: i64,
    lead_id: Option<i64>,
    workflow: String,
    status: String,
    previous_id: Option<i64>,
    created_at: i64,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = WorkflowError;

    fn try_from(row: SubmissionRow) -> std::result::Result<Self, Self::Error> {
        let workflow = WorkflowKind::from_str(&row.workflow)?;
        let status = WorkflowStatus::from_str(&row.status)?;
        workflow.check(status)?;
        Ok(Submission {
            id: row.id,
            title: row.title,
            user: row.user_id,
            lead: row.lead_id,
            workflow,
            status,
            previous: row.previous_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeterminationRow {
    id: i64,
    submission_id: i64,
    author_id: i64,
    outcome: String,
    is_draft: bool,
    message: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DeterminationRow> for Determination {
    type Error = WorkflowError;

    fn try_from(row: DeterminationRow) -> std::result::Result<Self, Self::Error> {
        Ok(Determination {
            id: row.id,
            submission: row.submission_id,
            author: row.author_id,
            outcome: Outcome::from_str(&row.outcome)?,
            is_draft: row.is_draft,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    submission_id: i64,
    title: String,
    user_id: i64,
    lead_id: Option<i64>,
    value: i64,
    status: String,
    is_locked: bool,
    created_at: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = WorkflowError;

    fn try_from(row: ProjectRow) -> std::result::Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            submission: row.submission_id,
            title: row.title,
            user: row.user_id,
            lead: row.lead_id,
            value: row.value,
            status: ProjectStatus::from_str(&row.status)?,
            is_locked: row.is_locked,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: i64,
    project_id: i64,
    file: String,
    is_signed: bool,
    approver_id: Option<i64>,
    approved_at: Option<i64>,
    created_at: i64,
}

impl From<ContractRow> for Contract {
    fn from(row: ContractRow) -> Self {
        Contract {
            id: row.id,
            project: row.project_id,
            file: row.file,
            is_signed: row.is_signed,
            approver: row.approver_id,
            approved_at: row.approved_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PacketFileRow {
    id: i64,
    project_id: i64,
    category_id: i64,
    title: String,
    document: String,
    created_at: i64,
}

impl From<PacketFileRow> for PacketFile {
    fn from(row: PacketFileRow) -> Self {
        PacketFile {
            id: row.id,
            project: row.project_id,
            category: row.category_id,
            title: row.title,
            document: row.document,
            created_at: row.created_at,
        }
    }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = WorkflowError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(Into::into))
        .collect()
}

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

pub async fn get_user(conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, full_name, email, role FROM users WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(User::try_from).transpose()?)
}

#[cfg(test)]
pub async fn insert_user(
    conn: &mut SqliteConnection,
    full_name: &str,
    email: &str,
    role: Role,
) -> Result<UserId> {
    let id = sqlx::query("INSERT INTO users (full_name, email, role) VALUES (?1, ?2, ?3)")
        .bind(full_name)
        .bind(email)
        .bind(role.as_str())
        .execute(conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

// ─────────────────────────────────────────────────────────
// Submissions
// ─────────────────────────────────────────────────────────

/// Columns of a submission about to be inserted.
#[derive(Debug, Clone)]
pub struct SubmissionInsert<'a> {
    pub title: &'a str,
    pub user: UserId,
    pub lead: Option<UserId>,
    pub workflow: WorkflowKind,
    pub status: WorkflowStatus,
    pub previous: Option<SubmissionId>,
}

pub async fn insert_submission(
    conn: &mut SqliteConnection,
    new: &SubmissionInsert<'_>,
) -> Result<SubmissionId> {
    let id = sqlx::query(
        r#"
        INSERT INTO submissions (title, user_id, lead_id, workflow, status, previous_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(new.title)
    .bind(new.user)
    .bind(new.lead)
    .bind(new.workflow.as_str())
    .bind(new.status.as_str())
    .bind(new.previous)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_submission(
    conn: &mut SqliteConnection,
    id: SubmissionId,
) -> Result<Option<Submission>> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT id, title, user_id, lead_id, workflow, status, previous_id, created_at
        FROM   submissions
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Submission::try_from).transpose()?)
}

/// The later-stage submission progressed from `id`, if any.
pub async fn get_next_submission(
    conn: &mut SqliteConnection,
    id: SubmissionId,
) -> Result<Option<Submission>> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT id, title, user_id, lead_id, workflow, status, previous_id, created_at
        FROM   submissions
        WHERE  previous_id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Submission::try_from).transpose()?)
}

pub async fn set_submission_status(
    conn: &mut SqliteConnection,
    id: SubmissionId,
    status: WorkflowStatus,
) -> Result<()> {
    sqlx::query("UPDATE submissions SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Determinations
// ─────────────────────────────────────────────────────────

/// Determinations of a submission, oldest first.
pub async fn list_determinations(
    conn: &mut SqliteConnection,
    submission: SubmissionId,
) -> Result<Vec<Determination>> {
    let rows = sqlx::query_as::<_, DeterminationRow>(
        r#"
        SELECT id, submission_id, author_id, outcome, is_draft, message, created_at, updated_at
        FROM   determinations
        WHERE  submission_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(submission)
    .fetch_all(conn)
    .await?;
    convert(rows)
}

pub async fn insert_determination(
    conn: &mut SqliteConnection,
    submission: SubmissionId,
    author: UserId,
    outcome: Outcome,
    is_draft: bool,
    message: &str,
) -> Result<DeterminationId> {
    let ts = now();
    let id = sqlx::query(
        r#"
        INSERT INTO determinations
            (submission_id, author_id, outcome, is_draft, message, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        "#,
    )
    .bind(submission)
    .bind(author)
    .bind(outcome.as_str())
    .bind(is_draft)
    .bind(message)
    .bind(ts)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Overwrite a determination's outcome and message. Passing
/// `is_draft = false` finalises it.
/// Rewrite a draft, optionally finalising it. Submitted determinations are
/// never touched; returns `false` when `id` is not a draft.
pub async fn update_draft_determination(
    conn: &mut SqliteConnection,
    id: DeterminationId,
    author: UserId,
    outcome: Outcome,
    is_draft: bool,
    message: &str,
) -> Result<bool> {
    let affected = sqlx::query(
        r#"
        UPDATE determinations
        SET    author_id = ?1, outcome = ?2, is_draft = ?3, message = ?4, updated_at = ?5
        WHERE  id = ?6 AND is_draft = 1
        "#,
    )
    .bind(author)
    .bind(outcome.as_str())
    .bind(is_draft)
    .bind(message)
    .bind(now())
    .bind(id)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

// ─────────────────────────────────────────────────────────
// Projects & approvals
// ─────────────────────────────────────────────────────────

pub async fn insert_project(conn: &mut SqliteConnection, new: &NewProject) -> Result<ProjectId> {
    let id = sqlx::query(
        r#"
        INSERT INTO projects
            (submission_id, title, user_id, lead_id, value, status, is_locked, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(new.submission)
    .bind(&new.title)
    .bind(new.user)
    .bind(new.lead)
    .bind(new.value)
    .bind(new.status.as_str())
    .bind(new.is_locked)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

const PROJECT_COLUMNS: &str =
    "id, submission_id, title, user_id, lead_id, value, status, is_locked, created_at";

pub async fn get_project(conn: &mut SqliteConnection, id: ProjectId) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Project::try_from).transpose()?)
}

pub async fn get_project_for_submission(
    conn: &mut SqliteConnection,
    submission: SubmissionId,
) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE submission_id = ?1"
    ))
    .bind(submission)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Project::try_from).transpose()?)
}

pub async fn set_project_state(
    conn: &mut SqliteConnection,
    id: ProjectId,
    change: &ProjectChange,
) -> Result<()> {
    sqlx::query("UPDATE projects SET status = ?1, is_locked = ?2 WHERE id = ?3")
        .bind(change.status.as_str())
        .bind(change.is_locked)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_project_status(
    conn: &mut SqliteConnection,
    id: ProjectId,
    status: ProjectStatus,
) -> Result<()> {
    sqlx::query("UPDATE projects SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_project_lead(
    conn: &mut SqliteConnection,
    id: ProjectId,
    lead: UserId,
) -> Result<()> {
    sqlx::query("UPDATE projects SET lead_id = ?1 WHERE id = ?2")
        .bind(lead)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_project_details(
    conn: &mut SqliteConnection,
    id: ProjectId,
    title: &str,
    value: i64,
) -> Result<()> {
    sqlx::query("UPDATE projects SET title = ?1, value = ?2 WHERE id = ?3")
        .bind(title)
        .bind(value)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_approval(
    conn: &mut SqliteConnection,
    project: ProjectId,
    by: UserId,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO approvals (project_id, by_id, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(project)
    .bind(by)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn list_approvals(
    conn: &mut SqliteConnection,
    project: ProjectId,
) -> Result<Vec<Approval>> {
    let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, project_id, by_id, created_at
        FROM   approvals
        WHERE  project_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(project)
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, project, by, created_at)| Approval {
            id,
            project,
            by,
            created_at,
        })
        .collect())
}

// ─────────────────────────────────────────────────────────
// Contracts
// ─────────────────────────────────────────────────────────

pub async fn list_contracts(
    conn: &mut SqliteConnection,
    project: ProjectId,
) -> Result<Vec<Contract>> {
    let rows = sqlx::query_as::<_, ContractRow>(
        r#"
        SELECT id, project_id, file, is_signed, approver_id, approved_at, created_at
        FROM   contracts
        WHERE  project_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(project)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Contract::from).collect())
}

pub async fn get_contract(
    conn: &mut SqliteConnection,
    id: ContractId,
) -> Result<Option<Contract>> {
    let row = sqlx::query_as::<_, ContractRow>(
        r#"
        SELECT id, project_id, file, is_signed, approver_id, approved_at, created_at
        FROM   contracts
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Contract::from))
}

/// Insert a contract row; the storage key is assigned once the id is known.
pub async fn insert_contract(
    conn: &mut SqliteConnection,
    project: ProjectId,
    is_signed: bool,
) -> Result<ContractId> {
    let id = sqlx::query(
        "INSERT INTO contracts (project_id, file, is_signed, created_at) VALUES (?1, '', ?2, ?3)",
    )
    .bind(project)
    .bind(is_signed)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn set_contract_file(
    conn: &mut SqliteConnection,
    id: ContractId,
    file: &str,
) -> Result<()> {
    sqlx::query("UPDATE contracts SET file = ?1 WHERE id = ?2")
        .bind(file)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn approve_contract(
    conn: &mut SqliteConnection,
    id: ContractId,
    approver: UserId,
) -> Result<()> {
    sqlx::query("UPDATE contracts SET approver_id = ?1, approved_at = ?2 WHERE id = ?3")
        .bind(approver)
        .bind(now())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Document packet
// ─────────────────────────────────────────────────────────

#[cfg(test)]
pub async fn insert_document_category(
    conn: &mut SqliteConnection,
    name: &str,
    required: bool,
) -> Result<i64> {
    let id = sqlx::query("INSERT INTO document_categories (name, required) VALUES (?1, ?2)")
        .bind(name)
        .bind(required)
        .execute(conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn list_document_categories(
    conn: &mut SqliteConnection,
) -> Result<Vec<DocumentCategory>> {
    let rows: Vec<(i64, String, bool)> =
        sqlx::query_as("SELECT id, name, required FROM document_categories ORDER BY name ASC")
            .fetch_all(conn)
            .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name, required)| DocumentCategory { id, name, required })
        .collect())
}

pub async fn category_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM document_categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn list_packet_files(
    conn: &mut SqliteConnection,
    project: ProjectId,
) -> Result<Vec<PacketFile>> {
    let rows = sqlx::query_as::<_, PacketFileRow>(
        r#"
        SELECT id, project_id, category_id, title, document, created_at
        FROM   packet_files
        WHERE  project_id = ?1
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(project)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(PacketFile::from).collect())
}

pub async fn get_packet_file(
    conn: &mut SqliteConnection,
    id: PacketFileId,
) -> Result<Option<PacketFile>> {
    let row = sqlx::query_as::<_, PacketFileRow>(
        r#"
        SELECT id, project_id, category_id, title, document, created_at
        FROM   packet_files
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(PacketFile::from))
}

pub async fn insert_packet_file(
    conn: &mut SqliteConnection,
    project: ProjectId,
    category: i64,
    title: &str,
) -> Result<PacketFileId> {
    let id = sqlx::query(
        r#"
        INSERT INTO packet_files (project_id, category_id, title, document, created_at)
        VALUES (?1, ?2, ?3, '', ?4)
        "#,
    )
    .bind(project)
    .bind(category)
    .bind(title)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn set_packet_file_document(
    conn: &mut SqliteConnection,
    id: PacketFileId,
    document: &str,
) -> Result<()> {
    sqlx::query("UPDATE packet_files SET document = ?1 WHERE id = ?2")
        .bind(document)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns `false` when the row was already gone.
pub async fn delete_packet_file(conn: &mut SqliteConnection, id: PacketFileId) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM packet_files WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

// ─────────────────────────────────────────────────────────
// Activity feed
// ─────────────────────────────────────────────────────────

pub async fn insert_activity(conn: &mut SqliteConnection, event: &Event) -> Result<i64> {
    let (source_type, source_id) = entity_columns(&event.source);
    let (related_type, related_id) = match &event.related {
        Some(related) => {
            let (kind, id) = entity_columns(related);
            (Some(kind), id)
        }
        None => (None, None),
    };

    let id = sqlx::query(
        r#"
        INSERT INTO activities
            (kind, actor_id, source_type, source_id, related_type, related_id,
             comment, title, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(event.kind.as_str())
    .bind(event.actor)
    .bind(source_type)
    .bind(source_id)
    .bind(related_type)
    .bind(related_id)
    .bind(&event.comment)
    .bind(&event.title)
    .bind(now())
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Activities whose source is the given record, oldest first.
pub async fn list_activities(
    conn: &mut SqliteConnection,
    source_type: &str,
    source_id: i64,
) -> Result<Vec<ActivityRecord>> {
    let rows = sqlx::query_as::<_, ActivityRecord>(
        r#"
        SELECT id, kind, actor_id, source_type, source_id, related_type, related_id,
               comment, title, created_at
        FROM   activities
        WHERE  source_type = ?1 AND source_id = ?2
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(source_type)
    .bind(source_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
