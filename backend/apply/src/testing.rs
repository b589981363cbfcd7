//! Test doubles and fixtures shared by the service tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use grant_workflow::{
    project::NewProject,
    types::{ContractId, DeterminationId, Outcome, Project, ProjectStatus, Role, Submission, User},
    Event, EventKind, WorkflowKind, WorkflowStatus,
};
use serde_json::Value;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use tower::ServiceExt;

use crate::api::{self, ApiState, USER_HEADER};
use crate::db::{self, SubmissionInsert};
use crate::errors::Result;
use crate::notify::{Messenger, Notifier};
use crate::storage::{DocumentReader, DocumentStore};

/// A single-connection in-memory database with migrations applied. The
/// connection is never recycled, so the data lives as long as the pool.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    db::migrate(&pool).await.unwrap();
    pool
}

// ─────────────────────────────────────────────────────────
// Doubles
// ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Option<DocumentReader>> {
        Ok(self
            .get(key)
            .map(|bytes| Box::pin(Cursor::new(bytes)) as DocumentReader))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().remove(key).is_some())
    }
}

// ─────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────

/// Service state over an in-memory database, with one applicant and two
/// staff members already registered.
pub struct Harness {
    pub state: Arc<ApiState>,
    pub notifier: RecordingNotifier,
    pub store: MemoryStore,
    pub staff: User,
    pub other_staff: User,
    pub applicant: User,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        let notifier = RecordingNotifier::default();
        let store = MemoryStore::default();

        let mut conn = pool.acquire().await.unwrap();
        let staff = user(&mut conn, "Grace Reviewer", "grace@example.org", Role::Staff).await;
        let other_staff = user(&mut conn, "Lin Lead", "lin@example.org", Role::Staff).await;
        let applicant = user(&mut conn, "Ada Applicant", "ada@example.org", Role::Applicant).await;
        drop(conn);

        let state = Arc::new(ApiState {
            pool,
            messenger: Messenger::new(vec![Arc::new(notifier.clone())]),
            store: Arc::new(store.clone()),
        });

        Self {
            state,
            notifier,
            store,
            staff,
            other_staff,
            applicant,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub async fn conn(&self) -> PoolConnection<Sqlite> {
        self.state.pool.acquire().await.unwrap()
    }

    /// A submission owned by the applicant and led by `staff`.
    pub async fn submission(&self, workflow: WorkflowKind, status: WorkflowStatus) -> Submission {
        let mut conn = self.conn().await;
        let id = db::insert_submission(
            &mut conn,
            &SubmissionInsert {
                title: "Community radio transmitter",
                user: self.applicant.id,
                lead: Some(self.staff.id),
                workflow,
                status,
                previous: None,
            },
        )
        .await
        .unwrap();
        db::get_submission(&mut conn, id).await.unwrap().unwrap()
    }

    pub async fn determination(
        &self,
        submission: &Submission,
        outcome: Outcome,
        is_draft: bool,
    ) -> DeterminationId {
        let mut conn = self.conn().await;
        db::insert_determination(
            &mut conn,
            submission.id,
            self.staff.id,
            outcome,
            is_draft,
            "",
        )
        .await
        .unwrap()
    }

    /// A project for a fresh accepted submission.
    pub async fn project(&self, status: ProjectStatus, is_locked: bool) -> Project {
        let submission = self
            .submission(WorkflowKind::Request, WorkflowStatus::Accepted)
            .await;
        let mut conn = self.conn().await;
        let id = db::insert_project(
            &mut conn,
            &NewProject {
                submission: submission.id,
                title: submission.title.clone(),
                user: submission.user,
                lead: submission.lead,
                value: 25_000,
                status,
                is_locked,
            },
        )
        .await
        .unwrap();
        db::get_project(&mut conn, id).await.unwrap().unwrap()
    }

    pub async fn contract(
        &self,
        project: &Project,
        is_signed: bool,
        approved: bool,
    ) -> ContractId {
        let mut conn = self.conn().await;
        let id = db::insert_contract(&mut conn, project.id, is_signed)
            .await
            .unwrap();
        let key = format!("projects/{}/contracts/{id}-c.pdf", project.id);
        db::set_contract_file(&mut conn, id, &key).await.unwrap();
        if approved {
            db::approve_contract(&mut conn, id, self.staff.id)
                .await
                .unwrap();
        }
        id
    }

    pub async fn category(&self, name: &str, required: bool) -> i64 {
        let mut conn = self.conn().await;
        db::insert_document_category(&mut conn, name, required)
            .await
            .unwrap()
    }

    pub async fn reload_submission(&self, id: i64) -> Submission {
        let mut conn = self.conn().await;
        db::get_submission(&mut conn, id).await.unwrap().unwrap()
    }

    pub async fn reload_project(&self, id: i64) -> Project {
        let mut conn = self.conn().await;
        db::get_project(&mut conn, id).await.unwrap().unwrap()
    }

    pub async fn determinations(&self, submission: i64) -> Vec<grant_workflow::Determination> {
        let mut conn = self.conn().await;
        db::list_determinations(&mut conn, submission)
            .await
            .unwrap()
    }
}

async fn user(conn: &mut sqlx::SqliteConnection, name: &str, email: &str, role: Role) -> User {
    let id = db::insert_user(conn, name, email, role).await.unwrap();
    db::get_user(conn, id).await.unwrap().unwrap()
}

// ─────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────

pub fn request(
    method: Method,
    uri: &str,
    user: Option<&User>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user.id.to_string());
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }

    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Messages of the notices in a redirect body.
    pub fn notices(&self) -> Vec<String> {
        self.json()["notices"]
            .as_array()
            .map(|notices| {
                notices
                    .iter()
                    .filter_map(|n| n["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        bytes,
    }
}
