//! Axum REST API: routing, the acting-user extractor and handlers.
//!
//! Mutating endpoints answer `303 See Other` with a `Location` header and a
//! JSON body carrying the same location and the notices to show there.
//! A notice-level workflow error is not a failure: it redirects back with
//! the message as an error notice.

use std::sync::Arc;

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequestParts, OriginalUri, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use grant_workflow::{
    project::ProjectEdit,
    redirect::{project_url, submission_url},
    types::{ContractId, DeterminationId, PacketFileId, ProjectId, SubmissionId, User, UserId},
    Notices,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::db;
use crate::determinations::{
    self, BatchBody, BatchForm, DeterminationForm, NewSubmissionForm, ProgressForm,
};
use crate::errors::{AppError, Result};
use crate::notify::Messenger;
use crate::projects::{self, CommentForm, ContractUpload, DocumentUpload, Download, LeadForm};
use crate::storage::DocumentStore;

/// Header carrying the id of the already-authenticated user.
pub const USER_HEADER: &str = "x-user-id";

pub struct ApiState {
    pub pool: SqlitePool,
    pub messenger: Messenger,
    pub store: Arc<dyn DocumentStore>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // ─── Submissions ──────────────────────────────────
        .route("/apply/submissions/", post(create_submission))
        .route(
            "/apply/submissions/batch-determination/",
            post(batch_determination),
        )
        .route("/apply/submissions/:id/", get(submission_detail))
        .route("/apply/submissions/:id/activity/", get(submission_activity))
        .route("/apply/submissions/:id/progress/", post(progress))
        .route(
            "/apply/submissions/:id/determination/",
            get(determination_form).post(determine),
        )
        .route(
            "/apply/submissions/:id/determinations/:determination_id/",
            get(determination_detail),
        )
        .route("/apply/submissions/:id/project/", post(create_project))
        // ─── Projects ─────────────────────────────────────
        .route("/apply/projects/:id/", get(project_detail))
        .route("/apply/projects/:id/edit/", post(edit_project))
        .route(
            "/apply/projects/:id/send-for-approval/",
            post(send_for_approval),
        )
        .route("/apply/projects/:id/approve/", post(create_approval))
        .route("/apply/projects/:id/request-changes/", post(request_changes))
        .route("/apply/projects/:id/lead/", post(update_lead))
        .route("/apply/projects/:id/contracts/", post(upload_contract))
        .route(
            "/apply/projects/:id/contracts/:contract_id/",
            get(download_contract),
        )
        .route(
            "/apply/projects/:id/contracts/:contract_id/approve/",
            post(approve_contract),
        )
        .route("/apply/projects/:id/documents/", post(upload_document))
        .route(
            "/apply/projects/:id/documents/:file_id/",
            get(download_document).delete(remove_document),
        )
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Acting user
// ─────────────────────────────────────────────────────────

/// The user making the request, resolved from [`USER_HEADER`].
pub struct Actor(pub User);

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?;
        let id: UserId = raw
            .trim()
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("invalid user id: {raw}")))?;

        let mut conn = state.pool.acquire().await?;
        let user = db::get_user(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("unknown user {id}")))?;
        Ok(Actor(user))
    }
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct RedirectResponse {
    pub location: String,
    pub notices: Notices,
}

#[derive(Deserialize)]
pub struct BatchQuery {
    pub next: Option<String>,
    pub submissions: Option<String>,
    pub action: Option<String>,
}

pub fn see_other(location: String, notices: Notices) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.clone())],
        Json(RedirectResponse { location, notices }),
    )
        .into_response()
}

/// Redirect to `location`, turning a notice-level error into an error
/// notice there. Anything else propagates.
fn redirect<T>(
    result: Result<T>,
    location: String,
    notices: impl FnOnce(T) -> Notices,
) -> Result<Response> {
    match result {
        Ok(value) => Ok(see_other(location, notices(value))),
        Err(e) => match e.as_notice() {
            Some(notice) => {
                let mut notices = Notices::new();
                notices.error(notice.to_string());
                Ok(see_other(location, notices))
            }
            None => Err(e),
        },
    }
}

fn stream(download: Download) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(download.reader)),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /apply/submissions/`
pub async fn create_submission(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Json(form): Json<NewSubmissionForm>,
) -> Result<Response> {
    let id = determinations::create_submission(&state, &actor, &form).await?;
    let mut notices = Notices::new();
    notices.success("Submission received");
    Ok(see_other(submission_url(id), notices))
}

/// `GET /apply/submissions/:id/`
pub async fn submission_detail(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
) -> Result<Response> {
    let view = determinations::submission_detail(&state, &actor, id).await?;
    Ok(Json(view).into_response())
}

/// `GET /apply/submissions/:id/activity/`
pub async fn submission_activity(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
) -> Result<Response> {
    let activities = determinations::submission_activity(&state, &actor, id).await?;
    Ok(Json(serde_json::json!({
        "count": activities.len(),
        "activities": activities,
    }))
    .into_response())
}

/// `POST /apply/submissions/:id/progress/`
pub async fn progress(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
    Json(form): Json<ProgressForm>,
) -> Result<Response> {
    let result = determinations::progress(&state, &actor, id, &form).await;
    redirect(result, submission_url(id), |notices| notices)
}

/// `GET /apply/submissions/:id/determination/`
///
/// Redirects back to the submission when the form cannot be used.
pub async fn determination_form(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
) -> Result<Response> {
    match determinations::determination_form(&state, &actor, id).await {
        Ok(view) => Ok(Json(view).into_response()),
        Err(e) => redirect::<()>(Err(e), submission_url(id), |_| Notices::new()),
    }
}

/// `POST /apply/submissions/:id/determination/`
pub async fn determine(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
    Json(form): Json<DeterminationForm>,
) -> Result<Response> {
    let result = determinations::determine(&state, &actor, id, &form).await;
    redirect(result, submission_url(id), |saved| {
        debug!(submission = id, determination = saved.determination, "determination saved");
        saved.notices
    })
}

/// `GET /apply/submissions/:id/determinations/:determination_id/`
pub async fn determination_detail(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path((id, determination_id)): Path<(SubmissionId, DeterminationId)>,
) -> Result<Response> {
    let determination =
        determinations::determination_detail(&state, &actor, id, determination_id).await?;
    Ok(Json(serde_json::json!({
        "label": determination.display_label(),
        "determination": determination,
    }))
    .into_response())
}

/// `POST /apply/submissions/batch-determination/?next=…`
///
/// The selection and action come from the JSON body or the query string.
/// A missing or unreadable selection or action redirects to the listing.
pub async fn batch_determination(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<BatchQuery>,
    body: Bytes,
) -> Result<Response> {
    let body: BatchBody = if body.iter().all(u8::is_ascii_whitespace) {
        BatchBody::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let form = BatchForm::from_parts(
        query.submissions.as_deref(),
        query.action.as_deref(),
        body,
    );

    let request_path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let done = determinations::batch_determine(
        &state,
        &actor,
        request_path,
        query.next.as_deref(),
        &form,
    )
    .await?;
    Ok(see_other(done.location, done.notices))
}

/// `POST /apply/submissions/:id/project/`
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<SubmissionId>,
) -> Result<Response> {
    match projects::create_project(&state, &actor, id).await {
        Ok(project) => {
            let mut notices = Notices::new();
            notices.success("Project created");
            Ok(see_other(project_url(project), notices))
        }
        Err(e) => redirect::<()>(Err(e), submission_url(id), |_| Notices::new()),
    }
}

/// `GET /apply/projects/:id/`
pub async fn project_detail(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
) -> Result<Response> {
    let detail = projects::project_detail(&state, &actor, id).await?;
    Ok(Json(detail).into_response())
}

/// `POST /apply/projects/:id/edit/`
pub async fn edit_project(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
    Json(edit): Json<ProjectEdit>,
) -> Result<Response> {
    let result = projects::edit_project(&state, &actor, id, &edit).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `POST /apply/projects/:id/send-for-approval/`
pub async fn send_for_approval(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
) -> Result<Response> {
    let result = projects::send_for_approval(&state, &actor, id).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `POST /apply/projects/:id/approve/`
pub async fn create_approval(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
) -> Result<Response> {
    let result = projects::create_approval(&state, &actor, id).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `POST /apply/projects/:id/request-changes/`
pub async fn request_changes(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
    Json(form): Json<CommentForm>,
) -> Result<Response> {
    let result = projects::request_changes(&state, &actor, id, &form).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `POST /apply/projects/:id/lead/`
pub async fn update_lead(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
    Json(form): Json<LeadForm>,
) -> Result<Response> {
    let result = projects::update_lead(&state, &actor, id, &form).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `POST /apply/projects/:id/contracts/`
pub async fn upload_contract(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
    Json(upload): Json<ContractUpload>,
) -> Result<Response> {
    let result = projects::upload_contract(&state, &actor, id, &upload).await;
    redirect(result, project_url(id), |_| {
        let mut notices = Notices::new();
        notices.success("Contract uploaded");
        notices
    })
}

/// `POST /apply/projects/:id/contracts/:contract_id/approve/`
pub async fn approve_contract(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path((id, contract_id)): Path<(ProjectId, ContractId)>,
) -> Result<Response> {
    let result = projects::approve_contract(&state, &actor, id, contract_id).await;
    redirect(result, project_url(id), |notices| notices)
}

/// `GET /apply/projects/:id/contracts/:contract_id/`
pub async fn download_contract(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path((id, contract_id)): Path<(ProjectId, ContractId)>,
) -> Result<Response> {
    let download = projects::open_contract(&state, &actor, id, contract_id).await?;
    Ok(stream(download))
}

/// `POST /apply/projects/:id/documents/`
pub async fn upload_document(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path(id): Path<ProjectId>,
    Json(upload): Json<DocumentUpload>,
) -> Result<Response> {
    let result = projects::upload_document(&state, &actor, id, &upload).await;
    redirect(result, project_url(id), |_| {
        let mut notices = Notices::new();
        notices.success("Document uploaded");
        notices
    })
}

/// `GET /apply/projects/:id/documents/:file_id/`
pub async fn download_document(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path((id, file_id)): Path<(ProjectId, PacketFileId)>,
) -> Result<Response> {
    let download = projects::open_document(&state, &actor, id, file_id).await?;
    Ok(stream(download))
}

/// `DELETE /apply/projects/:id/documents/:file_id/`
pub async fn remove_document(
    State(state): State<Arc<ApiState>>,
    Actor(actor): Actor,
    Path((id, file_id)): Path<(ProjectId, PacketFileId)>,
) -> Result<Response> {
    let result = projects::remove_document(&state, &actor, id, file_id).await;
    redirect(result, project_url(id), |notices| notices)
}
