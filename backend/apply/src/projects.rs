//! Project services: creation, approval, contracts, the document packet,
//! lead changes, editing and private media.

use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use grant_workflow::{
    permissions::{can_access_documents, editable_by, project_viewer, require_staff},
    project::{self, ProjectEdit},
    types::{
        Approval, Contract, ContractId, DocumentCategory, PacketFile, PacketFileId, Project,
        ProjectId, SubmissionId, User, UserId,
    },
    EntityRef, Event, EventKind, Notices, ViewerRole, WorkflowError,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::api::ApiState;
use crate::db;
use crate::errors::Result;
use crate::storage::{contract_key, document_key, DocumentReader, DocumentStore};

// ─────────────────────────────────────────────────────────
// Forms & views
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadForm {
    pub lead: UserId,
}

/// A file sent inline as base64.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractUpload {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub category: i64,
    pub title: String,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ProjectDetail {
    Admin {
        project: Project,
        editable: bool,
        /// One approval per approver.
        approvals: Vec<Approval>,
        missing_categories: Vec<DocumentCategory>,
        packet_files: Vec<PacketFile>,
        contracts: Vec<Contract>,
        contract_to_approve: Option<ContractId>,
    },
    Applicant {
        project: Project,
        editable: bool,
        contracts: Vec<Contract>,
    },
}

/// A private file ready to stream.
pub struct Download {
    pub filename: String,
    pub reader: DocumentReader,
}

async fn load_project(conn: &mut SqliteConnection, id: ProjectId) -> Result<Project> {
    db::get_project(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("project", id).into())
}

fn decode(content: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(content.trim())?)
}

/// Remove an already stored upload when the transaction recording it did
/// not commit.
async fn discard_unless_committed(
    store: &dyn DocumentStore,
    key: &str,
    committed: std::result::Result<(), sqlx::Error>,
) -> Result<()> {
    if let Err(e) = committed {
        if let Err(cleanup) = store.delete(key).await {
            warn!(key, error = %cleanup, "orphaned upload could not be removed");
        }
        return Err(e.into());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Creation & detail
// ─────────────────────────────────────────────────────────

pub async fn create_project(
    state: &ApiState,
    actor: &User,
    submission_id: SubmissionId,
) -> Result<ProjectId> {
    let mut tx = state.pool.begin().await?;
    let submission = db::get_submission(&mut *tx, submission_id)
        .await?
        .ok_or(WorkflowError::not_found("submission", submission_id))?;
    let existing = db::get_project_for_submission(&mut *tx, submission_id).await?;

    let new = project::plan_create(actor, &submission, existing.is_some())?;
    let id = db::insert_project(&mut *tx, &new).await?;
    tx.commit().await?;

    info!(project = id, submission = submission_id, "project created");
    state
        .messenger
        .send(&[
            Event::new(EventKind::CreateProject, actor.id, EntityRef::Project(id))
                .related(EntityRef::Submission(submission_id))
                .title(new.title),
        ])
        .await;
    Ok(id)
}

/// Staff get the admin view, the owner the applicant view.
pub async fn project_detail(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
) -> Result<ProjectDetail> {
    let mut conn = state.pool.acquire().await?;
    let project = load_project(&mut *conn, id).await?;
    let role = project_viewer(actor, &project)?;

    let contracts = db::list_contracts(&mut *conn, id).await?;
    let listed: Vec<Contract> = project::listed_contracts(&contracts)
        .into_iter()
        .cloned()
        .collect();
    let editable = editable_by(&project, actor);

    match role {
        ViewerRole::Applicant => Ok(ProjectDetail::Applicant {
            project,
            editable,
            contracts: listed,
        }),
        ViewerRole::Admin => {
            let mut approvers = HashSet::new();
            let approvals = db::list_approvals(&mut *conn, id)
                .await?
                .into_iter()
                .filter(|a| approvers.insert(a.by))
                .collect();
            let categories = db::list_document_categories(&mut *conn).await?;
            let packet_files = db::list_packet_files(&mut *conn, id).await?;
            let missing_categories =
                project::missing_document_categories(&categories, &packet_files)
                    .into_iter()
                    .cloned()
                    .collect();

            Ok(ProjectDetail::Admin {
                contract_to_approve: project::contract_to_approve(&contracts).map(|c| c.id),
                project,
                editable,
                approvals,
                missing_categories,
                packet_files,
                contracts: listed,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────
// Approval
// ─────────────────────────────────────────────────────────

pub async fn send_for_approval(state: &ApiState, actor: &User, id: ProjectId) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let change = project::send_for_approval(actor, &project)?;
    db::set_project_state(&mut *tx, id, &change).await?;
    tx.commit().await?;

    info!(project = id, "project sent for approval");
    state
        .messenger
        .send(&[Event::new(EventKind::SendForApproval, actor.id, EntityRef::Project(id))])
        .await;

    let mut notices = Notices::new();
    notices.success("Project sent for approval");
    Ok(notices)
}

/// Approve a project awaiting approval and move it to contracting.
pub async fn create_approval(state: &ApiState, actor: &User, id: ProjectId) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let change = project::create_approval(actor, &project)?;
    db::insert_approval(&mut *tx, id, actor.id).await?;
    db::set_project_state(&mut *tx, id, &change).await?;
    tx.commit().await?;

    info!(project = id, approver = actor.id, "project approved");
    state
        .messenger
        .send(&[Event::new(EventKind::ApproveProject, actor.id, EntityRef::Project(id))])
        .await;

    let mut notices = Notices::new();
    notices.success("Project approved");
    Ok(notices)
}

pub async fn request_changes(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    form: &CommentForm,
) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let change = project::request_changes(actor, &project, &form.comment)?;
    db::set_project_state(&mut *tx, id, &change).await?;
    tx.commit().await?;

    info!(project = id, "project changes requested");
    state
        .messenger
        .send(&[
            Event::new(EventKind::RequestProjectChange, actor.id, EntityRef::Project(id))
                .comment(form.comment.trim()),
        ])
        .await;

    let mut notices = Notices::new();
    notices.success("Changes requested from the applicant");
    Ok(notices)
}

// ─────────────────────────────────────────────────────────
// Contracts
// ─────────────────────────────────────────────────────────

pub async fn upload_contract(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    upload: &ContractUpload,
) -> Result<ContractId> {
    let bytes = decode(&upload.content)?;

    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let is_signed = project::upload_contract(actor, &project)?;

    let contract = db::insert_contract(&mut *tx, id, is_signed).await?;
    let key = contract_key(id, contract, &upload.filename);
    db::set_contract_file(&mut *tx, contract, &key).await?;
    state.store.save(&key, &bytes).await?;
    discard_unless_committed(state.store.as_ref(), &key, tx.commit().await).await?;

    info!(project = id, contract, is_signed, "contract uploaded");
    state
        .messenger
        .send(&[Event::new(EventKind::UploadContract, actor.id, EntityRef::Project(id))])
        .await;
    Ok(contract)
}

/// Approve the latest contract. Without one awaiting approval the project
/// is left untouched.
pub async fn approve_contract(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    contract_id: ContractId,
) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let contracts = db::list_contracts(&mut *tx, id).await?;

    let approval = project::approve_contract(actor, &project, &contracts, contract_id)?;
    db::approve_contract(&mut *tx, approval.contract, approval.approver).await?;
    db::set_project_status(&mut *tx, id, approval.status).await?;
    tx.commit().await?;

    info!(project = id, contract = contract_id, "contract approved");
    state
        .messenger
        .send(&[
            Event::new(EventKind::ApproveContract, actor.id, EntityRef::Project(id))
                .related(EntityRef::Contract(contract_id)),
        ])
        .await;

    let mut notices = Notices::new();
    notices.success("Contract approved");
    Ok(notices)
}

// ─────────────────────────────────────────────────────────
// Document packet
// ─────────────────────────────────────────────────────────

pub async fn upload_document(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    upload: &DocumentUpload,
) -> Result<PacketFileId> {
    require_staff(actor, "upload documents")?;
    let title = upload.title.trim();
    if title.is_empty() {
        return Err(WorkflowError::MissingField("title").into());
    }
    let bytes = decode(&upload.content)?;

    let mut tx = state.pool.begin().await?;
    load_project(&mut *tx, id).await?;
    if !db::category_exists(&mut *tx, upload.category).await? {
        return Err(WorkflowError::not_found("document category", upload.category).into());
    }

    let file = db::insert_packet_file(&mut *tx, id, upload.category, title).await?;
    let key = document_key(id, file, &upload.filename);
    db::set_packet_file_document(&mut *tx, file, &key).await?;
    state.store.save(&key, &bytes).await?;
    discard_unless_committed(state.store.as_ref(), &key, tx.commit().await).await?;

    info!(project = id, file, category = upload.category, "document uploaded");
    state
        .messenger
        .send(&[
            Event::new(EventKind::UploadDocument, actor.id, EntityRef::Project(id)).title(title),
        ])
        .await;
    Ok(file)
}

/// Remove a packet file. A file that is already gone counts as removed.
pub async fn remove_document(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    file_id: PacketFileId,
) -> Result<Notices> {
    require_staff(actor, "remove documents")?;
    let mut notices = Notices::new();

    let mut tx = state.pool.begin().await?;
    load_project(&mut *tx, id).await?;
    let file = match db::get_packet_file(&mut *tx, file_id).await? {
        Some(file) if file.project == id => file,
        Some(_) => return Err(WorkflowError::not_found("document", file_id).into()),
        None => {
            notices.info("Document has already been removed");
            return Ok(notices);
        }
    };
    if !db::delete_packet_file(&mut *tx, file_id).await? {
        notices.info("Document has already been removed");
        return Ok(notices);
    }
    tx.commit().await?;

    if let Err(e) = state.store.delete(&file.document).await {
        warn!(project = id, file = file_id, error = %e, "stored document could not be deleted");
    }

    info!(project = id, file = file_id, "document removed");
    state
        .messenger
        .send(&[
            Event::new(EventKind::RemoveDocument, actor.id, EntityRef::Project(id))
                .title(file.title.clone()),
        ])
        .await;

    notices.success(format!("\"{}\" removed", file.title));
    Ok(notices)
}

// ─────────────────────────────────────────────────────────
// Lead & editing
// ─────────────────────────────────────────────────────────

pub async fn update_lead(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    form: &LeadForm,
) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let new_lead = db::get_user(&mut *tx, form.lead)
        .await?
        .ok_or(WorkflowError::not_found("user", form.lead))?;
    project::update_lead(actor, &new_lead)?;
    db::set_project_lead(&mut *tx, id, new_lead.id).await?;
    tx.commit().await?;

    let previous = project
        .lead
        .map(EntityRef::User)
        .unwrap_or(EntityRef::Unassigned);
    info!(project = id, lead = new_lead.id, previous = %previous, "project lead updated");
    state
        .messenger
        .send(&[
            Event::new(EventKind::UpdateProjectLead, actor.id, EntityRef::Project(id))
                .related(previous)
                .title(new_lead.full_name.clone()),
        ])
        .await;

    let mut notices = Notices::new();
    notices.success(format!("Lead updated to {}", new_lead.full_name));
    Ok(notices)
}

/// Apply an edit through the admin or applicant variant.
pub async fn edit_project(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    edit: &ProjectEdit,
) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let project = load_project(&mut *tx, id).await?;
    let (role, title, value) = project::plan_edit(actor, &project, edit)?;
    db::set_project_details(&mut *tx, id, &title, value).await?;
    tx.commit().await?;

    info!(project = id, ?role, "project edited");
    state
        .messenger
        .send(&[Event::new(EventKind::EditProject, actor.id, EntityRef::Project(id)).title(title)])
        .await;

    let mut notices = Notices::new();
    notices.success("Project updated");
    Ok(notices)
}

// ─────────────────────────────────────────────────────────
// Private media
// ─────────────────────────────────────────────────────────

/// Check access to the project's private files, returning the project.
async fn documents_project(
    conn: &mut SqliteConnection,
    actor: &User,
    id: ProjectId,
) -> Result<Project> {
    let project = load_project(conn, id).await?;
    if !can_access_documents(actor, &project) {
        return Err(WorkflowError::PermissionDenied("view project documents").into());
    }
    Ok(project)
}

async fn open(state: &ApiState, key: &str, entity: &'static str, id: i64) -> Result<Download> {
    let reader = state
        .store
        .open(key)
        .await?
        .ok_or(WorkflowError::not_found(entity, id))?;
    let filename = key.rsplit('/').next().unwrap_or(key).to_string();
    Ok(Download { filename, reader })
}

pub async fn open_document(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    file_id: PacketFileId,
) -> Result<Download> {
    let mut conn = state.pool.acquire().await?;
    documents_project(&mut *conn, actor, id).await?;
    let file = db::get_packet_file(&mut *conn, file_id)
        .await?
        .filter(|f| f.project == id)
        .ok_or(WorkflowError::not_found("document", file_id))?;
    drop(conn);

    open(state, &file.document, "document", file_id).await
}

pub async fn open_contract(
    state: &ApiState,
    actor: &User,
    id: ProjectId,
    contract_id: ContractId,
) -> Result<Download> {
    let mut conn = state.pool.acquire().await?;
    documents_project(&mut *conn, actor, id).await?;
    let contract = db::get_contract(&mut *conn, contract_id)
        .await?
        .filter(|c| c.project == id)
        .ok_or(WorkflowError::not_found("contract", contract_id))?;
    drop(conn);

    open(state, &contract.file, "contract", contract_id).await
}
