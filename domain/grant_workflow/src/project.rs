//! # Projects
//!
//! The approval and contracting state machine of a funded project.
//!
//! ```text
//!            send for approval         approve                 approve contract
//! Draft ───────────────────────► Draft ─────────► Contracting ─────────────────► InProgress
//! (unlocked)                   (locked)           (unlocked)
//!                                  │
//!                                  └── request changes ──► Draft (unlocked)
//! ```
//!
//! Each planner checks permissions and the current state and returns the
//! change to write. The service applies it, together with the related
//! record, in one transaction.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, WorkflowError};
use crate::permissions::{check_edit, is_owner, is_staff, require_staff, ViewerRole};
use crate::types::{
    Contract, ContractId, DocumentCategory, PacketFile, Project, ProjectStatus, Submission,
    SubmissionId, User, UserId,
};
use crate::workflow::WorkflowStatus;

/// New values for the project's status columns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ProjectChange {
    pub status: ProjectStatus,
    pub is_locked: bool,
}

// ─────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewProject {
    pub submission: SubmissionId,
    pub title: String,
    pub user: UserId,
    pub lead: Option<UserId>,
    /// Requested amount; agreed while the project is a draft.
    pub value: i64,
    pub status: ProjectStatus,
    pub is_locked: bool,
}

/// A project for an accepted submission. One project per submission.
pub fn plan_create(user: &User, submission: &Submission, has_project: bool) -> Result<NewProject> {
    require_staff(user, "create projects")?;
    if submission.status != WorkflowStatus::Accepted {
        return Err(WorkflowError::NotAccepted);
    }
    if has_project {
        return Err(WorkflowError::ProjectExists);
    }
    Ok(NewProject {
        submission: submission.id,
        title: submission.title.clone(),
        user: submission.user,
        lead: submission.lead,
        value: 0,
        status: ProjectStatus::Draft,
        is_locked: false,
    })
}

// ─────────────────────────────────────────────────────────
// Approval
// ─────────────────────────────────────────────────────────

/// Lock a draft project while it awaits approval.
pub fn send_for_approval(user: &User, project: &Project) -> Result<ProjectChange> {
    require_staff(user, "send projects for approval")?;
    if project.status != ProjectStatus::Draft || project.is_locked {
        return Err(WorkflowError::CannotSendForApproval);
    }
    Ok(ProjectChange {
        status: ProjectStatus::Draft,
        is_locked: true,
    })
}

fn awaiting_approval(project: &Project) -> bool {
    project.status == ProjectStatus::Draft && project.is_locked
}

/// Approve a project awaiting approval: unlock it and start contracting.
pub fn create_approval(user: &User, project: &Project) -> Result<ProjectChange> {
    require_staff(user, "approve projects")?;
    if !awaiting_approval(project) {
        return Err(WorkflowError::NotAwaitingApproval);
    }
    Ok(ProjectChange {
        status: ProjectStatus::Contracting,
        is_locked: false,
    })
}

/// Send the project back for changes. The status is kept; only the lock
/// is lifted.
pub fn request_changes(user: &User, project: &Project, comment: &str) -> Result<ProjectChange> {
    require_staff(user, "request project changes")?;
    if comment.trim().is_empty() {
        return Err(WorkflowError::MissingComment);
    }
    Ok(ProjectChange {
        status: project.status,
        is_locked: false,
    })
}

// ─────────────────────────────────────────────────────────
// Contracts
// ─────────────────────────────────────────────────────────

fn newest_first(contracts: &[Contract]) -> Vec<&Contract> {
    let mut sorted: Vec<&Contract> = contracts.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    sorted
}

/// The most recent contract, when it has not been approved yet.
pub fn contract_to_approve(contracts: &[Contract]) -> Option<&Contract> {
    newest_first(contracts)
        .into_iter()
        .next()
        .filter(|latest| latest.approver.is_none())
}

/// Contracts shown on the project page: the one awaiting approval first,
/// then every signed and approved contract, newest first.
pub fn listed_contracts(contracts: &[Contract]) -> Vec<&Contract> {
    let pending = contract_to_approve(contracts);
    let settled = newest_first(contracts)
        .into_iter()
        .filter(|c| c.is_signed && c.approver.is_some());
    pending.into_iter().chain(settled).collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ContractApproval {
    pub contract: ContractId,
    pub approver: UserId,
    pub status: ProjectStatus,
}

/// Approve `contract_id`, which must be the latest contract awaiting
/// approval on a project in contracting.
pub fn approve_contract(
    user: &User,
    project: &Project,
    contracts: &[Contract],
    contract_id: ContractId,
) -> Result<ContractApproval> {
    require_staff(user, "approve contracts")?;
    if !contracts
        .iter()
        .any(|c| c.id == contract_id && c.project == project.id)
    {
        return Err(WorkflowError::not_found("contract", contract_id));
    }
    if project.status != ProjectStatus::Contracting {
        return Err(WorkflowError::NotContracting);
    }

    let pending = contract_to_approve(contracts).ok_or(WorkflowError::NoPendingContract)?;
    if pending.id != contract_id {
        return Err(WorkflowError::NotLatestContract);
    }

    Ok(ContractApproval {
        contract: contract_id,
        approver: user.id,
        status: ProjectStatus::InProgress,
    })
}

/// Who may upload a contract, and whether it counts as signed: a contract
/// uploaded by the applicant is the signed copy.
pub fn upload_contract(user: &User, project: &Project) -> Result<bool> {
    let owner = is_owner(user, project.user);
    if !(is_staff(user) || owner) {
        return Err(WorkflowError::PermissionDenied("upload contracts"));
    }
    Ok(owner)
}

// ─────────────────────────────────────────────────────────
// Packet files & lead
// ─────────────────────────────────────────────────────────

/// Required categories that have no packet file yet.
pub fn missing_document_categories<'a>(
    categories: &'a [DocumentCategory],
    files: &[PacketFile],
) -> Vec<&'a DocumentCategory> {
    categories
        .iter()
        .filter(|c| c.required && !files.iter().any(|f| f.category == c.id))
        .collect()
}

/// The new lead must be staff.
pub fn update_lead(user: &User, new_lead: &User) -> Result<()> {
    require_staff(user, "change the project lead")?;
    if !is_staff(new_lead) {
        return Err(WorkflowError::NotStaff(new_lead.id));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Editing
// ─────────────────────────────────────────────────────────

/// Fields either edit variant may change.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProjectEdit {
    pub title: Option<String>,
    pub value: Option<i64>,
}

/// Validate an edit by `user`, returning the variant that handles it and
/// the resulting title and value.
pub fn plan_edit(
    user: &User,
    project: &Project,
    edit: &ProjectEdit,
) -> Result<(ViewerRole, String, i64)> {
    let role = check_edit(user, project)?;

    let title = match edit.title.as_deref().map(str::trim) {
        Some("") => return Err(WorkflowError::MissingField("title")),
        Some(title) => title.to_string(),
        None => project.title.clone(),
    };
    let value = match edit.value {
        Some(v) if v < 0 => return Err(WorkflowError::InvalidField("value")),
        Some(v) => v,
        None => project.value,
    };
    Ok((role, title, value))
}
