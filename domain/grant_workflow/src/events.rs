//! Activity events handed to the notifier after a transition commits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ContractId, DeterminationId, ProjectId, SubmissionId, UserId};

/// All recognised event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An applicant submitted a new proposal.
    NewSubmission,
    /// Staff moved a submission along its workflow.
    Transition,
    /// A determination was submitted (single or batch).
    DeterminationOutcome,
    /// A project was created from an accepted submission.
    CreateProject,
    /// The project was locked and sent for approval.
    SendForApproval,
    /// The project was approved and moved to contracting.
    ApproveProject,
    /// Staff sent the project back for changes.
    RequestProjectChange,
    /// A contract was approved and the project started.
    ApproveContract,
    /// A contract was uploaded.
    UploadContract,
    /// A packet document was uploaded.
    UploadDocument,
    /// A packet document was removed.
    RemoveDocument,
    /// The project lead changed.
    UpdateProjectLead,
    /// The project details were edited.
    EditProject,
    /// A kind stored by an older release.
    Unknown,
}

impl EventKind {
    /// Parse the identifier stored in the activity table.
    pub fn parse(kind: &str) -> Self {
        match kind {
            "new_submission" => Self::NewSubmission,
            "transition" => Self::Transition,
            "determination_outcome" => Self::DeterminationOutcome,
            "create_project" => Self::CreateProject,
            "send_for_approval" => Self::SendForApproval,
            "approve_project" => Self::ApproveProject,
            "request_project_change" => Self::RequestProjectChange,
            "approve_contract" => Self::ApproveContract,
            "upload_contract" => Self::UploadContract,
            "upload_document" => Self::UploadDocument,
            "remove_document" => Self::RemoveDocument,
            "update_project_lead" => Self::UpdateProjectLead,
            "edit_project" => Self::EditProject,
            _ => Self::Unknown,
        }
    }

    /// Return a short identifier string suitable for storage in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewSubmission => "new_submission",
            Self::Transition => "transition",
            Self::DeterminationOutcome => "determination_outcome",
            Self::CreateProject => "create_project",
            Self::SendForApproval => "send_for_approval",
            Self::ApproveProject => "approve_project",
            Self::RequestProjectChange => "request_project_change",
            Self::ApproveContract => "approve_contract",
            Self::UploadContract => "upload_contract",
            Self::UploadDocument => "upload_document",
            Self::RemoveDocument => "remove_document",
            Self::UpdateProjectLead => "update_project_lead",
            Self::EditProject => "edit_project",
            Self::Unknown => "unknown",
        }
    }
}

/// Record an event is about (`source`) or refers to (`related`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Submission(SubmissionId),
    Determination(DeterminationId),
    Project(ProjectId),
    Contract(ContractId),
    User(UserId),
    /// Placeholder for an empty reference, e.g. a lead that was unassigned.
    Unassigned,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submission(id) => write!(f, "submission:{id}"),
            Self::Determination(id) => write!(f, "determination:{id}"),
            Self::Project(id) => write!(f, "project:{id}"),
            Self::Contract(id) => write!(f, "contract:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Unassigned => f.write_str("Unassigned"),
        }
    }
}

/// One notification, fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub actor: UserId,
    pub source: EntityRef,
    pub related: Option<EntityRef>,
    pub comment: Option<String>,
    pub title: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, actor: UserId, source: EntityRef) -> Self {
        Self {
            kind,
            actor,
            source,
            related: None,
            comment: None,
            title: None,
        }
    }

    pub fn related(mut self, related: EntityRef) -> Self {
        self.related = Some(related);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
