//! # Types
//!
//! Shared data structures used across all modules of the workflow crate.
//!
//! Records are plain values: the service loads them from storage, hands them
//! to the planners in [`crate::determination`], [`crate::batch`] and
//! [`crate::project`], and writes back whatever the returned plan says.
//! Nothing in here performs I/O.
//!
//! Timestamps are unix seconds, matching what the service persists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;
use crate::workflow::{WorkflowKind, WorkflowStatus};

pub type UserId = i64;
pub type SubmissionId = i64;
pub type DeterminationId = i64;
pub type ProjectId = i64;
pub type ContractId = i64;
pub type PacketFileId = i64;
pub type CategoryId = i64;

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

/// Coarse role of an authenticated user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Staff => "staff",
        }
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applicant" => Ok(Self::Applicant),
            "staff" => Ok(Self::Staff),
            other => Err(WorkflowError::UnknownValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

// ─────────────────────────────────────────────────────────
// Submissions & determinations
// ─────────────────────────────────────────────────────────

/// A proposal moving through a fund's workflow.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub title: String,
    /// The applicant who owns the submission.
    pub user: UserId,
    pub lead: Option<UserId>,
    pub workflow: WorkflowKind,
    pub status: WorkflowStatus,
    /// Earlier-stage submission this one was progressed from.
    pub previous: Option<SubmissionId>,
    pub created_at: i64,
}

/// The decision a determination records.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Rejected,
    MoreInfo,
    Accepted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::MoreInfo => "more_info",
            Self::Accepted => "accepted",
        }
    }

    /// Human readable label shown to staff and applicants.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "Dismissed",
            Self::MoreInfo => "More information requested",
            Self::Accepted => "Approved",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Outcome {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rejected" => Ok(Self::Rejected),
            "more_info" => Ok(Self::MoreInfo),
            "accepted" => Ok(Self::Accepted),
            other => Err(WorkflowError::UnknownValue {
                field: "outcome",
                value: other.to_string(),
            }),
        }
    }
}

/// A staff decision on a submission. Editable while `is_draft`; immutable
/// once submitted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Determination {
    pub id: DeterminationId,
    pub submission: SubmissionId,
    pub author: UserId,
    pub outcome: Outcome,
    pub is_draft: bool,
    pub message: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Determination {
    pub fn display_label(&self) -> String {
        if self.is_draft {
            format!("[Draft] {}", self.outcome.label())
        } else {
            self.outcome.label().to_string()
        }
    }
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a funded project.
///
/// ```text
/// Draft ──(approval)──► Contracting ──(contract approved)──► InProgress
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Details are being agreed; may be sent for approval.
    Draft,
    /// Approved; waiting on a signed, approved contract.
    Contracting,
    /// Contract approved; work under way.
    InProgress,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Contracting => "contracting",
            Self::InProgress => "in_progress",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "contracting" => Ok(Self::Contracting),
            "in_progress" => Ok(Self::InProgress),
            other => Err(WorkflowError::UnknownValue {
                field: "project status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub submission: SubmissionId,
    pub title: String,
    /// The applicant who owns the project.
    pub user: UserId,
    pub lead: Option<UserId>,
    /// Requested amount in minor currency units.
    pub value: i64,
    pub status: ProjectStatus,
    /// Set while the project is awaiting approval.
    pub is_locked: bool,
    pub created_at: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub project: ProjectId,
    pub by: UserId,
    pub created_at: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub project: ProjectId,
    /// Storage key of the uploaded file.
    pub file: String,
    pub is_signed: bool,
    pub approver: Option<UserId>,
    pub approved_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DocumentCategory {
    pub id: CategoryId,
    pub name: String,
    pub required: bool,
}

/// A document attached to a project's packet.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PacketFile {
    pub id: PacketFileId,
    pub project: ProjectId,
    pub category: CategoryId,
    pub title: String,
    /// Storage key of the uploaded file.
    pub document: String,
    pub created_at: i64,
}
