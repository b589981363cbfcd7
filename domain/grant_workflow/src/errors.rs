//! Workflow error types.
//!
//! Every error carries a [`ErrorKind`] so the service can decide how to
//! surface it without matching on individual variants.

use thiserror::Error;

use crate::types::{Outcome, UserId};
use crate::workflow::{WorkflowKind, WorkflowStatus};

/// How an error reaches the person who caused it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Shown as a notice on a redirect. Never a server error.
    Notice,
    /// Access denied.
    Forbidden,
    /// The addressed record does not exist (or is not visible).
    NotFound,
    /// Stored data does not fit the workflow rules.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("You do not have permission to {0}")]
    PermissionDenied(&'static str),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} is not valid")]
    InvalidField(&'static str),

    #[error("Unknown {field}: {value}")]
    UnknownValue { field: &'static str, value: String },

    #[error("Status {status} is not part of the {workflow} workflow")]
    StatusOutsideWorkflow {
        status: WorkflowStatus,
        workflow: WorkflowKind,
    },

    // ── Determinations ───────────────────────────────────

    #[error("Please select a submission")]
    NoSubmissions,

    #[error("Please select an action")]
    NoAction,

    #[error("A determination has already been submitted as {0}")]
    AlreadyDetermined(Outcome),

    #[error("Determinations cannot be made while the submission is {0}")]
    DeterminationUnavailable(WorkflowStatus),

    #[error("The submission cannot progress from {0}")]
    CannotProgress(WorkflowStatus),

    // ── Projects ─────────────────────────────────────────

    #[error("The project cannot be sent for approval at this time")]
    CannotSendForApproval,

    #[error("The project is not awaiting approval")]
    NotAwaitingApproval,

    #[error("Contracts can only be approved while the project is in contracting")]
    NotContracting,

    #[error("There is no contract awaiting approval")]
    NoPendingContract,

    #[error("Only the latest contract can be approved")]
    NotLatestContract,

    #[error("A comment is required when requesting changes")]
    MissingComment,

    #[error("You are not allowed to edit the project at this time")]
    NotEditable,

    #[error("A project can only be created from an accepted submission")]
    NotAccepted,

    #[error("A project already exists for this submission")]
    ProjectExists,

    #[error("User {0} is not a staff member")]
    NotStaff(UserId),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied(_) => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnknownValue { .. } | Self::StatusOutsideWorkflow { .. } => ErrorKind::Invalid,
            _ => ErrorKind::Notice,
        }
    }

    pub fn is_notice(&self) -> bool {
        self.kind() == ErrorKind::Notice
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
