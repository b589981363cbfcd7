//! Creating submissions and moving them along non-determination transitions.

use serde::Serialize;

use crate::errors::{Result, WorkflowError};
use crate::permissions::require_staff;
use crate::types::{Submission, User, UserId};
use crate::workflow::{WorkflowKind, WorkflowStatus};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewSubmission {
    pub title: String,
    pub user: UserId,
    pub workflow: WorkflowKind,
    pub status: WorkflowStatus,
}

/// A proposal submitted by `user`, entering the first phase of `workflow`.
pub fn plan_new(user: &User, title: &str, workflow: WorkflowKind) -> Result<NewSubmission> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkflowError::MissingField("title"));
    }
    Ok(NewSubmission {
        title: title.to_string(),
        user: user.id,
        workflow,
        status: workflow.initial_status(),
    })
}

/// Validate a staff-driven move from the current status to `target`.
pub fn plan_progress(
    user: &User,
    submission: &Submission,
    target: WorkflowStatus,
) -> Result<WorkflowStatus> {
    require_staff(user, "progress submissions")?;
    submission.workflow.check(submission.status)?;

    match submission.workflow.progress_target(submission.status) {
        Some(next) if next == target => Ok(next),
        _ => Err(WorkflowError::CannotProgress(submission.status)),
    }
}
