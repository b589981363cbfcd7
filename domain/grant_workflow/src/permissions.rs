//! Capability predicates.
//!
//! Every check is a pure function of the acting user and the record, and is
//! evaluated before anything is written.

use serde::Serialize;

use crate::errors::{Result, WorkflowError};
use crate::types::{Determination, Project, Role, Submission, User, UserId};

pub fn is_staff(user: &User) -> bool {
    user.role == Role::Staff
}

pub fn is_owner(user: &User, owner: UserId) -> bool {
    user.id == owner
}

pub fn is_lead(user: &User, lead: Option<UserId>) -> bool {
    lead == Some(user.id)
}

/// A project can be edited while unlocked, by its owner or by the staff
/// member leading it.
pub fn editable_by(project: &Project, user: &User) -> bool {
    if project.is_locked {
        return false;
    }
    is_owner(user, project.user) || (is_staff(user) && is_lead(user, project.lead))
}

/// Which variant of a page a viewer gets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Admin,
    Applicant,
}

impl ViewerRole {
    pub fn of(user: &User) -> Self {
        if is_staff(user) {
            Self::Admin
        } else {
            Self::Applicant
        }
    }
}

pub fn require_staff(user: &User, action: &'static str) -> Result<()> {
    if is_staff(user) {
        Ok(())
    } else {
        Err(WorkflowError::PermissionDenied(action))
    }
}

/// Staff see the admin page; the owner sees the applicant page; nobody else
/// gets in.
pub fn project_viewer(user: &User, project: &Project) -> Result<ViewerRole> {
    match ViewerRole::of(user) {
        ViewerRole::Admin => Ok(ViewerRole::Admin),
        ViewerRole::Applicant if is_owner(user, project.user) => Ok(ViewerRole::Applicant),
        ViewerRole::Applicant => Err(WorkflowError::PermissionDenied("view this project")),
    }
}

/// Private documents are readable by staff and the project owner.
pub fn can_access_documents(user: &User, project: &Project) -> bool {
    is_staff(user) || is_owner(user, project.user)
}

/// Resolve the edit variant for `user`.
///
/// The applicant variant is owner-only and fails hard; either variant then
/// fails soft with [`WorkflowError::NotEditable`].
pub fn check_edit(user: &User, project: &Project) -> Result<ViewerRole> {
    let role = ViewerRole::of(user);
    if role == ViewerRole::Applicant && !is_owner(user, project.user) {
        return Err(WorkflowError::PermissionDenied("edit this project"));
    }
    if !editable_by(project, user) {
        return Err(WorkflowError::NotEditable);
    }
    Ok(role)
}

pub fn can_view_submission(user: &User, submission: &Submission) -> bool {
    is_staff(user) || is_owner(user, submission.user)
}

/// Drafts are staff-only; a submitted determination is also visible to the
/// applicant.
pub fn can_view_determination(
    user: &User,
    submission: &Submission,
    determination: &Determination,
) -> bool {
    is_staff(user) || (is_owner(user, submission.user) && !determination.is_draft)
}
