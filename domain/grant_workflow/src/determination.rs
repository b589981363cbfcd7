//! # Determinations
//!
//! Decides what recording a determination on one submission means. The
//! returned [`DeterminationPlan`] is applied by the service inside a single
//! transaction:
//!
//! 1. create the determination, or finalise the existing draft;
//! 2. move the submission to the outcome's target status, creating the
//!    next-stage submission when the target hands on to another stage;
//! 3. after commit, emit the one event from [`Finalization::event`].
//!
//! A submission carries at most one draft and at most one submitted
//! determination. Once submitted, the form is closed for good.

use serde::Serialize;

use crate::errors::{Result, WorkflowError};
use crate::events::{EntityRef, Event, EventKind};
use crate::permissions::require_staff;
use crate::types::{Determination, DeterminationId, Outcome, Submission, SubmissionId, User, UserId};
use crate::workflow::{WorkflowKind, WorkflowStatus};

/// The submitted (non-draft) determination, if any.
pub fn submitted(determinations: &[Determination]) -> Option<&Determination> {
    determinations.iter().find(|d| !d.is_draft)
}

/// The open draft, if any.
pub fn draft(determinations: &[Determination]) -> Option<&Determination> {
    determinations.iter().find(|d| d.is_draft)
}

/// Submission to create when a determination opens the following stage.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NextStage {
    pub workflow: WorkflowKind,
    pub status: WorkflowStatus,
    pub title: String,
    pub user: UserId,
    pub lead: Option<UserId>,
}

/// A determination about to become final, with its status consequences.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Finalization {
    pub submission: SubmissionId,
    pub title: String,
    /// Draft to finalise instead of inserting a new record.
    pub draft: Option<DeterminationId>,
    pub outcome: Outcome,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub next_stage: Option<NextStage>,
}

impl Finalization {
    /// The single notification for this determination. A more-info request
    /// carries the message so the applicant sees what is being asked.
    pub fn event(&self, actor: UserId, determination: DeterminationId, message: &str) -> Event {
        let event = Event::new(
            EventKind::DeterminationOutcome,
            actor,
            EntityRef::Submission(self.submission),
        )
        .related(EntityRef::Determination(determination))
        .title(self.outcome.label());

        match self.outcome {
            Outcome::MoreInfo => event.comment(message),
            _ => event,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeterminationPlan {
    /// Store or update the draft; no status change, no event.
    SaveDraft { draft: Option<DeterminationId> },
    Finalize(Finalization),
}

/// Work out the finalisation of `outcome` for one submission.
///
/// Fails with [`WorkflowError::AlreadyDetermined`] when a submitted
/// determination exists and [`WorkflowError::DeterminationUnavailable`]
/// when the current status does not take determinations.
pub fn finalization(
    submission: &Submission,
    determinations: &[Determination],
    outcome: Outcome,
) -> Result<Finalization> {
    if let Some(existing) = submitted(determinations) {
        return Err(WorkflowError::AlreadyDetermined(existing.outcome));
    }

    let workflow = submission.workflow;
    workflow.check(submission.status)?;

    let to = workflow
        .determination_target(submission.status, outcome)
        .ok_or(WorkflowError::DeterminationUnavailable(submission.status))?;

    let next_stage = workflow.next_stage_status(to).map(|status| NextStage {
        workflow,
        status,
        title: submission.title.clone(),
        user: submission.user,
        lead: submission.lead,
    });

    Ok(Finalization {
        submission: submission.id,
        title: submission.title.clone(),
        draft: draft(determinations).map(|d| d.id),
        outcome,
        from: submission.status,
        to,
        next_stage,
    })
}

/// Gate for the determination form.
///
/// Staff only; the submission must sit in a phase that takes determinations
/// and must not already have a submitted one.
pub fn check_form_access(
    user: &User,
    submission: &Submission,
    determinations: &[Determination],
) -> Result<()> {
    require_staff(user, "make determinations")?;
    submission.workflow.check(submission.status)?;

    if let Some(existing) = submitted(determinations) {
        return Err(WorkflowError::AlreadyDetermined(existing.outcome));
    }
    if !submission.workflow.accepts_determination(submission.status) {
        return Err(WorkflowError::DeterminationUnavailable(submission.status));
    }
    Ok(())
}

/// Plan a single determination posted through the form.
pub fn plan(
    user: &User,
    submission: &Submission,
    determinations: &[Determination],
    outcome: Outcome,
    save_draft: bool,
) -> Result<DeterminationPlan> {
    check_form_access(user, submission, determinations)?;

    if save_draft {
        return Ok(DeterminationPlan::SaveDraft {
            draft: draft(determinations).map(|d| d.id),
        });
    }

    finalization(submission, determinations, outcome).map(DeterminationPlan::Finalize)
}
