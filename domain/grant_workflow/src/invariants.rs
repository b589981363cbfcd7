#![allow(dead_code)]

use crate::batch::BatchPlan;
use crate::determination::Finalization;
use crate::notice::Notices;
use crate::types::{Determination, Project, ProjectStatus, Submission};
use crate::workflow::WorkflowStatus;

/// INV-1: A submission's status belongs to its workflow.
pub fn assert_status_in_workflow(submission: &Submission) {
    assert!(
        submission.workflow.contains(submission.status),
        "INV-1 violated: submission {} has status {} outside the {} workflow",
        submission.id,
        submission.status,
        submission.workflow
    );
}

/// INV-2: At most one submitted and at most one draft determination.
pub fn assert_determination_counts(determinations: &[Determination]) {
    let submitted = determinations.iter().filter(|d| !d.is_draft).count();
    let drafts = determinations.iter().filter(|d| d.is_draft).count();
    assert!(
        submitted <= 1,
        "INV-2 violated: {submitted} submitted determinations"
    );
    assert!(drafts <= 1, "INV-2 violated: {drafts} draft determinations");
}

/// INV-3: A finalisation moves the submission along a determination edge of
/// its workflow, and spawns a next stage only when the target hands on.
pub fn assert_finalization_consistent(submission: &Submission, f: &Finalization) {
    assert_eq!(f.submission, submission.id, "INV-3 violated: wrong submission");
    assert_eq!(f.from, submission.status, "INV-3 violated: stale from-status");
    assert_eq!(
        submission
            .workflow
            .determination_target(submission.status, f.outcome),
        Some(f.to),
        "INV-3 violated: {} does not lead from {} to {}",
        f.outcome.as_str(),
        f.from,
        f.to
    );
    assert_eq!(
        f.next_stage.is_some(),
        submission.workflow.next_stage_status(f.to).is_some(),
        "INV-3 violated: next stage mismatch for {}",
        f.to
    );
}

/// INV-4: The next stage inherits the stage-invariant fields.
pub fn assert_next_stage_inherits(previous: &Submission, f: &Finalization) {
    if let Some(next) = &f.next_stage {
        assert_eq!(next.title, previous.title, "INV-4 violated: title changed");
        assert_eq!(next.user, previous.user, "INV-4 violated: owner changed");
        assert_eq!(next.lead, previous.lead, "INV-4 violated: lead changed");
        assert_eq!(next.workflow, previous.workflow, "INV-4 violated: workflow changed");
        assert_eq!(
            next.status,
            WorkflowStatus::DraftProposal,
            "INV-4 violated: next stage does not start at draft_proposal"
        );
    }
}

/// INV-5: Notice count of a batch is eligible + ineligible + one summary
/// when anything was ineligible.
pub fn assert_batch_notice_count(plan: &BatchPlan, notices: &Notices) {
    let expected = plan.eligible.len()
        + plan.ineligible.len()
        + usize::from(!plan.ineligible.is_empty());
    assert_eq!(
        notices.len(),
        expected,
        "INV-5 violated: expected {expected} notices, got {}",
        notices.len()
    );
}

/// INV-6: Only a draft project can be locked.
pub fn assert_lock_consistent(project: &Project) {
    if project.is_locked {
        assert_eq!(
            project.status,
            ProjectStatus::Draft,
            "INV-6 violated: project {} locked while {}",
            project.id,
            project.status.as_str()
        );
    }
}

/// INV-7: Project status only moves forward:
///   Draft -> Draft | Contracting
///   Contracting -> Contracting | InProgress
///   InProgress -> InProgress
pub fn assert_valid_project_transition(from: ProjectStatus, to: ProjectStatus) {
    let valid = matches!(
        (from, to),
        (ProjectStatus::Draft, ProjectStatus::Draft)
            | (ProjectStatus::Draft, ProjectStatus::Contracting)
            | (ProjectStatus::Contracting, ProjectStatus::Contracting)
            | (ProjectStatus::Contracting, ProjectStatus::InProgress)
            | (ProjectStatus::InProgress, ProjectStatus::InProgress)
    );
    assert!(
        valid,
        "INV-7 violated: invalid project transition from {:?} to {:?}",
        from, to
    );
}
