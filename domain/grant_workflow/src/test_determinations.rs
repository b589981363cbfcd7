use crate::determination::{check_form_access, plan, DeterminationPlan};
use crate::events::{EntityRef, EventKind};
use crate::invariants::{
    assert_determination_counts, assert_finalization_consistent, assert_next_stage_inherits,
    assert_status_in_workflow,
};
use crate::types::{Determination, Outcome, Role, Submission, User};
use crate::workflow::{WorkflowKind, WorkflowStatus};
use crate::WorkflowError;

fn staff() -> User {
    User {
        id: 1,
        full_name: "Grace Reviewer".into(),
        email: "grace@example.org".into(),
        role: Role::Staff,
    }
}

fn applicant() -> User {
    User {
        id: 2,
        full_name: "Ada Applicant".into(),
        email: "ada@example.org".into(),
        role: Role::Applicant,
    }
}

fn submission(workflow: WorkflowKind, status: WorkflowStatus) -> Submission {
    Submission {
        id: 100,
        title: "Community radio transmitter".into(),
        user: applicant().id,
        lead: Some(staff().id),
        workflow,
        status,
        previous: None,
        created_at: 1_700_000_000,
    }
}

fn determination(outcome: Outcome, is_draft: bool) -> Determination {
    Determination {
        id: 7,
        submission: 100,
        author: staff().id,
        outcome,
        is_draft,
        message: String::new(),
        created_at: 1_700_000_100,
        updated_at: 1_700_000_100,
    }
}

fn finalize(plan: DeterminationPlan) -> crate::determination::Finalization {
    match plan {
        DeterminationPlan::Finalize(f) => f,
        other => panic!("expected a finalisation, got {other:?}"),
    }
}

#[test]
fn test_applicant_cannot_open_form() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::InDiscussion);
    let err = check_form_access(&applicant(), &s, &[]).unwrap_err();
    assert_eq!(err, WorkflowError::PermissionDenied("make determinations"));
}

#[test]
fn test_cant_access_wrong_status() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::Rejected);
    assert_eq!(
        check_form_access(&staff(), &s, &[]),
        Err(WorkflowError::DeterminationUnavailable(WorkflowStatus::Rejected))
    );
}

#[test]
fn test_cant_resubmit_determination() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::InDiscussion);
    let existing = [determination(Outcome::Accepted, false)];
    let err = plan(&staff(), &s, &existing, Outcome::Accepted, false).unwrap_err();
    assert_eq!(err, WorkflowError::AlreadyDetermined(Outcome::Accepted));
    assert!(err.is_notice());
}

#[test]
fn test_save_draft_reuses_existing_draft() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::PostReviewDiscussion);
    let existing = [determination(Outcome::Rejected, true)];
    let p = plan(&staff(), &s, &existing, Outcome::Accepted, true).unwrap();
    assert_eq!(p, DeterminationPlan::SaveDraft { draft: Some(7) });
}

#[test]
fn test_draft_label() {
    assert_eq!(
        determination(Outcome::Accepted, true).display_label(),
        "[Draft] Approved"
    );
    assert_eq!(
        determination(Outcome::Accepted, false).display_label(),
        "Approved"
    );
}

#[test]
fn test_submitting_finalises_the_draft() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::InDiscussion);
    let existing = [determination(Outcome::Accepted, true)];
    let f = finalize(plan(&staff(), &s, &existing, Outcome::Accepted, false).unwrap());

    assert_eq!(f.draft, Some(7));
    assert_eq!(f.to, WorkflowStatus::Accepted);
    assert!(f.next_stage.is_none());
    assert_finalization_consistent(&s, &f);
    assert_determination_counts(&existing);
}

#[test]
fn test_rejection_is_terminal() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::Determination);
    let f = finalize(plan(&staff(), &s, &[], Outcome::Rejected, false).unwrap());
    assert_eq!(f.to, WorkflowStatus::Rejected);
    assert!(s.workflow.is_terminal(f.to));
}

#[test]
fn test_more_info_event_carries_message() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::InDiscussion);
    let f = finalize(plan(&staff(), &s, &[], Outcome::MoreInfo, false).unwrap());
    assert_eq!(f.to, WorkflowStatus::MoreInfo);

    let event = f.event(staff().id, 55, "This is the message");
    assert_eq!(event.kind, EventKind::DeterminationOutcome);
    assert_eq!(event.source, EntityRef::Submission(100));
    assert_eq!(event.related, Some(EntityRef::Determination(55)));
    assert_eq!(event.comment.as_deref(), Some("This is the message"));
}

#[test]
fn test_accepted_event_has_no_comment() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::InDiscussion);
    let f = finalize(plan(&staff(), &s, &[], Outcome::Accepted, false).unwrap());
    let event = f.event(staff().id, 55, "Well done");
    assert_eq!(event.comment, None);
    assert_eq!(event.title.as_deref(), Some("Approved"));
}

#[test]
fn test_can_progress_stage_via_determination() {
    let s = submission(
        WorkflowKind::ConceptProposal,
        WorkflowStatus::ConceptReviewDiscussion,
    );
    assert_status_in_workflow(&s);

    let f = finalize(plan(&staff(), &s, &[], Outcome::Accepted, false).unwrap());

    assert_eq!(f.to, WorkflowStatus::InvitedToProposal);
    let next = f.next_stage.as_ref().expect("next stage");
    assert_eq!(next.status, WorkflowStatus::DraftProposal);
    assert_finalization_consistent(&s, &f);
    assert_next_stage_inherits(&s, &f);
}

#[test]
fn test_concept_rejection_does_not_progress() {
    let s = submission(WorkflowKind::ConceptProposal, WorkflowStatus::InDiscussion);
    let f = finalize(plan(&staff(), &s, &[], Outcome::Rejected, false).unwrap());
    assert_eq!(f.to, WorkflowStatus::ConceptRejected);
    assert!(f.next_stage.is_none());
}

#[test]
fn test_foreign_status_is_invalid() {
    let s = submission(WorkflowKind::Request, WorkflowStatus::ProposalDiscussion);
    let err = plan(&staff(), &s, &[], Outcome::Accepted, false).unwrap_err();
    assert!(matches!(err, WorkflowError::StatusOutsideWorkflow { .. }));
    assert_eq!(err.kind(), crate::ErrorKind::Invalid);
}
