use crate::batch::{resolve, should_redirect, Candidate, SkipReason};
use crate::invariants::assert_batch_notice_count;
use crate::notice::Level;
use crate::redirect::{next_from_query, SUBMISSIONS_LIST};
use crate::types::{Determination, Outcome, Role, Submission, SubmissionId, User};
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

fn submissions(count: usize) -> Vec<Submission> {
    (0..count)
        .map(|i| Submission {
            id: 200 + i as SubmissionId,
            title: format!("Proposal {i}"),
            user: 50 + i as i64,
            lead: None,
            workflow: WorkflowKind::Request,
            status: WorkflowStatus::InDiscussion,
            previous: None,
            created_at: 1_700_000_000,
        })
        .collect()
}

fn submitted(submission: &Submission, outcome: Outcome) -> Determination {
    Determination {
        id: submission.id * 10,
        submission: submission.id,
        author: staff().id,
        outcome,
        is_draft: false,
        message: String::new(),
        created_at: 1_700_000_100,
        updated_at: 1_700_000_100,
    }
}

#[test]
fn test_cant_access_without_submissions() {
    let redirect = should_redirect("/batch/?action=rejected", &[], Some(Outcome::Rejected))
        .expect("redirect");
    assert!(redirect.location.starts_with(SUBMISSIONS_LIST));
    assert_eq!(redirect.notice.level, Level::Error);
    assert_eq!(redirect.notice.message, WorkflowError::NoSubmissions.to_string());
}

#[test]
fn test_cant_access_without_action() {
    let redirect = should_redirect("/batch/?submissions=3", &[3], None).expect("redirect");
    assert_eq!(redirect.notice.message, "Please select an action");
}

#[test]
fn test_valid_request_is_not_redirected() {
    assert_eq!(
        should_redirect("/batch/", &[1, 2], Some(Outcome::Accepted)),
        None
    );
}

#[test]
fn test_sets_next_on_redirect() {
    let test_path = "/a/path/?with=query&a=sting";
    let redirect = should_redirect(test_path, &[], Some(Outcome::Rejected)).unwrap();
    let (_, query) = redirect.location.split_once('?').unwrap();
    assert_eq!(next_from_query(query).as_deref(), Some(test_path));
}

#[test]
fn test_can_submit_batch_determination() {
    let subs = submissions(4);
    let candidates: Vec<Candidate> = subs
        .iter()
        .map(|s| Candidate {
            submission: s,
            determinations: &[],
        })
        .collect();

    let plan = resolve(&staff(), &candidates, Outcome::Rejected).unwrap();
    assert_eq!(plan.eligible.len(), 4);
    assert!(plan
        .eligible
        .iter()
        .all(|f| f.to == WorkflowStatus::Rejected));

    let notices = plan.notices();
    assert_eq!(notices.count(Level::Success), 4);
    assert_batch_notice_count(&plan, &notices);
}

#[test]
fn test_message_created_if_determination_exists() {
    let subs = submissions(2);
    let accepted = [submitted(&subs[0], Outcome::Accepted)];
    let candidates = [
        Candidate {
            submission: &subs[0],
            determinations: &accepted,
        },
        Candidate {
            submission: &subs[1],
            determinations: &[],
        },
    ];

    let plan = resolve(&staff(), &candidates, Outcome::Rejected).unwrap();

    assert_eq!(plan.eligible.len(), 1);
    assert_eq!(plan.eligible[0].submission, subs[1].id);
    assert_eq!(plan.ineligible.len(), 1);
    assert_eq!(
        plan.ineligible[0].reason,
        SkipReason::Conflicting(Outcome::Accepted)
    );

    let notices = plan.notices();
    assert_eq!(notices.len(), 3);
    assert!(notices
        .iter()
        .any(|n| n.message.contains("as already determined as Approved")));
    assert_batch_notice_count(&plan, &notices);
}

#[test]
fn test_same_outcome_is_idempotent() {
    let subs = submissions(1);
    let rejected = [submitted(&subs[0], Outcome::Rejected)];
    let candidates = [Candidate {
        submission: &subs[0],
        determinations: &rejected,
    }];

    let plan = resolve(&staff(), &candidates, Outcome::Rejected).unwrap();
    assert!(plan.eligible.is_empty());
    assert!(plan.ineligible.is_empty());
    assert_eq!(plan.unchanged, vec![subs[0].id]);
    assert!(plan.notices().is_empty());
}

#[test]
fn test_unavailable_status_is_flagged() {
    let mut subs = submissions(2);
    subs[0].status = WorkflowStatus::InternalReview;
    let candidates: Vec<Candidate> = subs
        .iter()
        .map(|s| Candidate {
            submission: s,
            determinations: &[],
        })
        .collect();

    let plan = resolve(&staff(), &candidates, Outcome::Accepted).unwrap();
    assert_eq!(
        plan.ineligible[0].reason,
        SkipReason::Unavailable(WorkflowStatus::InternalReview)
    );
    let notices = plan.notices();
    assert_eq!(notices.count(Level::Warning), 2);
    assert_batch_notice_count(&plan, &notices);
}

#[test]
fn test_duplicates_resolve_once() {
    let subs = submissions(1);
    let candidates = [
        Candidate {
            submission: &subs[0],
            determinations: &[],
        },
        Candidate {
            submission: &subs[0],
            determinations: &[],
        },
    ];
    let plan = resolve(&staff(), &candidates, Outcome::Accepted).unwrap();
    assert_eq!(plan.eligible.len(), 1);
}

#[test]
fn test_applicant_cannot_batch() {
    let applicant = User {
        role: Role::Applicant,
        ..staff()
    };
    let subs = submissions(1);
    let candidates = [Candidate {
        submission: &subs[0],
        determinations: &[],
    }];
    assert!(matches!(
        resolve(&applicant, &candidates, Outcome::Accepted),
        Err(WorkflowError::PermissionDenied(_))
    ));
}
