//! # Batch determinations
//!
//! One action applied to many submissions. Each submission resolves to
//! exactly one of:
//!
//! | Resolution  | Condition                                         | Notice  |
//! |-------------|---------------------------------------------------|---------|
//! | eligible    | no submitted determination, action available      | success |
//! | unchanged   | already submitted with the same outcome           | none    |
//! | ineligible  | submitted with another outcome, or action unavailable from the status | warning |
//!
//! When anything is ineligible a single summary notice is added, so a batch
//! yields `eligible + ineligible + (ineligible > 0) as usize` notices.

use std::collections::HashSet;

use serde::Serialize;

use crate::determination::{finalization, Finalization};
use crate::errors::{Result, WorkflowError};
use crate::notice::{Level, Notice, Notices};
use crate::permissions::require_staff;
use crate::redirect::{with_next, SUBMISSIONS_LIST};
use crate::types::{Determination, Outcome, Submission, SubmissionId, User};
use crate::workflow::WorkflowStatus;

/// Redirect issued before anything is loaded or written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchRedirect {
    pub location: String,
    pub notice: Notice,
}

/// Fail fast on an empty selection or a missing action. The listing URL
/// carries the full request path as `next`.
pub fn should_redirect(
    request_path: &str,
    submissions: &[SubmissionId],
    action: Option<Outcome>,
) -> Option<BatchRedirect> {
    let error = if submissions.is_empty() {
        WorkflowError::NoSubmissions
    } else if action.is_none() {
        WorkflowError::NoAction
    } else {
        return None;
    };

    Some(BatchRedirect {
        location: with_next(SUBMISSIONS_LIST, request_path),
        notice: Notice::new(Level::Error, error.to_string()),
    })
}

/// A loaded submission with its determinations.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub submission: &'a Submission,
    pub determinations: &'a [Determination],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum SkipReason {
    /// Already determined with a different outcome.
    Conflicting(Outcome),
    /// The requested outcome is not available from this status.
    Unavailable(WorkflowStatus),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Ineligible {
    pub submission: SubmissionId,
    pub title: String,
    pub reason: SkipReason,
}

impl Ineligible {
    pub fn message(&self) -> String {
        match &self.reason {
            SkipReason::Conflicting(existing) => format!(
                "Unable to determine submission \"{}\" as already determined as {}",
                self.title,
                existing.label()
            ),
            SkipReason::Unavailable(status) => format!(
                "Unable to determine submission \"{}\" while it is {}",
                self.title, status
            ),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BatchPlan {
    pub outcome: Outcome,
    pub eligible: Vec<Finalization>,
    /// Already determined with the requested outcome; left untouched.
    pub unchanged: Vec<SubmissionId>,
    pub ineligible: Vec<Ineligible>,
}

impl BatchPlan {
    pub fn notices(&self) -> Notices {
        let mut notices = Notices::new();
        for f in &self.eligible {
            notices.success(format!(
                "Determination for \"{}\" recorded as {}",
                f.title,
                self.outcome.label()
            ));
        }
        for skipped in &self.ineligible {
            notices.warning(skipped.message());
        }
        if !self.ineligible.is_empty() {
            let total = self.eligible.len() + self.unchanged.len() + self.ineligible.len();
            notices.warning(format!(
                "{} of {} submissions could not be determined",
                self.ineligible.len(),
                total
            ));
        }
        notices
    }
}

/// Resolve `outcome` against every candidate. Duplicate submissions are
/// considered once.
pub fn resolve(user: &User, candidates: &[Candidate<'_>], outcome: Outcome) -> Result<BatchPlan> {
    require_staff(user, "make determinations")?;

    let mut plan = BatchPlan {
        outcome,
        eligible: Vec::new(),
        unchanged: Vec::new(),
        ineligible: Vec::new(),
    };
    let mut seen = HashSet::new();

    for candidate in candidates {
        let submission = candidate.submission;
        if !seen.insert(submission.id) {
            continue;
        }

        match finalization(submission, candidate.determinations, outcome) {
            Ok(f) => plan.eligible.push(f),
            Err(WorkflowError::AlreadyDetermined(existing)) if existing == outcome => {
                plan.unchanged.push(submission.id)
            }
            Err(WorkflowError::AlreadyDetermined(existing)) => plan.ineligible.push(Ineligible {
                submission: submission.id,
                title: submission.title.clone(),
                reason: SkipReason::Conflicting(existing),
            }),
            Err(WorkflowError::DeterminationUnavailable(status)) => {
                plan.ineligible.push(Ineligible {
                    submission: submission.id,
                    title: submission.title.clone(),
                    reason: SkipReason::Unavailable(status),
                })
            }
            Err(e) => return Err(e),
        }
    }

    Ok(plan)
}
