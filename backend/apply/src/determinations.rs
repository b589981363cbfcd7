//! Submission and determination services.
//!
//! Each mutating call runs its reads and writes in one transaction and
//! hands the resulting events to the messenger only after commit.

use grant_workflow::{
    batch::{self, Candidate},
    determination::{self, DeterminationPlan, Finalization},
    permissions::{can_view_determination, can_view_submission},
    redirect::success_url,
    submission,
    types::{Determination, DeterminationId, Outcome, ProjectId, Submission, SubmissionId, User},
    EntityRef, Event, EventKind, Notices, WorkflowError, WorkflowKind, WorkflowStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::api::ApiState;
use crate::db::{self, SubmissionInsert};
use crate::errors::Result;
use crate::events::ActivityEntry;

// ─────────────────────────────────────────────────────────
// Forms & views
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmissionForm {
    pub title: String,
    pub workflow: WorkflowKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressForm {
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeterminationForm {
    pub outcome: Outcome,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub save_draft: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchForm {
    #[serde(default)]
    pub submissions: Vec<SubmissionId>,
    #[serde(default)]
    pub action: Option<Outcome>,
    #[serde(default)]
    pub message: String,
}

/// Batch body as posted. The action stays raw so an unknown value reads as
/// no action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchBody {
    #[serde(default)]
    pub submissions: Vec<SubmissionId>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl BatchForm {
    /// Merge the query string (`submissions=1,2&action=rejected`) with an
    /// optional body. Body values win when present.
    pub fn from_parts(
        query_submissions: Option<&str>,
        query_action: Option<&str>,
        body: BatchBody,
    ) -> Self {
        let submissions = if body.submissions.is_empty() {
            query_submissions
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|id| id.trim().parse().ok())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            body.submissions
        };
        let action = body
            .action
            .as_deref()
            .or(query_action)
            .and_then(|raw| raw.trim().parse::<Outcome>().ok());
        Self {
            submissions,
            action,
            message: body.message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub submission: Submission,
    pub determinations: Vec<Determination>,
    pub next: Option<SubmissionId>,
    pub project: Option<ProjectId>,
}

/// Context of the determination form.
#[derive(Debug, Serialize)]
pub struct DeterminationFormView {
    pub submission: Submission,
    pub draft: Option<Determination>,
    /// Outcomes offered from the current status.
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug)]
pub struct DeterminationSaved {
    pub determination: DeterminationId,
    pub notices: Notices,
}

#[derive(Debug)]
pub struct BatchDone {
    pub location: String,
    pub notices: Notices,
}

async fn load_submission(conn: &mut SqliteConnection, id: SubmissionId) -> Result<Submission> {
    db::get_submission(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("submission", id).into())
}

// ─────────────────────────────────────────────────────────
// Submissions
// ─────────────────────────────────────────────────────────

pub async fn create_submission(
    state: &ApiState,
    actor: &User,
    form: &NewSubmissionForm,
) -> Result<SubmissionId> {
    let new = submission::plan_new(actor, &form.title, form.workflow)?;

    let mut conn = state.pool.acquire().await?;
    let id = db::insert_submission(
        &mut *conn,
        &SubmissionInsert {
            title: &new.title,
            user: new.user,
            lead: None,
            workflow: new.workflow,
            status: new.status,
            previous: None,
        },
    )
    .await?;
    drop(conn);

    info!(submission = id, workflow = %new.workflow, "submission received");
    let event = Event::new(EventKind::NewSubmission, actor.id, EntityRef::Submission(id))
        .title(new.title);
    state.messenger.send(&[event]).await;
    Ok(id)
}

pub async fn submission_detail(
    state: &ApiState,
    actor: &User,
    id: SubmissionId,
) -> Result<SubmissionView> {
    let mut conn = state.pool.acquire().await?;
    let submission = load_submission(&mut *conn, id).await?;
    if !can_view_submission(actor, &submission) {
        return Err(WorkflowError::PermissionDenied("view this submission").into());
    }

    let determinations = db::list_determinations(&mut *conn, id)
        .await?
        .into_iter()
        .filter(|d| can_view_determination(actor, &submission, d))
        .collect();
    let next = db::get_next_submission(&mut *conn, id).await?.map(|s| s.id);
    let project = db::get_project_for_submission(&mut *conn, id)
        .await?
        .map(|p| p.id);

    Ok(SubmissionView {
        submission,
        determinations,
        next,
        project,
    })
}

pub async fn submission_activity(
    state: &ApiState,
    actor: &User,
    id: SubmissionId,
) -> Result<Vec<ActivityEntry>> {
    let mut conn = state.pool.acquire().await?;
    let submission = load_submission(&mut *conn, id).await?;
    if !can_view_submission(actor, &submission) {
        return Err(WorkflowError::PermissionDenied("view this submission").into());
    }
    let records = db::list_activities(&mut *conn, "submission", id).await?;
    Ok(records.into_iter().map(ActivityEntry::from).collect())
}

/// Move a submission along its non-determination transition.
pub async fn progress(
    state: &ApiState,
    actor: &User,
    id: SubmissionId,
    form: &ProgressForm,
) -> Result<Notices> {
    let mut tx = state.pool.begin().await?;
    let submission = load_submission(&mut *tx, id).await?;
    let to = submission::plan_progress(actor, &submission, form.status)?;
    db::set_submission_status(&mut *tx, id, to).await?;
    tx.commit().await?;

    info!(submission = id, from = %submission.status, %to, "submission progressed");
    state
        .messenger
        .send(&[
            Event::new(EventKind::Transition, actor.id, EntityRef::Submission(id))
                .title(format!("Progressed from {} to {}", submission.status, to)),
        ])
        .await;

    let mut notices = Notices::new();
    notices.success(format!("\"{}\" moved to {}", submission.title, to));
    Ok(notices)
}

// ─────────────────────────────────────────────────────────
// Determinations
// ─────────────────────────────────────────────────────────

pub async fn determination_form(
    state: &ApiState,
    actor: &User,
    id: SubmissionId,
) -> Result<DeterminationFormView> {
    let mut conn = state.pool.acquire().await?;
    let submission = load_submission(&mut *conn, id).await?;
    let existing = db::list_determinations(&mut *conn, id).await?;
    determination::check_form_access(actor, &submission, &existing)?;

    let outcomes = [Outcome::Accepted, Outcome::Rejected, Outcome::MoreInfo]
        .into_iter()
        .filter(|o| {
            submission
                .workflow
                .determination_target(submission.status, *o)
                .is_some()
        })
        .collect();

    Ok(DeterminationFormView {
        draft: determination::draft(&existing).cloned(),
        submission,
        outcomes,
    })
}

pub async fn determination_detail(
    state: &ApiState,
    actor: &User,
    submission_id: SubmissionId,
    id: DeterminationId,
) -> Result<Determination> {
    let mut conn = state.pool.acquire().await?;
    let submission = load_submission(&mut *conn, submission_id).await?;
    let determination = db::list_determinations(&mut *conn, submission_id)
        .await?
        .into_iter()
        .find(|d| d.id == id)
        .ok_or(WorkflowError::not_found("determination", id))?;

    if !can_view_determination(actor, &submission, &determination) {
        return Err(WorkflowError::PermissionDenied("view this determination").into());
    }
    Ok(determination)
}

/// Record a determination through the single-submission form.
pub async fn determine(
    state: &ApiState,
    actor: &User,
    id: SubmissionId,
    form: &DeterminationForm,
) -> Result<DeterminationSaved> {
    let mut tx = state.pool.begin().await?;
    let submission = load_submission(&mut *tx, id).await?;
    let existing = db::list_determinations(&mut *tx, id).await?;
    let mut notices = Notices::new();

    match determination::plan(actor, &submission, &existing, form.outcome, form.save_draft)? {
        DeterminationPlan::SaveDraft { draft } => {
            let determination = match draft {
                Some(draft) => {
                    let updated = db::update_draft_determination(
                        &mut *tx,
                        draft,
                        actor.id,
                        form.outcome,
                        true,
                        &form.message,
                    )
                    .await?;
                    if !updated {
                        return Err(WorkflowError::not_found("draft determination", draft).into());
                    }
                    draft
                }
                None => {
                    db::insert_determination(
                        &mut *tx,
                        id,
                        actor.id,
                        form.outcome,
                        true,
                        &form.message,
                    )
                    .await?
                }
            };
            tx.commit().await?;

            debug!(submission = id, determination, "draft determination saved");
            notices.info(format!("Draft saved as {}", form.outcome.label()));
            Ok(DeterminationSaved {
                determination,
                notices,
            })
        }
        DeterminationPlan::Finalize(f) => {
            let determination = apply_finalization(&mut *tx, actor, &f, &form.message).await?;
            tx.commit().await?;

            info!(
                submission = id,
                determination,
                outcome = f.outcome.as_str(),
                to = %f.to,
                "determination recorded"
            );
            state
                .messenger
                .send(&[f.event(actor.id, determination, &form.message)])
                .await;

            notices.success(format!(
                "Determination for \"{}\" recorded as {}",
                f.title,
                f.outcome.label()
            ));
            Ok(DeterminationSaved {
                determination,
                notices,
            })
        }
    }
}

/// Write a finalisation: the determination, the new status, and the
/// follow-on submission when the outcome opens the next stage.
async fn apply_finalization(
    conn: &mut SqliteConnection,
    actor: &User,
    f: &Finalization,
    message: &str,
) -> Result<DeterminationId> {
    let determination = match f.draft {
        Some(draft) => {
            let updated =
                db::update_draft_determination(conn, draft, actor.id, f.outcome, false, message)
                    .await?;
            if !updated {
                return Err(WorkflowError::not_found("draft determination", draft).into());
            }
            draft
        }
        None => {
            db::insert_determination(conn, f.submission, actor.id, f.outcome, false, message)
                .await?
        }
    };

    db::set_submission_status(conn, f.submission, f.to).await?;

    if let Some(next) = &f.next_stage {
        let next_id = db::insert_submission(
            conn,
            &SubmissionInsert {
                title: &next.title,
                user: next.user,
                lead: next.lead,
                workflow: next.workflow,
                status: next.status,
                previous: Some(f.submission),
            },
        )
        .await?;
        debug!(previous = f.submission, next = next_id, "next stage created");
    }

    Ok(determination)
}

// ─────────────────────────────────────────────────────────
// Batch
// ─────────────────────────────────────────────────────────

/// Apply one outcome to many submissions.
///
/// `request_path` is the full path of the request, carried as `next` when
/// the selection or the action is missing. `next` is where to go once the
/// batch has been applied.
pub async fn batch_determine(
    state: &ApiState,
    actor: &User,
    request_path: &str,
    next: Option<&str>,
    form: &BatchForm,
) -> Result<BatchDone> {
    if let Some(redirect) = batch::should_redirect(request_path, &form.submissions, form.action) {
        return Ok(BatchDone {
            location: redirect.location,
            notices: redirect.notice.into(),
        });
    }
    let outcome = form.action.ok_or(WorkflowError::NoAction)?;

    let mut tx = state.pool.begin().await?;

    let mut loaded = Vec::with_capacity(form.submissions.len());
    let mut missing: Vec<SubmissionId> = Vec::new();
    for &id in &form.submissions {
        match db::get_submission(&mut *tx, id).await? {
            Some(submission) => {
                let determinations = db::list_determinations(&mut *tx, id).await?;
                loaded.push((submission, determinations));
            }
            None if !missing.contains(&id) => {
                debug!(submission = id, "batch skipped unknown submission");
                missing.push(id);
            }
            None => {}
        }
    }
    let candidates: Vec<Candidate<'_>> = loaded
        .iter()
        .map(|(submission, determinations)| Candidate {
            submission,
            determinations,
        })
        .collect();

    let plan = batch::resolve(actor, &candidates, outcome)?;

    let mut events = Vec::with_capacity(plan.eligible.len());
    for f in &plan.eligible {
        let determination = apply_finalization(&mut *tx, actor, f, &form.message).await?;
        events.push(f.event(actor.id, determination, &form.message));
    }
    tx.commit().await?;

    info!(
        outcome = outcome.as_str(),
        determined = plan.eligible.len(),
        unchanged = plan.unchanged.len(),
        skipped = plan.ineligible.len(),
        "batch determination applied"
    );
    state.messenger.send(&events).await;

    let mut notices = plan.notices();
    for id in missing {
        notices.warning(WorkflowError::not_found("Submission", id).to_string());
    }
    Ok(BatchDone {
        location: success_url(next),
        notices,
    })
}
