//! # Workflow
//!
//! Status tables for the two funding workflows.
//!
//! A workflow is an ordered list of [`Phase`]s. Each phase names the stage it
//! belongs to, the status staff may progress it to without a determination,
//! and, for discussion phases, where each determination outcome leads.
//!
//! ```text
//! request:           in_discussion ─► internal_review ─► post_review_discussion ─► determination
//!                         │                                   │                          │
//!                         └──────────── accepted | rejected | *_more_info ◄──────────────┘
//!
//! concept_proposal:  concept stage ── accepted ──► invited_to_proposal
//!                                                       │ spawns
//!                                                       ▼
//!                    proposal stage: draft_proposal ─► … ─► accepted | rejected
//! ```
//!
//! Statuses are unique within a workflow, so `(workflow, status)` identifies
//! exactly one phase. `in_discussion` is shared by the single-stage workflow
//! and the concept stage, which is why every lookup is keyed by the workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;
use crate::types::Outcome;

/// The multi-stage process configured for a fund.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Single stage: one application, one determination.
    Request,
    /// Two stages: a concept note, then an invited full proposal.
    ConceptProposal,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::ConceptProposal => "concept_proposal",
        }
    }

    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Self::Request => REQUEST_PHASES,
            Self::ConceptProposal => CONCEPT_PROPOSAL_PHASES,
        }
    }

    /// Status every new submission starts in.
    pub fn initial_status(&self) -> WorkflowStatus {
        self.phases()[0].status
    }

    pub fn phase(&self, status: WorkflowStatus) -> Option<&'static Phase> {
        self.phases().iter().find(|p| p.status == status)
    }

    pub fn contains(&self, status: WorkflowStatus) -> bool {
        self.phase(status).is_some()
    }

    /// Status reached when `outcome` is determined from `status`, or `None`
    /// when the phase does not accept determinations.
    pub fn determination_target(
        &self,
        status: WorkflowStatus,
        outcome: Outcome,
    ) -> Option<WorkflowStatus> {
        self.phase(status)
            .and_then(|p| p.determination)
            .map(|targets| targets.target(outcome))
    }

    pub fn accepts_determination(&self, status: WorkflowStatus) -> bool {
        self.phase(status)
            .map(|p| p.determination.is_some())
            .unwrap_or(false)
    }

    /// Status reachable from `status` without a determination.
    pub fn progress_target(&self, status: WorkflowStatus) -> Option<WorkflowStatus> {
        self.phase(status).and_then(|p| p.progress_to)
    }

    /// First status of the following stage when `status` hands the
    /// application on to it.
    pub fn next_stage_status(&self, status: WorkflowStatus) -> Option<WorkflowStatus> {
        match (self, status) {
            (Self::ConceptProposal, WorkflowStatus::InvitedToProposal) => {
                Some(WorkflowStatus::DraftProposal)
            }
            _ => None,
        }
    }

    /// `true` when nothing further can happen to a submission in `status`.
    pub fn is_terminal(&self, status: WorkflowStatus) -> bool {
        self.phase(status)
            .map(|p| p.progress_to.is_none() && p.determination.is_none())
            .unwrap_or(false)
    }

    /// Validate that `status` belongs to this workflow.
    pub fn check(&self, status: WorkflowStatus) -> Result<(), WorkflowError> {
        if self.contains(status) {
            Ok(())
        } else {
            Err(WorkflowError::StatusOutsideWorkflow {
                status,
                workflow: *self,
            })
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "concept_proposal" => Ok(Self::ConceptProposal),
            other => Err(WorkflowError::UnknownValue {
                field: "workflow",
                value: other.to_string(),
            }),
        }
    }
}

/// Stage a phase belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Request,
    Concept,
    Proposal,
}

/// Every status a submission can hold, across all workflows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    InDiscussion,
    MoreInfo,
    InternalReview,
    PostReviewDiscussion,
    PostReviewMoreInfo,
    Determination,
    Accepted,
    Rejected,
    ConceptMoreInfo,
    ConceptReviewDiscussion,
    ConceptReviewMoreInfo,
    InvitedToProposal,
    ConceptRejected,
    DraftProposal,
    ProposalDiscussion,
    ProposalMoreInfo,
    ProposalInternalReview,
    PostProposalReviewDiscussion,
    PostProposalReviewMoreInfo,
    ExternalReview,
    PostExternalReviewDiscussion,
    PostExternalReviewMoreInfo,
}

impl WorkflowStatus {
    pub const ALL: &'static [WorkflowStatus] = &[
        Self::InDiscussion,
        Self::MoreInfo,
        Self::InternalReview,
        Self::PostReviewDiscussion,
        Self::PostReviewMoreInfo,
        Self::Determination,
        Self::Accepted,
        Self::Rejected,
        Self::ConceptMoreInfo,
        Self::ConceptReviewDiscussion,
        Self::ConceptReviewMoreInfo,
        Self::InvitedToProposal,
        Self::ConceptRejected,
        Self::DraftProposal,
        Self::ProposalDiscussion,
        Self::ProposalMoreInfo,
        Self::ProposalInternalReview,
        Self::PostProposalReviewDiscussion,
        Self::PostProposalReviewMoreInfo,
        Self::ExternalReview,
        Self::PostExternalReviewDiscussion,
        Self::PostExternalReviewMoreInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InDiscussion => "in_discussion",
            Self::MoreInfo => "more_info",
            Self::InternalReview => "internal_review",
            Self::PostReviewDiscussion => "post_review_discussion",
            Self::PostReviewMoreInfo => "post_review_more_info",
            Self::Determination => "determination",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::ConceptMoreInfo => "concept_more_info",
            Self::ConceptReviewDiscussion => "concept_review_discussion",
            Self::ConceptReviewMoreInfo => "concept_review_more_info",
            Self::InvitedToProposal => "invited_to_proposal",
            Self::ConceptRejected => "concept_rejected",
            Self::DraftProposal => "draft_proposal",
            Self::ProposalDiscussion => "proposal_discussion",
            Self::ProposalMoreInfo => "proposal_more_info",
            Self::ProposalInternalReview => "proposal_internal_review",
            Self::PostProposalReviewDiscussion => "post_proposal_review_discussion",
            Self::PostProposalReviewMoreInfo => "post_proposal_review_more_info",
            Self::ExternalReview => "external_review",
            Self::PostExternalReviewDiscussion => "post_external_review_discussion",
            Self::PostExternalReviewMoreInfo => "post_external_review_more_info",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownValue {
                field: "status",
                value: s.to_string(),
            })
    }
}

/// Where each determination outcome leads from a discussion phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeterminationTargets {
    pub accepted: WorkflowStatus,
    pub rejected: WorkflowStatus,
    pub more_info: WorkflowStatus,
}

impl DeterminationTargets {
    pub fn target(&self, outcome: Outcome) -> WorkflowStatus {
        match outcome {
            Outcome::Accepted => self.accepted,
            Outcome::Rejected => self.rejected,
            Outcome::MoreInfo => self.more_info,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Phase {
    pub status: WorkflowStatus,
    pub stage: Stage,
    pub progress_to: Option<WorkflowStatus>,
    pub determination: Option<DeterminationTargets>,
}

// ── Phase tables ─────────────────────────────────────────────────────

const fn phase(
    status: WorkflowStatus,
    stage: Stage,
    progress_to: Option<WorkflowStatus>,
    determination: Option<DeterminationTargets>,
) -> Phase {
    Phase {
        status,
        stage,
        progress_to,
        determination,
    }
}

const fn decide(
    accepted: WorkflowStatus,
    rejected: WorkflowStatus,
    more_info: WorkflowStatus,
) -> Option<DeterminationTargets> {
    Some(DeterminationTargets {
        accepted,
        rejected,
        more_info,
    })
}

use WorkflowStatus as S;

const REQUEST_PHASES: &[Phase] = &[
    phase(
        S::InDiscussion,
        Stage::Request,
        Some(S::InternalReview),
        decide(S::Accepted, S::Rejected, S::MoreInfo),
    ),
    phase(S::MoreInfo, Stage::Request, Some(S::InDiscussion), None),
    phase(
        S::InternalReview,
        Stage::Request,
        Some(S::PostReviewDiscussion),
        None,
    ),
    phase(
        S::PostReviewDiscussion,
        Stage::Request,
        Some(S::Determination),
        decide(S::Accepted, S::Rejected, S::PostReviewMoreInfo),
    ),
    phase(
        S::PostReviewMoreInfo,
        Stage::Request,
        Some(S::PostReviewDiscussion),
        None,
    ),
    phase(
        S::Determination,
        Stage::Request,
        None,
        decide(S::Accepted, S::Rejected, S::PostReviewMoreInfo),
    ),
    phase(S::Accepted, Stage::Request, None, None),
    phase(S::Rejected, Stage::Request, None, None),
];

const CONCEPT_PROPOSAL_PHASES: &[Phase] = &[
    phase(
        S::InDiscussion,
        Stage::Concept,
        Some(S::InternalReview),
        decide(S::InvitedToProposal, S::ConceptRejected, S::ConceptMoreInfo),
    ),
    phase(S::ConceptMoreInfo, Stage::Concept, Some(S::InDiscussion), None),
    phase(
        S::InternalReview,
        Stage::Concept,
        Some(S::ConceptReviewDiscussion),
        None,
    ),
    phase(
        S::ConceptReviewDiscussion,
        Stage::Concept,
        None,
        decide(
            S::InvitedToProposal,
            S::ConceptRejected,
            S::ConceptReviewMoreInfo,
        ),
    ),
    phase(
        S::ConceptReviewMoreInfo,
        Stage::Concept,
        Some(S::ConceptReviewDiscussion),
        None,
    ),
    phase(S::InvitedToProposal, Stage::Concept, None, None),
    phase(S::ConceptRejected, Stage::Concept, None, None),
    phase(
        S::DraftProposal,
        Stage::Proposal,
        Some(S::ProposalDiscussion),
        None,
    ),
    phase(
        S::ProposalDiscussion,
        Stage::Proposal,
        Some(S::ProposalInternalReview),
        decide(S::Accepted, S::Rejected, S::ProposalMoreInfo),
    ),
    phase(
        S::ProposalMoreInfo,
        Stage::Proposal,
        Some(S::ProposalDiscussion),
        None,
    ),
    phase(
        S::ProposalInternalReview,
        Stage::Proposal,
        Some(S::PostProposalReviewDiscussion),
        None,
    ),
    phase(
        S::PostProposalReviewDiscussion,
        Stage::Proposal,
        Some(S::ExternalReview),
        decide(S::Accepted, S::Rejected, S::PostProposalReviewMoreInfo),
    ),
    phase(
        S::PostProposalReviewMoreInfo,
        Stage::Proposal,
        Some(S::PostProposalReviewDiscussion),
        None,
    ),
    phase(
        S::ExternalReview,
        Stage::Proposal,
        Some(S::PostExternalReviewDiscussion),
        None,
    ),
    phase(
        S::PostExternalReviewDiscussion,
        Stage::Proposal,
        None,
        decide(S::Accepted, S::Rejected, S::PostExternalReviewMoreInfo),
    ),
    phase(
        S::PostExternalReviewMoreInfo,
        Stage::Proposal,
        Some(S::PostExternalReviewDiscussion),
        None,
    ),
    phase(S::Accepted, Stage::Proposal, None, None),
    phase(S::Rejected, Stage::Proposal, None, None),
];

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
