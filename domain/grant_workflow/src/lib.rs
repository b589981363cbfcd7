//! # Grant Workflow
//!
//! Decision rules of the grant application service. Every entry point is a
//! pure planner: it takes the acting user and already-loaded records, checks
//! permissions and state, and returns what must be written and announced.
//! Persistence, transactions and delivery live in the `apply` service.
//!
//! | Area          | Entry Point(s)                                                    |
//! |---------------|-------------------------------------------------------------------|
//! | Submissions   | [`submission::plan_new`], [`submission::plan_progress`]           |
//! | Determination | [`determination::check_form_access`], [`determination::plan`]    |
//! | Batch         | [`batch::should_redirect`], [`batch::resolve`]                    |
//! | Projects      | [`project::plan_create`], [`project::send_for_approval`], [`project::create_approval`], [`project::request_changes`] |
//! | Contracts     | [`project::contract_to_approve`], [`project::approve_contract`], [`project::upload_contract`] |
//! | Editing       | [`permissions::editable_by`], [`project::plan_edit`]              |
//! | Redirects     | [`redirect::with_next`], [`redirect::success_url`]                |
//!
//! ## Architecture
//!
//! Status tables live in [`workflow`]; capability predicates in
//! [`permissions`]. Planners never mutate their inputs. User-facing failures
//! are [`WorkflowError`]s whose [`ErrorKind`] tells the caller whether to
//! redirect with a notice, deny access, or report a missing record.

pub mod batch;
pub mod determination;
pub mod errors;
pub mod events;
pub mod notice;
pub mod permissions;
pub mod project;
pub mod redirect;
pub mod submission;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_batch;
#[cfg(test)]
mod test_determinations;
#[cfg(test)]
mod test_projects;

pub use errors::{ErrorKind, Result, WorkflowError};
pub use events::{EntityRef, Event, EventKind};
pub use notice::{Level, Notice, Notices};
pub use permissions::ViewerRole;
pub use types::{
    Approval, Contract, Determination, DocumentCategory, Outcome, PacketFile, Project,
    ProjectStatus, Role, Submission, User,
};
pub use workflow::{WorkflowKind, WorkflowStatus};
