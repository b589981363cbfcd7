//! Redirect targets and the `next` query parameter.
//!
//! The batch views send people back to where they came from. The originating
//! path, query string included, travels form-url-encoded in `next` and must
//! come back out byte-for-byte.

use url::form_urlencoded;

use crate::types::{ProjectId, SubmissionId};

/// Listing of all submissions; the fallback redirect target.
pub const SUBMISSIONS_LIST: &str = "/apply/submissions/";

pub fn submission_url(id: SubmissionId) -> String {
    format!("/apply/submissions/{id}/")
}

pub fn project_url(id: ProjectId) -> String {
    format!("/apply/projects/{id}/")
}

/// Append `next=<path>` to `base`.
pub fn with_next(base: &str, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Pull the decoded `next` value out of a raw query string.
pub fn next_from_query(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "next")
        .map(|(_, value)| value.into_owned())
}

/// Only same-site absolute paths are followed.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Where to go after a successful batch: `next` when it is a local path,
/// the submissions listing otherwise.
pub fn success_url(next: Option<&str>) -> String {
    match next {
        Some(path) if is_local_path(path) => path.to_string(),
        _ => SUBMISSIONS_LIST.to_string(),
    }
}
