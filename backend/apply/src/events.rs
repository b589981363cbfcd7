//! Activity feed records.
//!
//! Every event fanned out to the `activity` channel lands in the
//! `activities` table. The source and related references are stored as a
//! `(type, id)` column pair.

use grant_workflow::{EntityRef, EventKind};
use serde::{Deserialize, Serialize};

/// Split a reference into its stored `(type, id)` columns.
pub fn entity_columns(entity: &EntityRef) -> (&'static str, Option<i64>) {
    match entity {
        EntityRef::Submission(id) => ("submission", Some(*id)),
        EntityRef::Determination(id) => ("determination", Some(*id)),
        EntityRef::Project(id) => ("project", Some(*id)),
        EntityRef::Contract(id) => ("contract", Some(*id)),
        EntityRef::User(id) => ("user", Some(*id)),
        EntityRef::Unassigned => ("unassigned", None),
    }
}

/// Rebuild a reference from its stored columns. Unknown types yield `None`.
pub fn entity_from_columns(kind: &str, id: Option<i64>) -> Option<EntityRef> {
    match (kind, id) {
        ("submission", Some(id)) => Some(EntityRef::Submission(id)),
        ("determination", Some(id)) => Some(EntityRef::Determination(id)),
        ("project", Some(id)) => Some(EntityRef::Project(id)),
        ("contract", Some(id)) => Some(EntityRef::Contract(id)),
        ("user", Some(id)) => Some(EntityRef::User(id)),
        ("unassigned", _) => Some(EntityRef::Unassigned),
        _ => None,
    }
}

/// A raw activity record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityRecord {
    pub id: i64,
    pub kind: String,
    pub actor_id: i64,
    pub source_type: String,
    pub source_id: Option<i64>,
    pub related_type: Option<String>,
    pub related_id: Option<i64>,
    pub comment: Option<String>,
    pub title: Option<String>,
    pub created_at: i64,
}

impl ActivityRecord {
    pub fn event_kind(&self) -> EventKind {
        EventKind::parse(&self.kind)
    }

    pub fn related(&self) -> Option<EntityRef> {
        self.related_type
            .as_deref()
            .and_then(|kind| entity_from_columns(kind, self.related_id))
    }
}

/// An activity as shown in a feed, with its references resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub kind: EventKind,
    pub actor: i64,
    pub related: Option<EntityRef>,
    pub comment: Option<String>,
    pub title: Option<String>,
    pub created_at: i64,
}

impl From<ActivityRecord> for ActivityEntry {
    fn from(record: ActivityRecord) -> Self {
        Self {
            id: record.id,
            kind: record.event_kind(),
            actor: record.actor_id,
            related: record.related(),
            comment: record.comment,
            title: record.title,
            created_at: record.created_at,
        }
    }
}
