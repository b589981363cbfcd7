//! User-visible notices.
//!
//! Handlers collect notices in a [`Notices`] value that travels with the
//! request and is returned alongside the redirect it explains.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notices(Vec<Notice>);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        self.0.push(notice);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Notice::new(Level::Info, message));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Notice::new(Level::Success, message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Notice::new(Level::Warning, message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Notice::new(Level::Error, message));
    }

    pub fn extend(&mut self, other: Notices) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.0.iter()
    }

    pub fn count(&self, level: Level) -> usize {
        self.0.iter().filter(|n| n.level == level).count()
    }
}

impl From<Notice> for Notices {
    fn from(notice: Notice) -> Self {
        Self(vec![notice])
    }
}
