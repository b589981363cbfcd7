//! Notification fan-out.
//!
//! Events are handed to every configured channel after the transaction that
//! produced them has committed. Delivery is fire-and-forget: a failing
//! channel is logged and skipped, it never undoes the state change.

use std::sync::Arc;

use async_trait::async_trait;
use grant_workflow::Event;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::errors::{AppError, Result};

/// Channel names accepted in `NOTIFY_CHANNELS`.
pub const CHANNELS: &[&str] = &["activity", "log"];

#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn notify(&self, event: &Event) -> Result<()>;
}

/// Persists events to the activity feed.
pub struct ActivityFeed {
    pool: SqlitePool,
}

impl ActivityFeed {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for ActivityFeed {
    fn channel(&self) -> &'static str {
        "activity"
    }

    async fn notify(&self, event: &Event) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        db::insert_activity(&mut conn, event).await?;
        Ok(())
    }
}

/// Writes events to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &Event) -> Result<()> {
        info!(
            kind = event.kind.as_str(),
            actor = event.actor,
            source = %event.source,
            related = ?event.related.as_ref().map(ToString::to_string),
            title = ?event.title,
            "activity"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Messenger {
    channels: Vec<Arc<dyn Notifier>>,
}

impl Messenger {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build the configured channels, in order.
    pub fn from_config(names: &[String], pool: &SqlitePool) -> Result<Self> {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::with_capacity(names.len());
        for name in names {
            match name.as_str() {
                "activity" => channels.push(Arc::new(ActivityFeed::new(pool.clone()))),
                "log" => channels.push(Arc::new(LogNotifier)),
                other => {
                    return Err(AppError::Config(format!("Unknown notify channel: {other}")))
                }
            }
        }
        Ok(Self::new(channels))
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    pub async fn send(&self, events: &[Event]) {
        for event in events {
            for channel in &self.channels {
                if let Err(e) = channel.notify(event).await {
                    warn!(
                        channel = channel.channel(),
                        kind = event.kind.as_str(),
                        error = %e,
                        "notification failed"
                    );
                }
            }
        }
    }
}
