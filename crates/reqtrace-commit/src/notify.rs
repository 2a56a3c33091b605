//! Commit notifications
//!
//! One [`CommitNotification`] is emitted per commit, summarizing the applied
//! changes per (kind, action). Transport is the [`NotificationSink`]'s
//! business.

use parking_lot::Mutex;
use reqtrace_model::{EntityKindTag, VersionId, VersionUid};
use serde::{Deserialize, Serialize};

/// What happened to the listed entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Add,
    Update,
    Delete,
}

/// Business keys sharing a kind and action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub kind: EntityKindTag,
    pub action: EntityAction,
    pub keys: Vec<String>,
}

/// Payload handed to the notification collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNotification {
    pub version_uid: VersionUid,
    pub version_id: VersionId,
    pub changes: Vec<EntityChange>,
}

impl CommitNotification {
    /// Payload with no changes
    #[must_use]
    pub fn empty(version_uid: VersionUid, version_id: VersionId) -> Self {
        Self {
            version_uid,
            version_id,
            changes: Vec::new(),
        }
    }

    /// Keys reported for a kind and action
    #[must_use]
    pub fn keys(&self, kind: EntityKindTag, action: EntityAction) -> &[String] {
        self.changes
            .iter()
            .find(|change| change.kind == kind && change.action == action)
            .map(|change| change.keys.as_slice())
            .unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Delivery failure
#[derive(Debug, Clone, thiserror::Error)]
#[error("notification sink rejected payload: {0}")]
pub struct NotifyError(pub String);

/// Notification collaborator
pub trait NotificationSink: Send + Sync {
    /// Deliver one payload
    ///
    /// # Errors
    /// Returns error if delivery failed
    fn publish(&self, notification: &CommitNotification) -> Result<(), NotifyError>;
}

/// Sink that drops every payload
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _notification: &CommitNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sink that keeps payloads in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<CommitNotification>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far
    #[must_use]
    pub fn notifications(&self) -> Vec<CommitNotification> {
        self.received.lock().clone()
    }

    /// Drain received payloads
    pub fn take(&self) -> Vec<CommitNotification> {
        std::mem::take(&mut *self.received.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: &CommitNotification) -> Result<(), NotifyError> {
        self.received.lock().push(notification.clone());
        Ok(())
    }
}
