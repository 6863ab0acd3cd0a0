//! Offline sync queue domain models.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncPayload;

/// Every resource kind that participates in offline sync.
pub const SYNC_RESOURCE_TYPES: [ResourceType; 7] = [
    ResourceType::Plant,
    ResourceType::CareLog,
    ResourceType::Photo,
    ResourceType::Note,
    ResourceType::Reminder,
    ResourceType::Post,
    ResourceType::Comment,
];

/// Resource kinds a queued mutation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Plant,
    CareLog,
    Photo,
    Note,
    Reminder,
    Post,
    Comment,
}

impl ResourceType {
    /// REST collection segment for this resource.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Plant => "plants",
            Self::CareLog => "care-logs",
            Self::Photo => "photos",
            Self::Note => "notes",
            Self::Reminder => "reminders",
            Self::Post => "posts",
            Self::Comment => "comments",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plant => "plant",
            Self::CareLog => "care_log",
            Self::Photo => "photo",
            Self::Note => "note",
            Self::Reminder => "reminder",
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

/// Supported mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    /// HTTP verb used to replay this action against the server.
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Flush priority. Declaration order is significant: `Low < Normal < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A single queued mutation awaiting transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    pub id: String,
    pub action: SyncAction,
    /// Stored as item-level `type` and `data` fields.
    #[serde(flatten)]
    pub payload: SyncPayload,
    pub timestamp: DateTime<Utc>,
    pub synced: bool,
    pub retry_count: u32,
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub priority: SyncPriority,
}

impl SyncItem {
    pub fn new(request: NewSyncItem, now: DateTime<Utc>) -> Self {
        Self {
            id: request.id,
            action: request.action,
            payload: request.data,
            timestamp: now,
            synced: false,
            retry_count: 0,
            last_attempt: None,
            last_error: None,
            priority: request.priority.unwrap_or_default(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.payload.resource_type()
    }

    /// True once the item has used up its retry budget without syncing.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        !self.synced && self.retry_count >= max_retries
    }

    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.synced = true;
        self.last_attempt = Some(now);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt = Some(now);
        self.last_error = Some(error.into());
    }
}

/// Flush ordering: higher priority first, then oldest first.
pub fn flush_order(a: &SyncItem, b: &SyncItem) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

/// Enqueue request; `priority` defaults to [`SyncPriority::Normal`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncItem {
    pub id: String,
    pub action: SyncAction,
    pub data: SyncPayload,
    pub priority: Option<SyncPriority>,
}

impl NewSyncItem {
    pub fn new(id: impl Into<String>, action: SyncAction, data: impl Into<SyncPayload>) -> Self {
        Self {
            id: id.into(),
            action,
            data: data.into(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: SyncPriority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Observable queue state for UI consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineState {
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_items: usize,
    pub sync_in_progress: bool,
}

/// Diagnostic aggregate over the whole queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub total: usize,
    pub unsynced: usize,
    /// Unsynced items with at least one failed attempt.
    pub failed: usize,
    pub synced: usize,
    pub by_type: BTreeMap<ResourceType, usize>,
}

impl QueueInfo {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a SyncItem>) -> Self {
        let mut info = QueueInfo::default();
        for item in items {
            info.total += 1;
            if item.synced {
                info.synced += 1;
            } else {
                info.unsynced += 1;
                if item.retry_count > 0 {
                    info.failed += 1;
                }
            }
            *info.by_type.entry(item.resource_type()).or_insert(0) += 1;
        }
        info
    }
}

/// Aggregate outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn attempted(&self) -> usize {
        self.success + self.failed
    }
}

/// Value handed back to callers right after an optimistic enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticResponse<P> {
    pub id: String,
    pub offline: bool,
    pub data: P,
}

/// What caused a flush to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCycleTrigger {
    Enqueue,
    Reconnect,
    Periodic,
    Manual,
}

impl SyncCycleTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::Reconnect => "reconnect",
            Self::Periodic => "periodic",
            Self::Manual => "manual",
        }
    }
}
