//! Wire types for replaying queued mutations against the GreenMate API.

use serde::Deserialize;
use serde_json::Value;

use greenmate_core::sync::{SyncAction, SyncItem};

use crate::error::{Result, SyncError};

/// Payload flag telling the server the mutation was replayed from the offline queue.
pub const OFFLINE_SYNC_FIELD: &str = "_offlineSync";

/// Payload field carrying the client-side creation time (ms since epoch).
pub const ORIGINAL_TIMESTAMP_FIELD: &str = "_originalTimestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMethod {
    Post,
    Put,
    Delete,
}

impl SyncMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl From<SyncAction> for SyncMethod {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Create => Self::Post,
            SyncAction::Update => Self::Put,
            SyncAction::Delete => Self::Delete,
        }
    }
}

/// One HTTP call derived from a queued item.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub item_id: String,
    pub method: SyncMethod,
    /// Path relative to the API base URL, e.g. `/plants/abc`.
    pub path: String,
    pub body: Option<Value>,
}

impl SyncRequest {
    /// Derive endpoint, method and body from `(type, action, data.id)`.
    ///
    /// Create posts to the collection; update and delete target the resource
    /// path and therefore require a resource id.
    pub fn for_item(item: &SyncItem) -> Result<Self> {
        let collection = item.resource_type().collection();
        let path = match item.action {
            SyncAction::Create => format!("/{}", collection),
            SyncAction::Update | SyncAction::Delete => {
                let resource_id = item.payload.resource_id().ok_or_else(|| {
                    SyncError::invalid_request(format!(
                        "{} {} item {} has no resource id",
                        item.action.http_method(),
                        item.resource_type().as_str(),
                        item.id
                    ))
                })?;
                format!("/{}/{}", collection, urlencoding::encode(resource_id))
            }
        };

        let body = match item.action {
            SyncAction::Delete => None,
            SyncAction::Create | SyncAction::Update => {
                let mut fields = item.payload.to_json_object()?;
                fields.insert(OFFLINE_SYNC_FIELD.to_string(), Value::Bool(true));
                fields.insert(
                    ORIGINAL_TIMESTAMP_FIELD.to_string(),
                    Value::from(item.timestamp.timestamp_millis()),
                );
                Some(Value::Object(fields))
            }
        };

        Ok(Self {
            item_id: item.id.clone(),
            method: item.action.into(),
            path,
            body,
        })
    }
}

/// A successful (2xx) server reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResponse {
    pub status: u16,
    /// Parsed JSON body; `Value::Null` when the body is empty or not JSON.
    pub body: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
