//! Typed mutation payloads, one schema per syncable resource kind.
//!
//! Every payload carries an optional resource `id` (absent for creates that
//! have not been assigned a temporary id yet) and a flattened `extra` map so
//! fields the client knows about but this crate does not are sent verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ResourceType;

/// Care activity recorded in a care log or scheduled by a reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareType {
    #[default]
    Watering,
    Fertilizing,
    Pruning,
    Repotting,
    Misting,
    Rotating,
    PestTreatment,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareLogPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub plant_id: String,
    pub care_type: CareType,
    pub performed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_ml: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub plant_id: String,
    /// Remote URL or inline data URL of the image.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub plant_id: String,
    pub care_type: CareType,
    pub due_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_every_days: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A queued mutation's body, tagged by resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncPayload {
    Plant(PlantPayload),
    CareLog(CareLogPayload),
    Photo(PhotoPayload),
    Note(NotePayload),
    Reminder(ReminderPayload),
    Post(PostPayload),
    Comment(CommentPayload),
}

impl SyncPayload {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Plant(_) => ResourceType::Plant,
            Self::CareLog(_) => ResourceType::CareLog,
            Self::Photo(_) => ResourceType::Photo,
            Self::Note(_) => ResourceType::Note,
            Self::Reminder(_) => ResourceType::Reminder,
            Self::Post(_) => ResourceType::Post,
            Self::Comment(_) => ResourceType::Comment,
        }
    }

    /// Server-side (or temporary) id of the resource this payload targets.
    pub fn resource_id(&self) -> Option<&str> {
        let id = match self {
            Self::Plant(p) => &p.id,
            Self::CareLog(p) => &p.id,
            Self::Photo(p) => &p.id,
            Self::Note(p) => &p.id,
            Self::Reminder(p) => &p.id,
            Self::Post(p) => &p.id,
            Self::Comment(p) => &p.id,
        };
        id.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set_resource_id(&mut self, value: impl Into<String>) {
        let value = Some(value.into());
        match self {
            Self::Plant(p) => p.id = value,
            Self::CareLog(p) => p.id = value,
            Self::Photo(p) => p.id = value,
            Self::Note(p) => p.id = value,
            Self::Reminder(p) => p.id = value,
            Self::Post(p) => p.id = value,
            Self::Comment(p) => p.id = value,
        }
    }

    /// The resource fields as a JSON object, without the enum tag.
    pub fn to_json_object(&self) -> serde_json::Result<Map<String, Value>> {
        let value = match self {
            Self::Plant(p) => serde_json::to_value(p)?,
            Self::CareLog(p) => serde_json::to_value(p)?,
            Self::Photo(p) => serde_json::to_value(p)?,
            Self::Note(p) => serde_json::to_value(p)?,
            Self::Reminder(p) => serde_json::to_value(p)?,
            Self::Post(p) => serde_json::to_value(p)?,
            Self::Comment(p) => serde_json::to_value(p)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            // Unreachable for struct payloads.
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Ok(map)
            }
        }
    }
}

impl From<PlantPayload> for SyncPayload {
    fn from(value: PlantPayload) -> Self {
        Self::Plant(value)
    }
}

impl From<CareLogPayload> for SyncPayload {
    fn from(value: CareLogPayload) -> Self {
        Self::CareLog(value)
    }
}

impl From<PhotoPayload> for SyncPayload {
    fn from(value: PhotoPayload) -> Self {
        Self::Photo(value)
    }
}

impl From<NotePayload> for SyncPayload {
    fn from(value: NotePayload) -> Self {
        Self::Note(value)
    }
}

impl From<ReminderPayload> for SyncPayload {
    fn from(value: ReminderPayload) -> Self {
        Self::Reminder(value)
    }
}

impl From<PostPayload> for SyncPayload {
    fn from(value: PostPayload) -> Self {
        Self::Post(value)
    }
}

impl From<CommentPayload> for SyncPayload {
    fn from(value: CommentPayload) -> Self {
        Self::Comment(value)
    }
}
