//! Optimistic create helpers, one per resource kind.
//!
//! Each helper assigns a temporary id, queues a `create`, and hands back the
//! payload so the UI can render it before the server confirms.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use greenmate_core::sync::{
    CareLogPayload, CommentPayload, NewSyncItem, NotePayload, OptimisticResponse, PhotoPayload,
    PlantPayload, PostPayload, ReminderPayload, SyncAction, SyncPayload, SyncPriority,
};

use crate::queue::OfflineSyncQueue;

/// Prefix marking ids the server has not assigned yet.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// `temp_<unix millis>_<8 hex chars>`
pub fn generate_temp_id() -> String {
    format!(
        "{}{}_{:08x}",
        TEMP_ID_PREFIX,
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen::<u32>()
    )
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

fn enqueue_create<P>(
    queue: &Arc<OfflineSyncQueue>,
    temp_id: String,
    payload: P,
    priority: SyncPriority,
) -> OptimisticResponse<P>
where
    P: Clone + Into<SyncPayload>,
{
    let id = queue.enqueue(
        NewSyncItem::new(temp_id, SyncAction::Create, payload.clone()).with_priority(priority),
    );
    OptimisticResponse {
        id,
        offline: true,
        data: payload,
    }
}

pub fn add_plant(
    queue: &Arc<OfflineSyncQueue>,
    mut plant: PlantPayload,
) -> OptimisticResponse<PlantPayload> {
    let id = generate_temp_id();
    plant.id = Some(id.clone());
    enqueue_create(queue, id, plant, SyncPriority::High)
}

pub fn add_care_log(
    queue: &Arc<OfflineSyncQueue>,
    mut care_log: CareLogPayload,
) -> OptimisticResponse<CareLogPayload> {
    let id = generate_temp_id();
    care_log.id = Some(id.clone());
    enqueue_create(queue, id, care_log, SyncPriority::Normal)
}

/// Photos are bulky and rarely urgent, so they go last.
pub fn add_photo(
    queue: &Arc<OfflineSyncQueue>,
    mut photo: PhotoPayload,
) -> OptimisticResponse<PhotoPayload> {
    let id = generate_temp_id();
    photo.id = Some(id.clone());
    enqueue_create(queue, id, photo, SyncPriority::Low)
}

pub fn add_note(
    queue: &Arc<OfflineSyncQueue>,
    mut note: NotePayload,
) -> OptimisticResponse<NotePayload> {
    let id = generate_temp_id();
    note.id = Some(id.clone());
    enqueue_create(queue, id, note, SyncPriority::Normal)
}

pub fn add_reminder(
    queue: &Arc<OfflineSyncQueue>,
    mut reminder: ReminderPayload,
) -> OptimisticResponse<ReminderPayload> {
    let id = generate_temp_id();
    reminder.id = Some(id.clone());
    enqueue_create(queue, id, reminder, SyncPriority::Normal)
}

pub fn add_post(
    queue: &Arc<OfflineSyncQueue>,
    mut post: PostPayload,
) -> OptimisticResponse<PostPayload> {
    let id = generate_temp_id();
    post.id = Some(id.clone());
    enqueue_create(queue, id, post, SyncPriority::Normal)
}

pub fn add_comment(
    queue: &Arc<OfflineSyncQueue>,
    mut comment: CommentPayload,
) -> OptimisticResponse<CommentPayload> {
    let id = generate_temp_id();
    comment.id = Some(id.clone());
    enqueue_create(queue, id, comment, SyncPriority::Normal)
}
