// Event types for async communication

use uuid::Uuid;

use crate::api::Notification;

/// Events sent from stream tasks to the chat view. Stream events carry the
/// id of the request they belong to so late events from a cancelled stream
/// can be discarded.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A content fragment was appended to the assistant response
    StreamDelta { stream_id: Uuid, text: String },
    /// The response completed normally
    StreamDone { stream_id: Uuid },
    /// The response failed or was cancelled
    StreamFailed { stream_id: Uuid, message: String },
    Notice(Notification),
}
