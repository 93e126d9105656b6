use async_trait::async_trait;
use duet_core::{ParticipantId, ServerEvent};

/// Outbound side of the relay, as seen by rooms.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Delivers `event` to one connected participant. Unknown or
    /// disconnected participants are skipped.
    async fn send_event(&self, to: ParticipantId, event: ServerEvent);
}
