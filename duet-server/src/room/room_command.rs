use duet_core::{ClientEvent, ParticipantId};
use tokio::sync::oneshot;

/// Commands delivered to a room by the relay service.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admission request. Answered with `true` when the participant is a
    /// member afterwards, `false` when the room was full.
    Join {
        participant_id: ParticipantId,
        display_name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// A signal from a member, to be forwarded or broadcast.
    Relay {
        from: ParticipantId,
        event: ClientEvent,
    },

    /// The participant's connection closed or it moved to another room.
    Leave { participant_id: ParticipantId },
}
