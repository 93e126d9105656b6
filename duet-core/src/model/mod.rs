mod participant;
mod room;
mod session;
mod signaling;

pub use participant::{Participant, ParticipantId};
pub use room::RoomId;
pub use session::{IceCandidate, SdpKind, SessionDescription, StreamLabel, StreamTag};
pub use signaling::{ClientEvent, EventKind, IceServerConfig, ServerEvent};
