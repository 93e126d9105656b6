use crate::error::{CallError, MediaError};
use crate::peer_link::LinkState;
use crate::session::{CapabilityState, ChatEntry, Phase, Role};
use duet_core::{Participant, ParticipantId, RoomId, StreamLabel};

/// User-facing notifications emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Joined { participant_id: ParticipantId },
    RemoteOnline(Participant),
    RemoteLeft(Participant),
    RoleAssigned(Role),
    IncomingCall(Participant),
    CallConnected,
    /// `by` names the remote participant when they ended the call.
    CallEnded { by: Option<String> },
    RemoteStream { stream_id: String, label: StreamLabel },
    ScreenShareAnnounced { display_name: String },
    Chat(ChatEntry),
    MediaUnavailable(MediaError),
    LinkState(LinkState),
    RoomFull(RoomId),
    CallFailed(String),
}

impl SessionNotice {
    pub(crate) fn call_failed(err: &CallError) -> Self {
        SessionNotice::CallFailed(err.to_string())
    }
}

/// Point-in-time view of a session, for presentation and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub role: Role,
    pub local_id: Option<ParticipantId>,
    pub remote: Option<Participant>,
    pub capabilities: CapabilityState,
    pub chat: Vec<ChatEntry>,
    pub has_link: bool,
    pub link_epoch: u64,
    pub media_attached: bool,
    pub has_local_stream: bool,
    pub sharing_screen: bool,
    pub buffered_candidates: usize,
    pub negotiating: bool,
    pub remote_streams: Vec<(String, StreamLabel)>,
}
