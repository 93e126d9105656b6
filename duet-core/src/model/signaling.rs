use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::session::{IceCandidate, SessionDescription, StreamTag};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom {
        room_id: RoomId,
        display_name: String,
    },
    SendOffer {
        offer: SessionDescription,
        to: ParticipantId,
        display_name: String,
        #[serde(default)]
        streams: Vec<StreamTag>,
    },
    SendAnswer {
        answer: SessionDescription,
        to: ParticipantId,
        #[serde(default)]
        streams: Vec<StreamTag>,
    },
    IceCandidate {
        candidate: IceCandidate,
        #[serde(default)]
        to: Option<ParticipantId>,
    },
    ScreenShareStarted {
        display_name: String,
        to: ParticipantId,
    },
    EndCall {
        display_name: String,
        remote_participant_id: Option<ParticipantId>,
        had_local_stream: bool,
    },
    SendMessage {
        text: String,
        room: RoomId,
        display_name: String,
    },
}

impl ClientEvent {
    /// Wire name of the event, as carried in the `op` field.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::SendOffer { .. } => "send-offer",
            ClientEvent::SendAnswer { .. } => "send-answer",
            ClientEvent::IceCandidate { .. } => "ice-candidate",
            ClientEvent::ScreenShareStarted { .. } => "screen-share-started",
            ClientEvent::EndCall { .. } => "end-call",
            ClientEvent::SendMessage { .. } => "send-message",
        }
    }
}

/// Events the relay delivers to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Welcome {
        participant_id: ParticipantId,
    },
    UserJoined {
        display_name: String,
        participant_id: ParticipantId,
    },
    UserLeft {
        participant_id: ParticipantId,
    },
    RoomFull {
        room_id: RoomId,
    },
    ShowCallButton,
    ShowAnswerButton,
    OfferReceived {
        offer: SessionDescription,
        from: ParticipantId,
        display_name: String,
        #[serde(default)]
        streams: Vec<StreamTag>,
    },
    AnswerReceived {
        answer: SessionDescription,
        #[serde(default)]
        streams: Vec<StreamTag>,
    },
    IceCandidate {
        candidate: IceCandidate,
        #[serde(default)]
        from: Option<ParticipantId>,
    },
    ScreenShareStartedRemote {
        display_name: String,
    },
    EndCallReceiver {
        display_name: String,
    },
    MessageReceived {
        text: String,
        from: String,
    },
}

/// Discriminant of a [`ServerEvent`], used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Welcome,
    UserJoined,
    UserLeft,
    RoomFull,
    ShowCallButton,
    ShowAnswerButton,
    OfferReceived,
    AnswerReceived,
    IceCandidate,
    ScreenShareStartedRemote,
    EndCallReceiver,
    MessageReceived,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Welcome => "welcome",
            EventKind::UserJoined => "user-joined",
            EventKind::UserLeft => "user-left",
            EventKind::RoomFull => "room-full",
            EventKind::ShowCallButton => "show-call-button",
            EventKind::ShowAnswerButton => "show-answer-button",
            EventKind::OfferReceived => "offer-received",
            EventKind::AnswerReceived => "answer-received",
            EventKind::IceCandidate => "ice-candidate",
            EventKind::ScreenShareStartedRemote => "screen-share-started-remote",
            EventKind::EndCallReceiver => "end-call-receiver",
            EventKind::MessageReceived => "message-received",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Welcome { .. } => EventKind::Welcome,
            ServerEvent::UserJoined { .. } => EventKind::UserJoined,
            ServerEvent::UserLeft { .. } => EventKind::UserLeft,
            ServerEvent::RoomFull { .. } => EventKind::RoomFull,
            ServerEvent::ShowCallButton => EventKind::ShowCallButton,
            ServerEvent::ShowAnswerButton => EventKind::ShowAnswerButton,
            ServerEvent::OfferReceived { .. } => EventKind::OfferReceived,
            ServerEvent::AnswerReceived { .. } => EventKind::AnswerReceived,
            ServerEvent::IceCandidate { .. } => EventKind::IceCandidate,
            ServerEvent::ScreenShareStartedRemote { .. } => EventKind::ScreenShareStartedRemote,
            ServerEvent::EndCallReceiver { .. } => EventKind::EndCallReceiver,
            ServerEvent::MessageReceived { .. } => EventKind::MessageReceived,
        }
    }
}
