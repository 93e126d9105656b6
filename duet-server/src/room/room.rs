use crate::room::room_command::RoomCommand;
use crate::signaling::SignalingOutput;
use duet_core::{ClientEvent, ParticipantId, RoomId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Member {
    participant_id: ParticipantId,
    display_name: String,
}

/// One room's event loop. Owns the member list; every relay decision for
/// the room is made here, one command at a time.
pub struct Room {
    room_id: RoomId,
    capacity: usize,
    members: Vec<Member>,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        capacity: usize,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            room_id,
            capacity: capacity.max(1),
            members: Vec::new(),
            command_rx,
            signaling,
        }
    }

    /// Runs until the last member leaves. Commands that were queued but not
    /// processed by then are returned to the caller.
    pub async fn run(mut self) -> Vec<RoomCommand> {
        info!("Room {} event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
            if self.members.is_empty() {
                break;
            }
        }

        self.command_rx.close();
        let mut leftovers = Vec::new();
        while let Ok(cmd) = self.command_rx.try_recv() {
            leftovers.push(cmd);
        }

        info!("Room {} is empty, shutting down", self.room_id);
        leftovers
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                participant_id,
                display_name,
                respond_to,
            } => {
                let admitted = self.join(participant_id, display_name).await;
                let _ = respond_to.send(admitted);
            }
            RoomCommand::Relay { from, event } => self.relay(from, event).await,
            RoomCommand::Leave { participant_id } => self.leave(participant_id).await,
        }
    }

    async fn join(&mut self, participant_id: ParticipantId, display_name: String) -> bool {
        if let Some(member) = self.member_mut(participant_id) {
            member.display_name = display_name;
            return true;
        }

        if self.members.len() >= self.capacity {
            warn!("Room {} is full, rejecting {}", self.room_id, participant_id);
            self.signaling
                .send_event(
                    participant_id,
                    ServerEvent::RoomFull {
                        room_id: self.room_id.clone(),
                    },
                )
                .await;
            return false;
        }

        info!("{} ({}) joined room {}", display_name, participant_id, self.room_id);
        let newcomer = Member {
            participant_id,
            display_name,
        };

        for member in &self.members {
            self.signaling
                .send_event(
                    participant_id,
                    ServerEvent::UserJoined {
                        display_name: member.display_name.clone(),
                        participant_id: member.participant_id,
                    },
                )
                .await;
            self.signaling
                .send_event(
                    member.participant_id,
                    ServerEvent::UserJoined {
                        display_name: newcomer.display_name.clone(),
                        participant_id,
                    },
                )
                .await;
        }
        self.members.push(newcomer);

        // The member who was waiting places the call.
        if let [first, second] = self.members.as_slice() {
            self.signaling
                .send_event(first.participant_id, ServerEvent::ShowCallButton)
                .await;
            self.signaling
                .send_event(second.participant_id, ServerEvent::ShowAnswerButton)
                .await;
        }
        true
    }

    async fn relay(&mut self, from: ParticipantId, event: ClientEvent) {
        let Some(sender) = self.member(from).cloned() else {
            warn!("Dropping {} from non-member {}", event.name(), from);
            return;
        };
        debug!("Relaying {} from {} in room {}", event.name(), from, self.room_id);

        match event {
            ClientEvent::SendOffer {
                offer,
                to,
                display_name,
                streams,
            } => {
                self.forward(
                    from,
                    Some(to),
                    ServerEvent::OfferReceived {
                        offer,
                        from,
                        display_name,
                        streams,
                    },
                )
                .await
            }
            ClientEvent::SendAnswer {
                answer,
                to,
                streams,
            } => {
                self.forward(from, Some(to), ServerEvent::AnswerReceived { answer, streams })
                    .await
            }
            ClientEvent::IceCandidate { candidate, to } => {
                self.forward(
                    from,
                    to,
                    ServerEvent::IceCandidate {
                        candidate,
                        from: Some(from),
                    },
                )
                .await
            }
            ClientEvent::ScreenShareStarted { display_name, to } => {
                self.forward(
                    from,
                    Some(to),
                    ServerEvent::ScreenShareStartedRemote { display_name },
                )
                .await
            }
            ClientEvent::EndCall {
                display_name,
                remote_participant_id,
                ..
            } => {
                self.forward(
                    from,
                    remote_participant_id,
                    ServerEvent::EndCallReceiver { display_name },
                )
                .await
            }
            ClientEvent::SendMessage {
                text, display_name, ..
            } => {
                let from_name = if display_name.is_empty() {
                    sender.display_name
                } else {
                    display_name
                };
                for member in &self.members {
                    self.signaling
                        .send_event(
                            member.participant_id,
                            ServerEvent::MessageReceived {
                                text: text.clone(),
                                from: from_name.clone(),
                            },
                        )
                        .await;
                }
            }
            ClientEvent::JoinRoom { .. } => {
                debug!("Ignoring join-room relayed into room {}", self.room_id);
            }
        }
    }

    /// Sends `event` to `to`, or to every other member when no target is named.
    async fn forward(&self, from: ParticipantId, to: Option<ParticipantId>, event: ServerEvent) {
        match to {
            Some(target) if target == from => {
                warn!("{} addressed {} to itself", from, event.kind());
            }
            Some(target) if self.member(target).is_none() => {
                warn!(
                    "Dropping {} for {}: not a member of room {}",
                    event.kind(),
                    target,
                    self.room_id
                );
            }
            Some(target) => self.signaling.send_event(target, event).await,
            None => {
                for member in self.members.iter().filter(|m| m.participant_id != from) {
                    self.signaling
                        .send_event(member.participant_id, event.clone())
                        .await;
                }
            }
        }
    }

    async fn leave(&mut self, participant_id: ParticipantId) {
        let Some(index) = self
            .members
            .iter()
            .position(|m| m.participant_id == participant_id)
        else {
            return;
        };
        let member = self.members.remove(index);
        info!("{} left room {}", member.display_name, self.room_id);

        for remaining in &self.members {
            self.signaling
                .send_event(
                    remaining.participant_id,
                    ServerEvent::UserLeft { participant_id },
                )
                .await;
        }
    }

    fn member(&self, participant_id: ParticipantId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.participant_id == participant_id)
    }

    fn member_mut(&mut self, participant_id: ParticipantId) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|m| m.participant_id == participant_id)
    }
}
