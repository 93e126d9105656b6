use crate::config::ServerConfig;
use crate::room::{RoomCommand, RoomManager};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{ClientEvent, ParticipantId, RoomId, ServerEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Outboxes of every connected participant.
#[derive(Default)]
pub struct PeerRegistry {
    peers: DashMap<ParticipantId, mpsc::UnboundedSender<ServerEvent>>,
}

impl PeerRegistry {
    pub fn add_peer(&self, participant_id: ParticipantId, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.peers.insert(participant_id, tx);
    }

    pub fn remove_peer(&self, participant_id: &ParticipantId) {
        self.peers.remove(participant_id);
    }

    pub fn send_signal(&self, participant_id: ParticipantId, event: ServerEvent) {
        let Some(peer) = self.peers.get(&participant_id) else {
            warn!(
                "Attempted to send {} to disconnected participant {}",
                event.kind(),
                participant_id
            );
            return;
        };
        if peer.send(event).is_err() {
            warn!("Outbox of {} is closed", participant_id);
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[async_trait]
impl SignalingOutput for PeerRegistry {
    async fn send_event(&self, to: ParticipantId, event: ServerEvent) {
        self.send_signal(to, event);
    }
}

/// Connection-facing relay: assigns participant ids, tracks room
/// membership and hands signals to the owning room.
#[derive(Clone)]
pub struct RelayService {
    peers: Arc<PeerRegistry>,
    rooms: RoomManager,
    memberships: Arc<DashMap<ParticipantId, RoomId>>,
}

impl RelayService {
    pub fn new(config: &ServerConfig) -> Self {
        let peers = Arc::new(PeerRegistry::default());
        Self {
            rooms: RoomManager::new(peers.clone(), config.room_capacity),
            peers,
            memberships: Arc::new(DashMap::new()),
        }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn room_of(&self, participant_id: ParticipantId) -> Option<RoomId> {
        self.memberships
            .get(&participant_id)
            .map(|room| room.value().clone())
    }

    pub fn connected(&self) -> usize {
        self.peers.len()
    }

    /// Registers a new connection and greets it with its participant id.
    pub fn connect(&self, outbox: mpsc::UnboundedSender<ServerEvent>) -> ParticipantId {
        let participant_id = ParticipantId::new();
        self.peers.add_peer(participant_id, outbox);
        self.peers
            .send_signal(participant_id, ServerEvent::Welcome { participant_id });
        info!("Participant {} connected", participant_id);
        participant_id
    }

    pub async fn handle(&self, from: ParticipantId, event: ClientEvent) {
        debug!("{} from {}", event.name(), from);

        if let ClientEvent::JoinRoom {
            room_id,
            display_name,
        } = event
        {
            self.join(from, room_id, display_name).await;
            return;
        }

        let Some(room_id) = self.room_of(from) else {
            warn!("Dropping {} from {}: not in a room", event.name(), from);
            return;
        };
        self.rooms
            .dispatch(&room_id, RoomCommand::Relay { from, event })
            .await;
    }

    /// Removes the participant from its room and forgets its outbox.
    pub async fn disconnect(&self, participant_id: ParticipantId) {
        self.peers.remove_peer(&participant_id);
        if let Some((_, room_id)) = self.memberships.remove(&participant_id) {
            self.rooms
                .dispatch(&room_id, RoomCommand::Leave { participant_id })
                .await;
        }
        info!("Participant {} disconnected", participant_id);
    }

    async fn join(&self, participant_id: ParticipantId, room_id: RoomId, display_name: String) {
        if let Some(current) = self.room_of(participant_id) {
            if current == room_id {
                debug!("{} is already in room {}", participant_id, room_id);
                return;
            }
            self.memberships.remove(&participant_id);
            self.rooms
                .dispatch(&current, RoomCommand::Leave { participant_id })
                .await;
        }

        let (respond_to, admitted) = oneshot::channel();
        self.rooms
            .dispatch(
                &room_id,
                RoomCommand::Join {
                    participant_id,
                    display_name,
                    respond_to,
                },
            )
            .await;

        match admitted.await {
            Ok(true) => {
                self.memberships.insert(participant_id, room_id);
            }
            Ok(false) => info!("{} was not admitted to room {}", participant_id, room_id),
            Err(_) => warn!("Room {} dropped the join of {}", room_id, participant_id),
        }
    }
}
