use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use duet_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Registry of live rooms. Rooms are created on first use and removed when
/// their last member leaves.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, mpsc::Sender<RoomCommand>>>,
    signaling: Arc<dyn SignalingOutput>,
    capacity: usize,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>, capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            capacity,
        }
    }

    pub fn get_room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        if let Some(sender) = self.rooms.get(room_id) {
            return sender.clone();
        }

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id))
            .clone()
    }

    /// Delivers `cmd` to the room, replacing the room once if it shut down
    /// between lookup and delivery.
    pub async fn dispatch(&self, room_id: &RoomId, cmd: RoomCommand) {
        let sender = self.get_room_sender(room_id);
        let Err(mpsc::error::SendError(cmd)) = sender.send(cmd).await else {
            return;
        };

        debug!("Room {} closed under us, retrying on a fresh room", room_id);
        self.rooms
            .remove_if(room_id, |_, current| current.same_channel(&sender));
        if self.get_room_sender(room_id).send(cmd).await.is_err() {
            error!("Room {} refused a command twice", room_id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    fn spawn_room(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", room_id);
        let (tx, rx) = mpsc::channel(100);
        let room = Room::new(room_id.clone(), self.capacity, rx, self.signaling.clone());

        let manager = self.clone();
        let room_id = room_id.clone();
        let registered = tx.clone();
        tokio::spawn(async move {
            let leftovers = room.run().await;
            manager
                .rooms
                .remove_if(&room_id, |_, current| current.same_channel(&registered));

            // Joins that raced with shutdown go to a replacement room.
            for cmd in leftovers {
                match cmd {
                    RoomCommand::Join { .. } => manager.dispatch(&room_id, cmd).await,
                    other => debug!("Dropping {:?} queued for closed room {}", other, room_id),
                }
            }
        });

        tx
    }
}
