use crate::media::MediaConstraints;
use duet_core::utils::default_ice_servers;
use duet_core::{IceServerConfig, RoomId};

/// Per-session client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub signaling_url: String,
    pub room_id: RoomId,
    pub display_name: String,
    pub ice_servers: Vec<IceServerConfig>,
    /// Initiator sends its offer on the first negotiation-needed event
    /// instead of waiting for an explicit start.
    pub auto_offer: bool,
    /// Acquire camera/microphone as soon as the session starts.
    pub acquire_media_on_start: bool,
    pub media: MediaConstraints,
}

impl ClientConfig {
    pub fn new(room_id: impl Into<RoomId>, display_name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn with_signaling_url(mut self, url: impl Into<String>) -> Self {
        self.signaling_url = url.into();
        self
    }

    pub fn with_auto_offer(mut self, auto_offer: bool) -> Self {
        self.auto_offer = auto_offer;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:3000/ws".to_owned(),
            room_id: RoomId::new("default"),
            display_name: "guest".to_owned(),
            ice_servers: default_ice_servers(),
            auto_offer: false,
            acquire_media_on_start: true,
            media: MediaConstraints::default(),
        }
    }
}
