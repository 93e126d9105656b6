use duet_core::IceServerConfig;
use duet_core::utils::default_ice_servers;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;

/// ICE configuration for webrtc-rs backed links.
#[derive(Debug, Clone)]
pub struct RtcConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl RtcConfig {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    pub(crate) fn to_rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
        }
    }
}
