use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Debug, Clone)]
#[command(name = "duet-server", about = "Signaling relay for two-party calls")]
pub struct ServerConfig {
    /// Address the WebSocket endpoint listens on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Members admitted per room before `room-full` is returned.
    #[arg(long, default_value_t = 2)]
    pub room_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            room_capacity: 2,
        }
    }
}
