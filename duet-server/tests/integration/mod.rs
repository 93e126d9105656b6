pub mod chat_tests;
pub mod room_tests;
pub mod websocket_tests;

use duet_server::{RelayService, ServerConfig};
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_relay() -> RelayService {
    RelayService::new(&ServerConfig::default())
}
