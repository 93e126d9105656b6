mod relay_service;
mod signaling_output;
mod ws_handler;

pub use relay_service::*;
pub use signaling_output::*;
pub use ws_handler::*;
