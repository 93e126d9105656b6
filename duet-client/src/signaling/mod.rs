mod signal_channel;
mod signaling_client;
mod ws_channel;

pub use signal_channel::SignalChannel;
pub use signaling_client::{EventHandler, SignalSender, SignalingClient, Subscription, Subscriptions};
pub use ws_channel::WsSignalChannel;
