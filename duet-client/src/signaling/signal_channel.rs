use crate::error::SignalingError;
use async_trait::async_trait;
use duet_core::ClientEvent;

/// Outbound half of a relay transport. The inbound half is an
/// `mpsc::UnboundedReceiver<ServerEvent>` handed to [`SignalingClient::new`].
///
/// Delivery is fire-and-forget: no acknowledgment, no buffering across
/// reconnects.
///
/// [`SignalingClient::new`]: crate::signaling::SignalingClient::new
#[async_trait]
pub trait SignalChannel: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<(), SignalingError>;

    async fn close(&self);
}
