use async_trait::async_trait;
use duet_client::SignalingError;
use duet_client::signaling::{SignalChannel, SignalingClient};
use duet_core::{ClientEvent, ParticipantId};
use duet_server::RelayService;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Signal channel that calls straight into an in-process relay.
pub struct RelayChannel {
    service: RelayService,
    participant_id: ParticipantId,
    closed: AtomicBool,
}

#[async_trait]
impl SignalChannel for RelayChannel {
    async fn send(&self, event: ClientEvent) -> Result<(), SignalingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SignalingError::Closed);
        }
        self.service.handle(self.participant_id, event).await;
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.service.disconnect(self.participant_id).await;
        }
    }
}

/// Registers a connection with `service` and returns a client bound to it.
pub fn connect_in_process(service: &RelayService) -> (SignalingClient, ParticipantId) {
    let (tx, rx) = mpsc::unbounded_channel();
    let participant_id = service.connect(tx);
    let channel = RelayChannel {
        service: service.clone(),
        participant_id,
        closed: AtomicBool::new(false),
    };
    (SignalingClient::new(Arc::new(channel), rx), participant_id)
}
