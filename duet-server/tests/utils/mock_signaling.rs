use async_trait::async_trait;
use duet_core::{ParticipantId, ServerEvent};
use duet_server::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingOutput that captures every event a room emits.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<(ParticipantId, ServerEvent)>,
    signals: Arc<Mutex<Vec<(ParticipantId, ServerEvent)>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ParticipantId, ServerEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    /// Events delivered to one participant, in order.
    pub async fn events_for(&self, participant_id: ParticipantId) -> Vec<ServerEvent> {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|(to, _)| *to == participant_id)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_event(&self, to: ParticipantId, event: ServerEvent) {
        tracing::debug!("[MockSignaling] {} to {}", event.kind(), to);

        self.signals.lock().await.push((to, event.clone()));
        let _ = self.tx.send((to, event));
    }
}
