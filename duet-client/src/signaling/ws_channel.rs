use crate::error::SignalingError;
use crate::signaling::{SignalChannel, SignalingClient};
use async_trait::async_trait;
use duet_core::{ClientEvent, ServerEvent};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// WebSocket transport to the relay.
pub struct WsSignalChannel {
    outbound: mpsc::UnboundedSender<Message>,
    recv_task: AbortHandle,
}

impl WsSignalChannel {
    /// Opens the socket and returns a client bound to it.
    pub async fn connect(url: &str) -> Result<SignalingClient, SignalingError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        info!(url, "Connected to relay");

        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerEvent>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            if in_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid ServerEvent from relay: {:?}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            debug!("Relay stream finished");
        });

        let channel = Self {
            outbound: out_tx,
            recv_task: recv_task.abort_handle(),
        };
        Ok(SignalingClient::new(Arc::new(channel), in_rx))
    }
}

#[async_trait]
impl SignalChannel for WsSignalChannel {
    async fn send(&self, event: ClientEvent) -> Result<(), SignalingError> {
        let json = serde_json::to_string(&event)?;
        self.outbound
            .send(Message::Text(json.into()))
            .map_err(|_| SignalingError::Closed)
    }

    async fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
        self.recv_task.abort();
    }
}

impl Drop for WsSignalChannel {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}
