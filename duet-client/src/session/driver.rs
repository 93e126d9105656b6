use crate::config::ClientConfig;
use crate::error::CallError;
use crate::media::MediaDevice;
use crate::peer_link::{LinkEnvelope, PeerLinkFactory, RtcConfig, RtcPeerLinkFactory};
use crate::session::{
    CallSession, ChatOutcome, MediaOutcome, SessionNotice, SessionSnapshot, SessionWiring,
    ToggleOutcome,
};
use crate::signaling::{SignalingClient, WsSignalChannel};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// User-side requests, applied by the driver in the order they were sent.
#[derive(Debug)]
pub enum SessionCommand {
    StartCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    AnswerCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    EndCall {
        respond_to: oneshot::Sender<()>,
    },
    ToggleAudio {
        respond_to: oneshot::Sender<ToggleOutcome>,
    },
    ToggleVideo {
        respond_to: oneshot::Sender<ToggleOutcome>,
    },
    SendMessage {
        text: String,
        respond_to: oneshot::Sender<ChatOutcome>,
    },
    StartScreenShare {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    AcquireMedia,
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Runs one [`CallSession`] on a single task.
///
/// Commands, inbound signals, link events and media results are multiplexed
/// with `select!`, so the session only ever sees one input at a time.
pub struct SessionDriver {
    session: CallSession,
    signaling: SignalingClient,
    command_rx: mpsc::Receiver<SessionCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEnvelope>,
    media_rx: mpsc::UnboundedReceiver<MediaOutcome>,
}

impl SessionDriver {
    pub fn new(
        config: &ClientConfig,
        signaling: SignalingClient,
        link_factory: Arc<dyn PeerLinkFactory>,
        media: Arc<dyn MediaDevice>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionNotice>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let session = CallSession::new(
            config,
            signaling.sender(),
            link_factory,
            media,
            SessionWiring {
                link_events: link_tx,
                media_results: media_tx,
                notices: notice_tx,
            },
        );

        let driver = Self {
            session,
            signaling,
            command_rx,
            link_rx,
            media_rx,
        };
        (driver, SessionHandle { command_tx }, notice_rx)
    }

    /// Connects to the relay over WebSocket and backs the session with
    /// webrtc peer connections.
    pub async fn connect(
        config: &ClientConfig,
        media: Arc<dyn MediaDevice>,
    ) -> Result<(Self, SessionHandle, mpsc::UnboundedReceiver<SessionNotice>), CallError> {
        let signaling = WsSignalChannel::connect(&config.signaling_url).await?;
        let links = Arc::new(RtcPeerLinkFactory::new(RtcConfig::new(
            config.ice_servers.clone(),
        )));
        Ok(Self::new(config, signaling, links, media))
    }

    pub async fn run(mut self) {
        info!("Session event loop started");
        self.session.start().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Session shutting down");
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                    }
                }

                evt = self.signaling.recv() => {
                    match evt {
                        Some(e) => self.session.handle_signal(e).await,
                        None => {
                            warn!("Signaling channel closed");
                            break;
                        }
                    }
                }

                Some(envelope) = self.link_rx.recv() => {
                    self.session.handle_link_event(envelope).await;
                }

                Some(outcome) = self.media_rx.recv() => {
                    self.session.handle_media_outcome(outcome).await;
                }
            }
        }

        self.session.end_call().await;
        self.signaling.close().await;
        info!("Session event loop finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::StartCall { respond_to } => {
                let result = self.session.start_call().await;
                if let Err(e) = &result {
                    warn!("Start call failed: {}", e);
                }
                let _ = respond_to.send(result);
            }
            SessionCommand::AnswerCall { respond_to } => {
                let result = self.session.answer_call().await;
                if let Err(e) = &result {
                    warn!("Answer call failed: {}", e);
                }
                let _ = respond_to.send(result);
            }
            SessionCommand::EndCall { respond_to } => {
                self.session.end_call().await;
                let _ = respond_to.send(());
            }
            SessionCommand::ToggleAudio { respond_to } => {
                let _ = respond_to.send(self.session.toggle_audio());
            }
            SessionCommand::ToggleVideo { respond_to } => {
                let _ = respond_to.send(self.session.toggle_video());
            }
            SessionCommand::SendMessage { text, respond_to } => {
                let _ = respond_to.send(self.session.send_message(&text).await);
            }
            SessionCommand::StartScreenShare { respond_to } => {
                let _ = respond_to.send(self.session.start_screen_share());
            }
            SessionCommand::AcquireMedia => self.session.request_local_media(),
            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.session.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }
}

/// Cloneable front end of a running [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn start_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| SessionCommand::StartCall { respond_to })
            .await?
    }

    pub async fn answer_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| SessionCommand::AnswerCall { respond_to })
            .await?
    }

    pub async fn end_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| SessionCommand::EndCall { respond_to })
            .await
    }

    pub async fn toggle_audio(&self) -> Result<ToggleOutcome, CallError> {
        self.request(|respond_to| SessionCommand::ToggleAudio { respond_to })
            .await
    }

    pub async fn toggle_video(&self) -> Result<ToggleOutcome, CallError> {
        self.request(|respond_to| SessionCommand::ToggleVideo { respond_to })
            .await
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<ChatOutcome, CallError> {
        let text = text.into();
        self.request(|respond_to| SessionCommand::SendMessage { text, respond_to })
            .await
    }

    pub async fn start_screen_share(&self) -> Result<(), CallError> {
        self.request(|respond_to| SessionCommand::StartScreenShare { respond_to })
            .await?
    }

    pub async fn acquire_media(&self) -> Result<(), CallError> {
        self.command_tx
            .send(SessionCommand::AcquireMedia)
            .await
            .map_err(|_| CallError::SessionClosed)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, CallError> {
        self.request(|respond_to| SessionCommand::Snapshot { respond_to })
            .await
    }

    /// Ends any active call and stops the driver.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
    }

    async fn request<T, F>(&self, build: F) -> Result<T, CallError>
    where
        F: FnOnce(oneshot::Sender<T>) -> SessionCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(build(tx))
            .await
            .map_err(|_| CallError::SessionClosed)?;
        rx.await.map_err(|_| CallError::SessionClosed)
    }
}
