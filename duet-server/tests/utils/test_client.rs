use anyhow::{Context, Result, bail};
use duet_client::testing::{ScriptedMediaDevice, ScriptedPeerLinkFactory};
use duet_client::{ClientConfig, Phase, SessionDriver, SessionHandle, SessionNotice, SessionSnapshot};
use duet_core::ParticipantId;
use duet_server::RelayService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::relay_channel::connect_in_process;
use super::signal_helpers::SIGNAL_TIMEOUT_MS;

/// A full client session (driver, scripted peer links, scripted media)
/// attached to an in-process relay.
pub struct TestParticipant {
    pub participant_id: ParticipantId,
    pub handle: SessionHandle,
    pub notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub links: Arc<ScriptedPeerLinkFactory>,
    pub media: Arc<ScriptedMediaDevice>,
    task: JoinHandle<()>,
}

impl TestParticipant {
    pub fn join(service: &RelayService, room: &str, name: &str) -> Self {
        Self::join_with(
            service,
            ClientConfig::new(room, name),
            ScriptedMediaDevice::granting(),
        )
    }

    pub fn join_with(
        service: &RelayService,
        config: ClientConfig,
        media: ScriptedMediaDevice,
    ) -> Self {
        let (signaling, participant_id) = connect_in_process(service);
        let links = Arc::new(ScriptedPeerLinkFactory::new());
        let media = Arc::new(media);

        let (driver, handle, notices) =
            SessionDriver::new(&config, signaling, links.clone(), media.clone());
        let task = tokio::spawn(driver.run());

        Self {
            participant_id,
            handle,
            notices,
            links,
            media,
            task,
        }
    }

    /// Waits until the relay has admitted this participant to a room.
    pub async fn wait_in_room(&self, service: &RelayService) -> Result<()> {
        timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), async {
            while service.room_of(self.participant_id).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .context("Participant was never admitted to a room")
    }

    /// Consumes notices until one matches `pred`.
    pub async fn wait_for_notice<F>(&mut self, pred: F) -> Result<SessionNotice>
    where
        F: Fn(&SessionNotice) -> bool,
    {
        let wait = async {
            while let Some(notice) = self.notices.recv().await {
                if pred(&notice) {
                    return Some(notice);
                }
            }
            None
        };

        match timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), wait).await {
            Ok(Some(notice)) => Ok(notice),
            Ok(None) => bail!("Notice channel closed"),
            Err(_) => bail!("Timed out waiting for notice"),
        }
    }

    /// Polls snapshots until the session reaches `phase`.
    pub async fn wait_for_phase(&self, phase: Phase) -> Result<SessionSnapshot> {
        let wait = async {
            loop {
                let snapshot = self.handle.snapshot().await?;
                if snapshot.phase == phase {
                    return Ok::<_, anyhow::Error>(snapshot);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), wait)
            .await
            .with_context(|| format!("Timed out waiting for phase {phase:?}"))?
    }

    /// Shuts the session down and waits for its task to finish.
    pub async fn leave(self) -> Result<()> {
        self.handle.shutdown().await;
        timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), self.task)
            .await
            .context("Session did not stop")?
            .context("Session task panicked")
    }
}
