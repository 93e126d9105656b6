use anyhow::{Context, Result};
use duet_client::signaling::SignalingClient;
use duet_client::{Phase, Role, SessionNotice};
use duet_core::ServerEvent;
use duet_server::RelayService;
use std::time::Duration;
use tokio::time::timeout;

use super::test_client::TestParticipant;

/// Timeout for a single signal round trip (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

/// Joins two participants to `room` in a fixed order and waits for both
/// role hints. The first one is the initiator.
pub async fn joined_pair(
    service: &RelayService,
    room: &str,
) -> Result<(TestParticipant, TestParticipant)> {
    let mut alice = TestParticipant::join(service, room, "alice");
    alice.wait_in_room(service).await?;
    let mut bob = TestParticipant::join(service, room, "bob");
    bob.wait_in_room(service).await?;

    alice
        .wait_for_notice(|n| matches!(n, SessionNotice::RoleAssigned(Role::Initiator)))
        .await
        .context("alice never became initiator")?;
    bob.wait_for_notice(|n| matches!(n, SessionNotice::RoleAssigned(Role::Responder)))
        .await
        .context("bob never became responder")?;

    Ok((alice, bob))
}

/// [`joined_pair`], then a full offer/answer exchange.
pub async fn connected_pair(
    service: &RelayService,
    room: &str,
) -> Result<(TestParticipant, TestParticipant)> {
    let (alice, mut bob) = joined_pair(service, room).await?;

    alice
        .handle
        .start_call()
        .await
        .context("Failed to start call")?;
    bob.wait_for_notice(|n| matches!(n, SessionNotice::IncomingCall(_)))
        .await
        .context("bob never saw the call")?;
    bob.handle
        .answer_call()
        .await
        .context("Failed to answer call")?;

    alice.wait_for_phase(Phase::Connected).await?;
    bob.wait_for_phase(Phase::Connected).await?;
    Ok((alice, bob))
}

/// Next inbound event on a bare signaling client.
pub async fn recv_event(client: &mut SignalingClient) -> Result<ServerEvent> {
    timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), client.recv())
        .await
        .context("Timed out waiting for signal")?
        .context("Signaling client closed")
}

/// Skips inbound events until one matches `pred`.
pub async fn wait_for_event<F>(client: &mut SignalingClient, pred: F) -> Result<ServerEvent>
where
    F: Fn(&ServerEvent) -> bool,
{
    loop {
        let event = recv_event(client).await?;
        if pred(&event) {
            return Ok(event);
        }
    }
}
