use duet_client::SessionNotice;
use duet_core::RoomId;
use std::time::Duration;

use crate::integration::{create_relay, init_tracing};
use crate::utils::{TestParticipant, joined_pair};

#[tokio::test]
async fn test_third_participant_is_rejected() {
    init_tracing();

    let relay = create_relay();
    let (alice, bob) = joined_pair(&relay, "pair").await.expect("Failed to join");

    let mut carol = TestParticipant::join(&relay, "pair", "carol");
    let notice = carol
        .wait_for_notice(|n| matches!(n, SessionNotice::RoomFull(_)))
        .await
        .expect("carol was admitted");
    assert_eq!(notice, SessionNotice::RoomFull(RoomId::new("pair")));
    assert!(relay.room_of(carol.participant_id).is_none());

    // The pair never hears about the rejected participant.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = alice.handle.snapshot().await.expect("snapshot");
    assert_eq!(
        snapshot.remote.map(|p| p.participant_id),
        Some(bob.participant_id)
    );

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
    carol.leave().await.expect("carol leave");
}

#[tokio::test]
async fn test_slot_frees_after_leave() {
    init_tracing();

    let relay = create_relay();
    let (alice, bob) = joined_pair(&relay, "reuse").await.expect("Failed to join");
    bob.leave().await.expect("bob leave");

    let carol = TestParticipant::join(&relay, "reuse", "carol");
    carol.wait_in_room(&relay).await.expect("carol admitted");
    assert_eq!(relay.room_of(carol.participant_id), Some(RoomId::new("reuse")));

    alice.leave().await.expect("alice leave");
    carol.leave().await.expect("carol leave");
}
