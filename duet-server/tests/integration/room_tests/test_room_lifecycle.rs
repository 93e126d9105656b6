use duet_core::RoomId;
use std::time::Duration;
use tokio::time::timeout;

use crate::integration::{create_relay, init_tracing};
use crate::utils::{TestParticipant, joined_pair};

#[tokio::test]
async fn test_room_created_on_first_join() {
    init_tracing();

    let relay = create_relay();
    assert_eq!(relay.rooms().room_count(), 0);

    let alice = TestParticipant::join(&relay, "lobby", "alice");
    alice.wait_in_room(&relay).await.expect("admitted");
    assert!(relay.rooms().contains(&RoomId::new("lobby")));
    assert_eq!(relay.rooms().room_count(), 1);

    alice.leave().await.expect("alice leave");
}

#[tokio::test]
async fn test_room_removed_when_empty() {
    init_tracing();

    let relay = create_relay();
    let (alice, bob) = joined_pair(&relay, "ephemeral").await.expect("Failed to join");
    assert_eq!(relay.connected(), 2);

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");

    timeout(Duration::from_secs(5), async {
        while relay.rooms().room_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("room outlived its members");
    assert_eq!(relay.connected(), 0);
}

#[tokio::test]
async fn test_rejoin_after_room_closed() {
    init_tracing();

    let relay = create_relay();
    let alice = TestParticipant::join(&relay, "again", "alice");
    alice.wait_in_room(&relay).await.expect("admitted");
    alice.leave().await.expect("alice leave");

    let bob = TestParticipant::join(&relay, "again", "bob");
    bob.wait_in_room(&relay).await.expect("admitted to a fresh room");
    assert_eq!(relay.room_of(bob.participant_id), Some(RoomId::new("again")));
    assert_eq!(relay.rooms().room_count(), 1);

    bob.leave().await.expect("bob leave");
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();

    let relay = create_relay();
    let (a1, b1) = joined_pair(&relay, "first").await.expect("first pair");
    let (a2, b2) = joined_pair(&relay, "second").await.expect("second pair");
    assert_eq!(relay.rooms().room_count(), 2);

    let snapshot = a2.handle.snapshot().await.expect("snapshot");
    assert_eq!(
        snapshot.remote.map(|p| p.participant_id),
        Some(b2.participant_id)
    );

    for p in [a1, b1, a2, b2] {
        p.leave().await.expect("leave");
    }
}
