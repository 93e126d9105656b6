use duet_client::SessionNotice;
use duet_client::testing::LinkCall;
use std::time::Duration;
use tokio::time::timeout;

use crate::integration::{create_relay, init_tracing};
use crate::utils::connected_pair;

#[tokio::test]
async fn test_screen_share_announces_and_renegotiates() {
    init_tracing();

    let relay = create_relay();
    let (alice, mut bob) = connected_pair(&relay, "share").await.expect("Call failed");

    alice
        .handle
        .start_screen_share()
        .await
        .expect("screen share");

    let notice = bob
        .wait_for_notice(|n| matches!(n, SessionNotice::ScreenShareAnnounced { .. }))
        .await
        .expect("bob not told");
    assert_eq!(
        notice,
        SessionNotice::ScreenShareAnnounced {
            display_name: "alice".to_owned()
        }
    );

    let bob_link = bob.links.last().expect("bob link");
    timeout(Duration::from_secs(5), async {
        loop {
            let answers = bob_link
                .calls()
                .iter()
                .filter(|c| **c == LinkCall::CreateAnswer)
                .count();
            if answers == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("renegotiation never answered");

    let snapshot = alice.handle.snapshot().await.expect("snapshot");
    assert!(snapshot.sharing_screen);
    assert_eq!(alice.media.issued().len(), 2);

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}
