use duet_client::peer_link::PeerLinkEvent;
use duet_core::IceCandidate;
use std::time::Duration;
use tokio::time::timeout;

use crate::integration::{create_relay, init_tracing};
use crate::utils::connected_pair;

#[tokio::test]
async fn test_local_candidates_reach_remote_link() {
    init_tracing();

    let relay = create_relay();
    let (alice, bob) = connected_pair(&relay, "ice").await.expect("Call failed");
    let bob_link = bob.links.last().expect("bob link");

    let alice_link = alice.links.last().expect("alice link");
    alice_link.emit(PeerLinkEvent::IceCandidate(IceCandidate::new("cand-a1")));
    alice_link.emit(PeerLinkEvent::IceCandidate(IceCandidate::new("cand-a2")));

    timeout(Duration::from_secs(5), async {
        while bob_link.added_candidates().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("candidates never arrived");

    assert_eq!(
        bob_link.added_candidates(),
        vec!["cand-a1".to_owned(), "cand-a2".to_owned()]
    );

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}
