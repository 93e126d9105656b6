use duet_client::{Phase, SessionNotice};

use crate::integration::{create_relay, init_tracing};
use crate::utils::connected_pair;

#[tokio::test]
async fn test_end_call_reaches_remote() {
    init_tracing();

    let relay = create_relay();
    let (alice, mut bob) = connected_pair(&relay, "hangup").await.expect("Call failed");
    let alice_link = alice.links.last().expect("alice link");

    alice.handle.end_call().await.expect("end call");

    let notice = bob
        .wait_for_notice(|n| matches!(n, SessionNotice::CallEnded { .. }))
        .await
        .expect("bob was not told");
    assert_eq!(
        notice,
        SessionNotice::CallEnded {
            by: Some("alice".to_owned())
        }
    );

    bob.wait_for_phase(Phase::Ended).await.expect("bob ended");
    alice.wait_for_phase(Phase::Ended).await.expect("alice ended");
    assert!(alice_link.is_closed());
    assert!(bob.links.last().expect("bob link").is_closed());

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}

#[tokio::test]
async fn test_second_call_after_hangup() {
    init_tracing();

    let relay = create_relay();
    let (alice, mut bob) = connected_pair(&relay, "redial").await.expect("Call failed");

    bob.handle.end_call().await.expect("end call");
    alice.wait_for_phase(Phase::Ended).await.expect("alice ended");

    alice.handle.start_call().await.expect("redial");
    bob.wait_for_notice(|n| matches!(n, SessionNotice::IncomingCall(_)))
        .await
        .expect("bob not rung");
    bob.handle.answer_call().await.expect("answer");

    alice.wait_for_phase(Phase::Connected).await.expect("alice connected");
    bob.wait_for_phase(Phase::Connected).await.expect("bob connected");
    assert_eq!(alice.links.created(), 2);
    assert_eq!(bob.links.created(), 2);

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}
