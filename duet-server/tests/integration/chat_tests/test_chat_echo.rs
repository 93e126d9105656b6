use duet_client::{ChatEntry, ChatOutcome, SessionNotice};

use crate::integration::{create_relay, init_tracing};
use crate::utils::{TestParticipant, connected_pair, joined_pair};

fn is_chat(notice: &SessionNotice) -> bool {
    matches!(notice, SessionNotice::Chat(_))
}

#[tokio::test]
async fn test_chat_echoes_to_both_members() {
    init_tracing();

    let relay = create_relay();
    let (mut alice, mut bob) = joined_pair(&relay, "chat").await.expect("Failed to join");

    let outcome = alice
        .handle
        .send_message("  hello bob \n")
        .await
        .expect("send");
    assert_eq!(outcome, ChatOutcome::Sent);

    let expected = SessionNotice::Chat(ChatEntry {
        sender_display_name: "alice".to_owned(),
        text: "hello bob".to_owned(),
    });
    assert_eq!(alice.wait_for_notice(is_chat).await.expect("echo"), expected);
    assert_eq!(bob.wait_for_notice(is_chat).await.expect("delivery"), expected);

    let alice_log = alice.handle.snapshot().await.expect("snapshot").chat;
    let bob_log = bob.handle.snapshot().await.expect("snapshot").chat;
    assert_eq!(alice_log.len(), 1);
    assert_eq!(alice_log, bob_log);

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}

#[tokio::test]
async fn test_blank_chat_is_not_relayed() {
    init_tracing();

    let relay = create_relay();
    let (alice, mut bob) = joined_pair(&relay, "blank").await.expect("Failed to join");

    let outcome = alice.handle.send_message(" \t ").await.expect("send");
    assert_eq!(outcome, ChatOutcome::Skipped);

    alice.handle.send_message("after").await.expect("send");
    let SessionNotice::Chat(entry) = bob.wait_for_notice(is_chat).await.expect("delivery") else {
        unreachable!();
    };
    assert_eq!(entry.text, "after");

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}

#[tokio::test]
async fn test_chat_survives_call_lifecycle() {
    init_tracing();

    let relay = create_relay();
    let (alice, mut bob) = connected_pair(&relay, "chat-call").await.expect("Call failed");

    alice.handle.send_message("one").await.expect("send");
    bob.wait_for_notice(is_chat).await.expect("first");
    alice.handle.end_call().await.expect("end call");
    alice.handle.send_message("two").await.expect("send");
    bob.wait_for_notice(is_chat).await.expect("second");

    let log: Vec<_> = bob
        .handle
        .snapshot()
        .await
        .expect("snapshot")
        .chat
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(log, vec!["one".to_owned(), "two".to_owned()]);

    alice.leave().await.expect("alice leave");
    bob.leave().await.expect("bob leave");
}

#[tokio::test]
async fn test_lone_member_gets_own_echo() {
    init_tracing();

    let relay = create_relay();
    let mut alice = TestParticipant::join(&relay, "solo", "alice");
    alice.wait_in_room(&relay).await.expect("admitted");

    alice.handle.send_message("anyone?").await.expect("send");
    let SessionNotice::Chat(entry) = alice.wait_for_notice(is_chat).await.expect("echo") else {
        unreachable!();
    };
    assert_eq!(entry.sender_display_name, "alice");

    alice.leave().await.expect("alice leave");
}
