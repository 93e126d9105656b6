use duet_client::signaling::WsSignalChannel;
use duet_core::{ClientEvent, RoomId, ServerEvent};
use duet_server::{RelayService, router};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

use crate::integration::{create_relay, init_tracing};
use crate::utils::{recv_event, wait_for_event};

async fn serve(relay: RelayService) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(relay)).await;
    });
    format!("ws://{addr}/ws")
}

async fn wait_admitted(relay: &RelayService, participant_id: duet_core::ParticipantId) {
    timeout(Duration::from_secs(5), async {
        while relay.room_of(participant_id).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("never admitted");
}

#[tokio::test]
async fn test_websocket_round_trip() {
    init_tracing();

    let relay = create_relay();
    let url = serve(relay.clone()).await;
    let room = RoomId::new("wire");

    let mut alice = WsSignalChannel::connect(&url).await.expect("alice connect");
    let ServerEvent::Welcome {
        participant_id: alice_id,
    } = recv_event(&mut alice).await.expect("alice welcome")
    else {
        panic!("expected welcome");
    };
    alice
        .send(ClientEvent::JoinRoom {
            room_id: room.clone(),
            display_name: "alice".to_owned(),
        })
        .await;
    wait_admitted(&relay, alice_id).await;

    let mut bob = WsSignalChannel::connect(&url).await.expect("bob connect");
    let ServerEvent::Welcome {
        participant_id: bob_id,
    } = recv_event(&mut bob).await.expect("bob welcome")
    else {
        panic!("expected welcome");
    };
    bob.send(ClientEvent::JoinRoom {
        room_id: room.clone(),
        display_name: "bob".to_owned(),
    })
    .await;

    let joined = recv_event(&mut alice).await.expect("user joined");
    assert_eq!(
        joined,
        ServerEvent::UserJoined {
            display_name: "bob".to_owned(),
            participant_id: bob_id,
        }
    );
    assert_eq!(
        recv_event(&mut alice).await.expect("hint"),
        ServerEvent::ShowCallButton
    );
    wait_for_event(&mut bob, |e| *e == ServerEvent::ShowAnswerButton)
        .await
        .expect("bob hint");

    alice
        .send(ClientEvent::SendMessage {
            text: "over the wire".to_owned(),
            room: room.clone(),
            display_name: "alice".to_owned(),
        })
        .await;
    let chat = ServerEvent::MessageReceived {
        text: "over the wire".to_owned(),
        from: "alice".to_owned(),
    };
    assert_eq!(recv_event(&mut alice).await.expect("echo"), chat);
    assert_eq!(recv_event(&mut bob).await.expect("delivery"), chat);

    bob.close().await;
    let left = wait_for_event(&mut alice, |e| matches!(e, ServerEvent::UserLeft { .. }))
        .await
        .expect("alice never saw bob leave");
    assert_eq!(left, ServerEvent::UserLeft { participant_id: bob_id });

    alice.close().await;
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    init_tracing();

    let relay = create_relay();
    let url = serve(relay.clone()).await;

    let (mut socket, _) = connect_async(url.as_str()).await.expect("connect");
    let welcome = socket.next().await.expect("stream ended").expect("frame");
    let Message::Text(text) = welcome else {
        panic!("expected a text frame");
    };
    assert!(text.contains("\"op\":\"welcome\""));

    socket
        .send(Message::Text("{\"op\":\"no-such-op\"}".into()))
        .await
        .expect("send garbage");
    socket
        .send(Message::Text(
            "{\"op\":\"join-room\",\"d\":{\"roomId\":\"raw\",\"displayName\":\"raw\"}}".into(),
        ))
        .await
        .expect("send join");

    timeout(Duration::from_secs(5), async {
        while !relay.rooms().contains(&RoomId::new("raw")) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("join after garbage was lost");
    assert_eq!(relay.connected(), 1);
}
