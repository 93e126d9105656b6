use duet_core::{
    ClientEvent, IceCandidate, ParticipantId, RoomId, SessionDescription, ServerEvent,
};
use duet_server::{Room, RoomCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::integration::init_tracing;
use crate::utils::MockSignalingOutput;

struct RoomFixture {
    tx: mpsc::Sender<RoomCommand>,
    signaling: MockSignalingOutput,
    events: mpsc::UnboundedReceiver<(ParticipantId, ServerEvent)>,
}

impl RoomFixture {
    fn start(capacity: usize) -> Self {
        let (signaling, events) = MockSignalingOutput::new();
        let (tx, rx) = mpsc::channel(16);
        let room = Room::new(RoomId::new("fixture"), capacity, rx, Arc::new(signaling.clone()));
        tokio::spawn(room.run());
        Self {
            tx,
            signaling,
            events,
        }
    }

    async fn join(&self, participant_id: ParticipantId, name: &str) -> bool {
        let (respond_to, admitted) = oneshot::channel();
        self.tx
            .send(RoomCommand::Join {
                participant_id,
                display_name: name.to_owned(),
                respond_to,
            })
            .await
            .expect("room closed");
        admitted.await.expect("join dropped")
    }

    async fn relay(&self, from: ParticipantId, event: ClientEvent) {
        self.tx
            .send(RoomCommand::Relay { from, event })
            .await
            .expect("room closed");
    }

    async fn next(&mut self) -> (ParticipantId, ServerEvent) {
        timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("no event")
            .expect("signaling dropped")
    }

    async fn drain(&mut self) {
        while timeout(Duration::from_millis(50), self.events.recv())
            .await
            .is_ok_and(|e| e.is_some())
        {}
    }
}

#[tokio::test]
async fn test_role_hints_follow_join_order() {
    init_tracing();

    let mut room = RoomFixture::start(2);
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    assert!(room.join(alice, "alice").await);
    assert!(room.join(bob, "bob").await);
    room.drain().await;

    assert_eq!(
        room.signaling.events_for(alice).await,
        vec![
            ServerEvent::UserJoined {
                display_name: "bob".to_owned(),
                participant_id: bob,
            },
            ServerEvent::ShowCallButton,
        ]
    );
    assert_eq!(
        room.signaling.events_for(bob).await,
        vec![
            ServerEvent::UserJoined {
                display_name: "alice".to_owned(),
                participant_id: alice,
            },
            ServerEvent::ShowAnswerButton,
        ]
    );
}

#[tokio::test]
async fn test_offer_reaches_named_target_only() {
    init_tracing();

    let mut room = RoomFixture::start(2);
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();
    room.join(alice, "alice").await;
    room.join(bob, "bob").await;
    room.drain().await;

    room.relay(
        alice,
        ClientEvent::SendOffer {
            offer: SessionDescription::offer("v=0"),
            to: bob,
            display_name: "alice".to_owned(),
            streams: vec![],
        },
    )
    .await;

    let (to, event) = room.next().await;
    assert_eq!(to, bob);
    assert_eq!(
        event,
        ServerEvent::OfferReceived {
            offer: SessionDescription::offer("v=0"),
            from: alice,
            display_name: "alice".to_owned(),
            streams: vec![],
        }
    );
}

#[tokio::test]
async fn test_untargeted_candidate_goes_to_other_member() {
    init_tracing();

    let mut room = RoomFixture::start(2);
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();
    room.join(alice, "alice").await;
    room.join(bob, "bob").await;
    room.drain().await;

    room.relay(
        bob,
        ClientEvent::IceCandidate {
            candidate: IceCandidate::new("cand-b"),
            to: None,
        },
    )
    .await;

    let (to, event) = room.next().await;
    assert_eq!(to, alice);
    assert_eq!(
        event,
        ServerEvent::IceCandidate {
            candidate: IceCandidate::new("cand-b"),
            from: Some(bob),
        }
    );
}

#[tokio::test]
async fn test_non_member_signals_are_dropped() {
    init_tracing();

    let mut room = RoomFixture::start(2);
    let alice = ParticipantId::new();
    let stranger = ParticipantId::new();
    room.join(alice, "alice").await;
    room.drain().await;

    room.relay(
        stranger,
        ClientEvent::SendMessage {
            text: "let me in".to_owned(),
            room: RoomId::new("fixture"),
            display_name: "stranger".to_owned(),
        },
    )
    .await;
    room.relay(
        alice,
        ClientEvent::SendMessage {
            text: "hi".to_owned(),
            room: RoomId::new("fixture"),
            display_name: "alice".to_owned(),
        },
    )
    .await;

    // Commands are processed in order, so the first event is alice's echo.
    let (to, event) = room.next().await;
    assert_eq!(to, alice);
    assert_eq!(
        event,
        ServerEvent::MessageReceived {
            text: "hi".to_owned(),
            from: "alice".to_owned(),
        }
    );
}

#[tokio::test]
async fn test_capacity_rejects_with_room_full() {
    init_tracing();

    let mut room = RoomFixture::start(1);
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    assert!(room.join(alice, "alice").await);
    assert!(!room.join(bob, "bob").await);

    let (to, event) = room.next().await;
    assert_eq!(to, bob);
    assert_eq!(
        event,
        ServerEvent::RoomFull {
            room_id: RoomId::new("fixture"),
        }
    );
    assert!(room.signaling.events_for(alice).await.is_empty());
}

#[tokio::test]
async fn test_leave_notifies_and_room_exits_when_empty() {
    init_tracing();

    let (signaling, mut events) = MockSignalingOutput::new();
    let (tx, rx) = mpsc::channel(16);
    let room = Room::new(RoomId::new("exit"), 2, rx, Arc::new(signaling));
    let task = tokio::spawn(room.run());

    let alice = ParticipantId::new();
    let bob = ParticipantId::new();
    for (id, name) in [(alice, "alice"), (bob, "bob")] {
        let (respond_to, admitted) = oneshot::channel();
        tx.send(RoomCommand::Join {
            participant_id: id,
            display_name: name.to_owned(),
            respond_to,
        })
        .await
        .unwrap();
        assert!(admitted.await.unwrap());
    }

    tx.send(RoomCommand::Leave { participant_id: bob }).await.unwrap();
    loop {
        let (to, event) = timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        if event == (ServerEvent::UserLeft { participant_id: bob }) {
            assert_eq!(to, alice);
            break;
        }
    }

    tx.send(RoomCommand::Leave {
        participant_id: alice,
    })
    .await
    .unwrap();
    let leftovers = timeout(Duration::from_secs(2), task)
        .await
        .expect("room kept running")
        .unwrap();
    assert!(leftovers.is_empty());
}
