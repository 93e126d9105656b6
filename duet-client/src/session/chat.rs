use crate::signaling::SignalSender;
use duet_core::{ClientEvent, RoomId};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender_display_name: String,
    pub text: String,
}

/// Append-only, in-memory, relay arrival order.
#[derive(Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn push(&mut self, entry: ChatEntry) -> &ChatEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Sent,
    /// Nothing but whitespace; not transmitted.
    Skipped,
}

/// Maps chat to and from the relay. Independent of call state.
///
/// Own messages are not appended on send: the relay echoes them back to the
/// sender and every entry enters the log through [`ChatRelay::receive`].
pub struct ChatRelay {
    room: RoomId,
    display_name: String,
    sender: SignalSender,
    log: ChatLog,
}

impl ChatRelay {
    pub fn new(room: RoomId, display_name: impl Into<String>, sender: SignalSender) -> Self {
        Self {
            room,
            display_name: display_name.into(),
            sender,
            log: ChatLog::default(),
        }
    }

    /// Trims `text` and transmits it unless nothing is left.
    pub async fn send_message(&self, text: &str) -> ChatOutcome {
        let text = text.trim();
        if text.is_empty() {
            debug!("Skipping blank chat message");
            return ChatOutcome::Skipped;
        }

        self.sender
            .send(ClientEvent::SendMessage {
                text: text.to_owned(),
                room: self.room.clone(),
                display_name: self.display_name.clone(),
            })
            .await;
        ChatOutcome::Sent
    }

    /// Appends an inbound message unconditionally.
    pub fn receive(&mut self, from: String, text: String) -> &ChatEntry {
        self.log.push(ChatEntry {
            sender_display_name: from,
            text,
        })
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }
}
