use crate::media::TrackKind;
use duet_core::IceCandidate;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerLinkEvent {
    IceCandidate(IceCandidate),
    Track { stream_id: String, kind: TrackKind },
    NegotiationNeeded,
    ConnectionStateChanged(LinkState),
}

/// A link event stamped with the generation of the link that produced it.
#[derive(Debug, Clone)]
pub struct LinkEnvelope {
    pub epoch: u64,
    pub event: PeerLinkEvent,
}

/// Sink handed to a link at creation time.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    epoch: u64,
    tx: mpsc::UnboundedSender<LinkEnvelope>,
}

impl LinkEvents {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<LinkEnvelope>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn emit(&self, event: PeerLinkEvent) {
        let _ = self.tx.send(LinkEnvelope {
            epoch: self.epoch,
            event,
        });
    }
}
