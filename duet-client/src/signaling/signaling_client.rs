use crate::signaling::SignalChannel;
use dashmap::DashMap;
use duet_core::{ClientEvent, EventKind, ServerEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handle returned by [`Subscriptions::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Inbound event observers. Cloneable so observers can be registered after
/// the client has moved into a running session.
#[derive(Clone, Default)]
pub struct Subscriptions {
    handlers: Arc<DashMap<EventKind, Vec<(u64, EventHandler)>>>,
    next_id: Arc<AtomicU64>,
}

impl Subscriptions {
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { id, kind }
    }

    pub fn off(&self, subscription: Subscription) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        before != handlers.len()
    }

    fn dispatch(&self, event: &ServerEvent) {
        // Handlers run outside the map guard so they may call `on`/`off`.
        let handlers: Vec<EventHandler> = match self.handlers.get(&event.kind()) {
            Some(entry) => entry.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };
        for handler in handlers {
            handler(event);
        }
    }

    fn clear(&self) {
        self.handlers.clear();
    }
}

/// Cloneable outbound handle shared by the negotiation state machine and the
/// chat relay.
#[derive(Clone)]
pub struct SignalSender {
    channel: Arc<dyn SignalChannel>,
}

impl SignalSender {
    /// Fire-and-forget. Failures are logged, never retried.
    pub async fn send(&self, event: ClientEvent) {
        let name = event.name();
        debug!(event = name, "signal out");
        if let Err(e) = self.channel.send(event).await {
            warn!(event = name, "Failed to send signal: {}", e);
        }
    }
}

/// Owned signaling client for one session.
pub struct SignalingClient {
    sender: SignalSender,
    inbound: mpsc::UnboundedReceiver<ServerEvent>,
    subscriptions: Subscriptions,
    closed: bool,
}

impl SignalingClient {
    pub fn new(
        channel: Arc<dyn SignalChannel>,
        inbound: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> Self {
        Self {
            sender: SignalSender { channel },
            inbound,
            subscriptions: Subscriptions::default(),
            closed: false,
        }
    }

    pub fn sender(&self) -> SignalSender {
        self.sender.clone()
    }

    pub async fn send(&self, event: ClientEvent) {
        self.sender.send(event).await;
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions.clone()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.subscriptions.on(kind, handler)
    }

    pub fn off(&self, subscription: Subscription) -> bool {
        self.subscriptions.off(subscription)
    }

    /// Next inbound event, after it has been shown to every observer.
    /// `None` once the transport is gone or the client is closed.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        let event = self.inbound.recv().await?;
        debug!(event = %event.kind(), "signal in");
        self.subscriptions.dispatch(&event);
        Some(event)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops every observer and closes the transport. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.subscriptions.clear();
        self.inbound.close();
        self.sender.channel.close().await;
    }
}
