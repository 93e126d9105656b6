//! In-memory collaborators for driving sessions without a relay, a media
//! stack or a network. Enabled for this crate's tests and, through the
//! `test-util` feature, for dependents.

use crate::error::{MediaError, PeerLinkError, SignalingError};
use crate::media::{LocalStream, LocalTrack, MediaConstraints, MediaDevice, TrackKind};
use crate::peer_link::{LinkEvents, LinkState, PeerLink, PeerLinkEvent, PeerLinkFactory};
use crate::signaling::{SignalChannel, SignalingClient};
use async_trait::async_trait;
use duet_core::{ClientEvent, IceCandidate, SdpKind, ServerEvent, SessionDescription, StreamLabel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

const RELAY_WAIT: Duration = Duration::from_secs(2);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A signaling client wired to a [`MemoryRelay`] instead of a socket.
pub fn memory_signaling() -> (SignalingClient, MemoryRelay) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    let channel = Arc::new(MemorySignalChannel {
        outbound: out_tx,
        closed: AtomicBool::new(false),
    });
    let client = SignalingClient::new(channel, in_rx);
    let relay = MemoryRelay {
        inbound: in_tx,
        outbound: out_rx,
    };
    (client, relay)
}

pub struct MemorySignalChannel {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl SignalChannel for MemorySignalChannel {
    async fn send(&self, event: ClientEvent) -> Result<(), SignalingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SignalingError::Closed);
        }
        self.outbound.send(event).map_err(|_| SignalingError::Closed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// The relay side of [`memory_signaling`]: inject server events, inspect
/// what the client sent.
pub struct MemoryRelay {
    inbound: mpsc::UnboundedSender<ServerEvent>,
    outbound: mpsc::UnboundedReceiver<ClientEvent>,
}

impl MemoryRelay {
    pub fn deliver(&self, event: ServerEvent) {
        let _ = self.inbound.send(event);
    }

    pub fn try_take(&mut self) -> Option<ClientEvent> {
        self.outbound.try_recv().ok()
    }

    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.outbound.try_recv() {
            out.push(event);
        }
        out
    }

    /// Waits for the next outbound event.
    pub async fn next(&mut self) -> Option<ClientEvent> {
        tokio::time::timeout(RELAY_WAIT, self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Waits for the next outbound event matching `pred`, skipping others.
    pub async fn next_where<F>(&mut self, pred: F) -> Option<ClientEvent>
    where
        F: Fn(&ClientEvent) -> bool,
    {
        loop {
            let event = self.next().await?;
            if pred(&event) {
                return Some(event);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedSignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

/// One recorded call on a [`ScriptedPeerLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    AttachTracks(usize),
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpKind),
    Rollback,
    AddIce(String),
    Close,
}

#[derive(Debug)]
struct ScriptedState {
    signaling: ScriptedSignalingState,
    has_remote: bool,
    negotiated: bool,
    connected_emitted: bool,
    closed: bool,
    tracks: Vec<String>,
    calls: Vec<LinkCall>,
    candidates: Vec<String>,
    descriptions: u32,
}

/// Test-side view of a scripted link: inspect what the session did and
/// inject platform events.
#[derive(Clone)]
pub struct LinkProbe {
    events: LinkEvents,
    state: Arc<Mutex<ScriptedState>>,
}

impl LinkProbe {
    pub fn epoch(&self) -> u64 {
        self.events.epoch()
    }

    pub fn emit(&self, event: PeerLinkEvent) {
        self.events.emit(event);
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        lock(&self.state).calls.clone()
    }

    pub fn added_candidates(&self) -> Vec<String> {
        lock(&self.state).candidates.clone()
    }

    pub fn attached_tracks(&self) -> Vec<String> {
        lock(&self.state).tracks.clone()
    }

    pub fn signaling_state(&self) -> ScriptedSignalingState {
        lock(&self.state).signaling
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// Peer link that follows browser signaling-state rules without any media
/// transport. Emits `Connected` when the first negotiation completes and
/// `NegotiationNeeded` when tracks are added to an already negotiated link.
pub struct ScriptedPeerLink {
    probe: LinkProbe,
}

impl ScriptedPeerLink {
    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        lock(&self.probe.state)
    }

    fn open(&self) -> Result<MutexGuard<'_, ScriptedState>, PeerLinkError> {
        let state = self.state();
        if state.closed {
            return Err(PeerLinkError::Closed);
        }
        Ok(state)
    }

    fn complete_negotiation(&self, state: &mut ScriptedState) {
        state.negotiated = true;
        if !state.connected_emitted {
            state.connected_emitted = true;
            self.probe
                .emit(PeerLinkEvent::ConnectionStateChanged(LinkState::Connected));
        }
    }

    fn describe(state: &mut ScriptedState, kind: &str) -> String {
        state.descriptions += 1;
        format!("{kind}-{} tracks={}", state.descriptions, state.tracks.join(","))
    }
}

#[async_trait]
impl PeerLink for ScriptedPeerLink {
    async fn attach_local_tracks(&self, stream: &LocalStream) -> Result<usize, PeerLinkError> {
        let mut state = self.open()?;
        let mut added = 0;
        for track in stream.tracks() {
            if !state.tracks.iter().any(|id| id == track.id()) {
                state.tracks.push(track.id().to_owned());
                added += 1;
            }
        }
        state.calls.push(LinkCall::AttachTracks(added));

        if added > 0 && state.negotiated && state.signaling == ScriptedSignalingState::Stable {
            self.probe.emit(PeerLinkEvent::NegotiationNeeded);
        }
        Ok(added)
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerLinkError> {
        let mut state = self.open()?;
        state.calls.push(LinkCall::CreateOffer);
        if state.signaling == ScriptedSignalingState::HaveRemoteOffer {
            return Err(PeerLinkError::InvalidSignalingState(
                "have-remote-offer".to_owned(),
            ));
        }
        state.signaling = ScriptedSignalingState::HaveLocalOffer;
        Ok(SessionDescription::offer(Self::describe(&mut state, "offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerLinkError> {
        let mut state = self.open()?;
        state.calls.push(LinkCall::CreateAnswer);
        if state.signaling != ScriptedSignalingState::HaveRemoteOffer {
            return Err(PeerLinkError::InvalidSignalingState(format!(
                "{:?}",
                state.signaling
            )));
        }
        state.signaling = ScriptedSignalingState::Stable;
        self.complete_negotiation(&mut state);
        Ok(SessionDescription::answer(Self::describe(&mut state, "answer")))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), PeerLinkError> {
        let mut state = self.open()?;
        state.calls.push(LinkCall::SetRemote(desc.kind));
        match (desc.kind, state.signaling) {
            (SdpKind::Offer, ScriptedSignalingState::HaveLocalOffer) => {
                Err(PeerLinkError::InvalidSignalingState(
                    "have-local-offer".to_owned(),
                ))
            }
            (SdpKind::Offer, _) => {
                state.signaling = ScriptedSignalingState::HaveRemoteOffer;
                state.has_remote = true;
                Ok(())
            }
            (SdpKind::Answer, ScriptedSignalingState::HaveLocalOffer) => {
                state.signaling = ScriptedSignalingState::Stable;
                state.has_remote = true;
                self.complete_negotiation(&mut state);
                Ok(())
            }
            (SdpKind::Answer, other) => Err(PeerLinkError::InvalidSignalingState(format!(
                "{other:?}"
            ))),
            (SdpKind::Rollback, _) => {
                state.signaling = ScriptedSignalingState::Stable;
                Ok(())
            }
        }
    }

    async fn rollback(&self) -> Result<(), PeerLinkError> {
        let mut state = self.open()?;
        state.calls.push(LinkCall::Rollback);
        if state.signaling == ScriptedSignalingState::Stable {
            return Err(PeerLinkError::InvalidSignalingState("stable".to_owned()));
        }
        state.signaling = ScriptedSignalingState::Stable;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerLinkError> {
        let mut state = self.open()?;
        state.calls.push(LinkCall::AddIce(candidate.candidate.clone()));
        if !state.has_remote {
            return Err(PeerLinkError::InvalidSignalingState(
                "no remote description".to_owned(),
            ));
        }
        state.candidates.push(candidate.candidate);
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerLinkError> {
        let mut state = self.state();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.calls.push(LinkCall::Close);
        self.probe
            .emit(PeerLinkEvent::ConnectionStateChanged(LinkState::Closed));
        Ok(())
    }
}

/// Hands out [`ScriptedPeerLink`]s and keeps a probe for each one.
#[derive(Default)]
pub struct ScriptedPeerLinkFactory {
    links: Mutex<Vec<LinkProbe>>,
    fail_next: AtomicBool,
}

impl ScriptedPeerLinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `create` fails with [`PeerLinkError::MediaPlatform`].
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        lock(&self.links).len()
    }

    pub fn last(&self) -> Option<LinkProbe> {
        lock(&self.links).last().cloned()
    }

    pub fn links(&self) -> Vec<LinkProbe> {
        lock(&self.links).clone()
    }
}

#[async_trait]
impl PeerLinkFactory for ScriptedPeerLinkFactory {
    async fn create(&self, events: LinkEvents) -> Result<Box<dyn PeerLink>, PeerLinkError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PeerLinkError::MediaPlatform(
                "peer connection unavailable".to_owned(),
            ));
        }

        let probe = LinkProbe {
            events,
            state: Arc::new(Mutex::new(ScriptedState {
                signaling: ScriptedSignalingState::Stable,
                has_remote: false,
                negotiated: false,
                connected_emitted: false,
                closed: false,
                tracks: Vec::new(),
                calls: Vec::new(),
                candidates: Vec::new(),
                descriptions: 0,
            })),
        };
        lock(&self.links).push(probe.clone());
        Ok(Box::new(ScriptedPeerLink { probe }))
    }
}

enum Grant {
    Allow,
    Deny(MediaError),
}

/// Media device that grants, denies, or holds each request until released.
pub struct ScriptedMediaDevice {
    grant: Grant,
    gate: Option<Semaphore>,
    issued: Mutex<Vec<LocalStream>>,
}

impl ScriptedMediaDevice {
    pub fn granting() -> Self {
        Self {
            grant: Grant::Allow,
            gate: None,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn denying(error: MediaError) -> Self {
        Self {
            grant: Grant::Deny(error),
            ..Self::granting()
        }
    }

    /// Grants, but only once [`ScriptedMediaDevice::release`] is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::granting()
        }
    }

    /// Lets one held request complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Every stream handed out so far. Clones share track state.
    pub fn issued(&self) -> Vec<LocalStream> {
        lock(&self.issued).clone()
    }

    async fn issue(&self, label: StreamLabel, kinds: &[TrackKind]) -> Result<LocalStream, MediaError> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| MediaError::DeviceUnavailable(e.to_string()))?;
            permit.forget();
        }
        if let Grant::Deny(error) = &self.grant {
            return Err(error.clone());
        }

        let tracks = kinds.iter().map(|kind| LocalTrack::new(*kind)).collect();
        let stream = LocalStream::new(label, tracks);
        lock(&self.issued).push(stream.clone());
        Ok(stream)
    }
}

#[async_trait]
impl MediaDevice for ScriptedMediaDevice {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError> {
        let mut kinds = Vec::new();
        if constraints.audio {
            kinds.push(TrackKind::Audio);
        }
        if constraints.video {
            kinds.push(TrackKind::Video);
        }
        self.issue(StreamLabel::Camera, &kinds).await
    }

    async fn acquire_display(&self) -> Result<LocalStream, MediaError> {
        self.issue(StreamLabel::Screen, &[TrackKind::Video]).await
    }
}
