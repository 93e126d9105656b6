use crate::config::ClientConfig;
use crate::error::{CallError, MediaError, PeerLinkError};
use crate::media::{LocalStream, MediaConstraints, MediaDevice, TrackKind};
use crate::peer_link::{LinkEnvelope, LinkEvents, LinkState, PeerLink, PeerLinkEvent, PeerLinkFactory};
use crate::session::{
    CapabilityTracker, ChatOutcome, ChatRelay, Phase, Role, Roster, SessionNotice,
    SessionSnapshot, ToggleOutcome,
};
use crate::signaling::SignalSender;
use duet_core::{
    ClientEvent, IceCandidate, Participant, ParticipantId, RoomId, ServerEvent, SessionDescription,
    StreamLabel, StreamTag,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPurpose {
    Camera,
    Screen,
}

/// Result of a background acquisition, stamped with the call generation
/// that requested it.
#[derive(Debug)]
pub struct MediaOutcome {
    pub generation: u64,
    pub purpose: MediaPurpose,
    pub result: Result<LocalStream, MediaError>,
}

/// Channels the session reports through. The receiving ends belong to
/// whoever drives the session.
#[derive(Debug, Clone)]
pub struct SessionWiring {
    pub link_events: mpsc::UnboundedSender<LinkEnvelope>,
    pub media_results: mpsc::UnboundedSender<MediaOutcome>,
    pub notices: mpsc::UnboundedSender<SessionNotice>,
}

#[derive(Debug, Clone)]
struct PendingOffer {
    offer: SessionDescription,
    from: ParticipantId,
    display_name: String,
}

/// Negotiation state machine for one participant of a two-party call.
///
/// Every input (signal, link event, media result, user command) is applied
/// through `&mut self`, so inputs are processed one at a time in arrival
/// order. Link events and media results produced for an earlier link or
/// call generation are discarded when they arrive.
pub struct CallSession {
    room_id: RoomId,
    display_name: String,
    auto_offer: bool,
    constraints: MediaConstraints,
    wants_media: bool,
    local_id: Option<ParticipantId>,

    signaling: SignalSender,
    link_factory: Arc<dyn PeerLinkFactory>,
    media_device: Arc<dyn MediaDevice>,
    wiring: SessionWiring,

    role: Role,
    phase: Phase,
    link: Option<Box<dyn PeerLink>>,
    link_epoch: u64,
    generation: u64,

    pending_local_offer: Option<SessionDescription>,
    pending_remote_offer: Option<PendingOffer>,
    remote_description_set: bool,
    ice_buffer: VecDeque<IceCandidate>,
    negotiating: bool,
    renegotiation_requested: bool,
    ignoring_remote_offer: bool,

    local_stream: Option<LocalStream>,
    screen_stream: Option<LocalStream>,
    media_attached: bool,
    camera_requested: bool,
    screen_requested: bool,
    remote_labels: HashMap<String, StreamLabel>,
    remote_streams: Vec<(String, StreamLabel)>,
    announced_streams: HashSet<String>,

    roster: Roster,
    chat: ChatRelay,
    capabilities: CapabilityTracker,
}

impl CallSession {
    pub fn new(
        config: &ClientConfig,
        signaling: SignalSender,
        link_factory: Arc<dyn PeerLinkFactory>,
        media_device: Arc<dyn MediaDevice>,
        wiring: SessionWiring,
    ) -> Self {
        Self {
            room_id: config.room_id.clone(),
            display_name: config.display_name.clone(),
            auto_offer: config.auto_offer,
            constraints: config.media,
            wants_media: config.acquire_media_on_start,
            local_id: None,
            chat: ChatRelay::new(
                config.room_id.clone(),
                config.display_name.clone(),
                signaling.clone(),
            ),
            signaling,
            link_factory,
            media_device,
            wiring,
            role: Role::Undetermined,
            phase: Phase::Idle,
            link: None,
            link_epoch: 0,
            generation: 0,
            pending_local_offer: None,
            pending_remote_offer: None,
            remote_description_set: false,
            ice_buffer: VecDeque::new(),
            negotiating: false,
            renegotiation_requested: false,
            ignoring_remote_offer: false,
            local_stream: None,
            screen_stream: None,
            media_attached: false,
            camera_requested: false,
            screen_requested: false,
            remote_labels: HashMap::new(),
            remote_streams: Vec::new(),
            announced_streams: HashSet::new(),
            roster: Roster::new(),
            capabilities: CapabilityTracker::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn local_stream(&self) -> Option<&LocalStream> {
        self.local_stream.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            role: self.role,
            local_id: self.local_id,
            remote: self.roster.remote().cloned(),
            capabilities: self.capabilities.state(),
            chat: self.chat.log().entries().to_vec(),
            has_link: self.link.is_some(),
            link_epoch: self.link_epoch,
            media_attached: self.media_attached,
            has_local_stream: self.local_stream.is_some(),
            sharing_screen: self.screen_stream.is_some(),
            buffered_candidates: self.ice_buffer.len(),
            negotiating: self.negotiating,
            remote_streams: self.remote_streams.clone(),
        }
    }

    /// Joins the configured room and kicks off local media acquisition.
    pub async fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }

        info!("Joining room {} as {}", self.room_id, self.display_name);
        self.signaling
            .send(ClientEvent::JoinRoom {
                room_id: self.room_id.clone(),
                display_name: self.display_name.clone(),
            })
            .await;
        self.phase = Phase::AwaitingRemote;

        if self.wants_media {
            self.request_local_media();
        }
    }

    /// Starts acquiring camera and microphone in the background. The result
    /// comes back through [`SessionWiring::media_results`].
    pub fn request_local_media(&mut self) {
        self.wants_media = true;
        if self.local_stream.is_some() || self.camera_requested || !self.constraints.any() {
            return;
        }
        self.camera_requested = true;
        self.spawn_acquisition(MediaPurpose::Camera);
    }

    /// Leaves `Ended` so a new call can be started or answered.
    pub fn prepare_new_call(&mut self) {
        if self.phase == Phase::Ended {
            self.rearm();
        }
    }

    pub async fn start_call(&mut self) -> Result<(), CallError> {
        self.prepare_new_call();

        if self.role != Role::Initiator {
            return Err(CallError::WrongRole {
                op: "start_call",
                expected: Role::Initiator,
                actual: self.role,
            });
        }
        if self.phase != Phase::RoleAssigned {
            return Err(CallError::InvalidPhase {
                op: "start_call",
                phase: self.phase,
            });
        }
        if self.roster.remote().is_none() {
            return Err(CallError::NoRemoteParticipant);
        }

        self.ensure_link().await?;
        self.attach_local_media().await?;
        self.send_offer().await
    }

    pub async fn answer_call(&mut self) -> Result<(), CallError> {
        if self.phase != Phase::OfferReceived {
            return Err(CallError::InvalidPhase {
                op: "answer_call",
                phase: self.phase,
            });
        }
        let pending = self
            .pending_remote_offer
            .clone()
            .ok_or(CallError::NoPendingOffer)?;

        self.ensure_link().await?;
        self.attach_local_media().await?;
        self.accept_offer(pending.offer, pending.from).await?;

        self.pending_remote_offer = None;
        self.phase = Phase::AnswerExchanged;
        info!("Answered call from {}", pending.display_name);
        Ok(())
    }

    /// Ends the current call. Only the first call in a row notifies the
    /// remote side; repeating it leaves the same terminal state.
    pub async fn end_call(&mut self) {
        if self.phase.is_in_call() || self.link.is_some() {
            info!("Ending call");
            self.signaling
                .send(ClientEvent::EndCall {
                    display_name: self.display_name.clone(),
                    remote_participant_id: self.roster.remote_id(),
                    had_local_stream: self.local_stream.is_some(),
                })
                .await;
            self.teardown().await;
            self.notify(SessionNotice::CallEnded { by: None });
        } else {
            self.teardown().await;
        }
    }

    pub fn toggle_audio(&mut self) -> ToggleOutcome {
        let outcome = self.capabilities.toggle_audio(self.local_stream.as_ref());
        debug!(?outcome, "Audio toggled");
        outcome
    }

    pub fn toggle_video(&mut self) -> ToggleOutcome {
        let outcome = self.capabilities.toggle_video(self.local_stream.as_ref());
        debug!(?outcome, "Video toggled");
        outcome
    }

    pub async fn send_message(&self, text: &str) -> ChatOutcome {
        self.chat.send_message(text).await
    }

    /// Starts capturing the display. Once granted, the remote side is told
    /// before the new tracks trigger renegotiation.
    pub fn start_screen_share(&mut self) -> Result<(), CallError> {
        if self.phase != Phase::Connected {
            return Err(CallError::InvalidPhase {
                op: "start_screen_share",
                phase: self.phase,
            });
        }
        if self.screen_stream.is_some() || self.screen_requested {
            return Ok(());
        }
        self.screen_requested = true;
        self.spawn_acquisition(MediaPurpose::Screen);
        Ok(())
    }

    pub async fn handle_signal(&mut self, event: ServerEvent) {
        debug!("Handling {} signal", event.kind());
        match event {
            ServerEvent::Welcome { participant_id } => {
                info!("Relay assigned participant id {}", participant_id);
                self.local_id = Some(participant_id);
                self.notify(SessionNotice::Joined { participant_id });
            }
            ServerEvent::UserJoined {
                display_name,
                participant_id,
            } => self.on_user_joined(participant_id, display_name).await,
            ServerEvent::UserLeft { participant_id } => self.on_user_left(participant_id).await,
            ServerEvent::RoomFull { room_id } => {
                warn!("Room {} is full", room_id);
                self.notify(SessionNotice::RoomFull(room_id));
            }
            ServerEvent::ShowCallButton => self.assign_role(Role::Initiator).await,
            ServerEvent::ShowAnswerButton => self.assign_role(Role::Responder).await,
            ServerEvent::OfferReceived {
                offer,
                from,
                display_name,
                streams,
            } => {
                self.on_offer(PendingOffer {
                    offer,
                    from,
                    display_name,
                }, streams)
                .await
            }
            ServerEvent::AnswerReceived { answer, streams } => {
                self.on_answer(answer, streams).await
            }
            ServerEvent::IceCandidate { candidate, from } => {
                self.on_remote_candidate(candidate, from).await
            }
            ServerEvent::ScreenShareStartedRemote { display_name } => {
                info!("{} started sharing their screen", display_name);
                self.notify(SessionNotice::ScreenShareAnnounced { display_name });
            }
            ServerEvent::EndCallReceiver { display_name } => {
                info!("{} ended the call", display_name);
                self.teardown().await;
                self.notify(SessionNotice::CallEnded {
                    by: Some(display_name),
                });
            }
            ServerEvent::MessageReceived { text, from } => {
                let entry = self.chat.receive(from, text).clone();
                self.notify(SessionNotice::Chat(entry));
            }
        }
    }

    pub async fn handle_link_event(&mut self, envelope: LinkEnvelope) {
        if self.link.is_none() || envelope.epoch != self.link_epoch {
            debug!(
                epoch = envelope.epoch,
                current = self.link_epoch,
                "Discarding event from a retired peer link"
            );
            return;
        }

        match envelope.event {
            PeerLinkEvent::IceCandidate(candidate) => {
                self.signaling
                    .send(ClientEvent::IceCandidate {
                        candidate,
                        to: self.roster.remote_id(),
                    })
                    .await;
            }
            PeerLinkEvent::Track { stream_id, kind } => self.on_remote_track(stream_id, kind),
            PeerLinkEvent::NegotiationNeeded => self.on_negotiation_needed().await,
            PeerLinkEvent::ConnectionStateChanged(state) => self.on_link_state(state),
        }
    }

    pub async fn handle_media_outcome(&mut self, outcome: MediaOutcome) {
        let stale = outcome.generation != self.generation;
        if !stale {
            match outcome.purpose {
                MediaPurpose::Camera => self.camera_requested = false,
                MediaPurpose::Screen => self.screen_requested = false,
            }
        }

        let stream = match outcome.result {
            Ok(stream) => stream,
            Err(e) if stale => {
                debug!("Ignoring media error from a previous call: {}", e);
                return;
            }
            Err(e) => {
                warn!("Local media unavailable: {}", e);
                self.notify(SessionNotice::MediaUnavailable(e));
                return;
            }
        };

        if stale {
            debug!(stream = stream.id(), "Abandoning media acquired for a torn-down call");
            stream.stop();
            return;
        }

        match outcome.purpose {
            MediaPurpose::Camera => self.install_camera(stream).await,
            MediaPurpose::Screen => self.install_screen(stream).await,
        }
    }

    async fn install_camera(&mut self, stream: LocalStream) {
        if self.local_stream.is_some() {
            stream.stop();
            return;
        }
        self.capabilities.apply(&stream);
        info!(stream = stream.id(), "Local media ready");
        self.local_stream = Some(stream);

        if self.link.is_none() {
            return;
        }
        if let Err(e) = self.attach_local_media().await {
            warn!("Failed to attach local media: {}", e);
            return;
        }
        // The offer in flight was created without these tracks.
        if self.phase == Phase::OfferSent {
            self.renegotiation_requested = true;
        }
    }

    async fn install_screen(&mut self, stream: LocalStream) {
        let (Some(link), Some(remote)) = (self.link.as_ref(), self.roster.remote_id()) else {
            stream.stop();
            return;
        };
        if self.phase != Phase::Connected || self.screen_stream.is_some() {
            stream.stop();
            return;
        }

        self.signaling
            .send(ClientEvent::ScreenShareStarted {
                display_name: self.display_name.clone(),
                to: remote,
            })
            .await;
        match link.attach_local_tracks(&stream).await {
            Ok(added) => {
                info!(added, "Screen share attached");
                self.screen_stream = Some(stream);
            }
            Err(e) => {
                warn!("Failed to attach screen share: {}", e);
                stream.stop();
            }
        }
    }

    async fn on_user_joined(&mut self, participant_id: ParticipantId, display_name: String) {
        if Some(participant_id) == self.local_id {
            return;
        }
        let participant = Participant::new(participant_id, display_name);
        match self.roster.admit(participant.clone()) {
            Ok(true) => {
                info!("{} joined the room", participant.display_name);
                self.notify(SessionNotice::RemoteOnline(participant));
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Rejecting participant {}: {}", participant_id, e);
                return;
            }
        }
        self.maybe_auto_offer().await;
    }

    async fn on_user_left(&mut self, participant_id: ParticipantId) {
        let Some(participant) = self.roster.remove(participant_id) else {
            debug!("Ignoring departure of unknown participant {}", participant_id);
            return;
        };
        info!("{} left the room", participant.display_name);

        if self.phase.is_in_call() || self.link.is_some() {
            self.teardown().await;
        }
        self.role = Role::Undetermined;
        self.phase = Phase::AwaitingRemote;
        self.notify(SessionNotice::RemoteLeft(participant));
    }

    async fn assign_role(&mut self, role: Role) {
        if self.phase.is_in_call() {
            if self.role != role {
                warn!(?role, current = ?self.role, "Ignoring role hint during a call");
            }
            return;
        }

        self.role = role;
        match self.phase {
            Phase::Ended => self.rearm(),
            Phase::Idle | Phase::AwaitingRemote => self.phase = Phase::RoleAssigned,
            _ => {}
        }
        info!(?role, "Role assigned");
        self.notify(SessionNotice::RoleAssigned(role));
        self.maybe_auto_offer().await;
    }

    async fn maybe_auto_offer(&mut self) {
        if !self.auto_offer
            || self.role != Role::Initiator
            || self.phase != Phase::RoleAssigned
            || self.roster.remote().is_none()
        {
            return;
        }
        info!("Starting call automatically");
        if let Err(e) = self.start_call().await {
            warn!("Automatic offer failed: {}", e);
            self.notify(SessionNotice::call_failed(&e));
        }
    }

    async fn on_offer(&mut self, pending: PendingOffer, streams: Vec<StreamTag>) {
        let participant = Participant::new(pending.from, pending.display_name.clone());
        match self.roster.admit(participant.clone()) {
            Ok(true) => self.notify(SessionNotice::RemoteOnline(participant.clone())),
            Ok(false) => {}
            Err(e) => {
                warn!("Ignoring offer from {}: {}", pending.from, e);
                return;
            }
        }

        if self.role == Role::Undetermined {
            warn!("Offer arrived before a role hint, answering as responder");
            self.role = Role::Responder;
        }
        match self.phase {
            Phase::Ended => self.rearm(),
            Phase::Idle | Phase::AwaitingRemote => self.phase = Phase::RoleAssigned,
            _ => {}
        }
        self.record_remote_streams(streams);

        if self.pending_local_offer.is_some() {
            if self.role == Role::Initiator {
                warn!("Offer collision with {}, keeping local offer", pending.from);
                self.ignoring_remote_offer = true;
                return;
            }
            info!("Offer collision with {}, rolling back local offer", pending.from);
            if let Some(link) = self.link.as_ref()
                && let Err(e) = link.rollback().await
            {
                warn!("Rollback failed: {}", e);
            }
            self.pending_local_offer = None;
            self.negotiating = false;
            self.renegotiation_requested = true;
        }
        self.ignoring_remote_offer = false;

        let established = matches!(self.phase, Phase::Connected | Phase::AnswerExchanged)
            && self.remote_description_set
            && self.link.is_some();
        if established {
            debug!("Answering renegotiation from {}", pending.from);
            if let Err(e) = self.accept_offer(pending.offer, pending.from).await {
                warn!("Renegotiation answer failed: {}", e);
                return;
            }
            self.send_follow_up_offer().await;
            return;
        }

        info!("Incoming call from {}", pending.display_name);
        self.pending_remote_offer = Some(pending);
        self.phase = Phase::OfferReceived;
        self.notify(SessionNotice::IncomingCall(participant));
    }

    async fn on_answer(&mut self, answer: SessionDescription, streams: Vec<StreamTag>) {
        if self.pending_local_offer.is_none() {
            warn!("Answer without an outstanding offer, ignoring");
            return;
        }
        let Some(link) = self.link.as_ref() else {
            warn!("Answer arrived without a peer link, ignoring");
            return;
        };
        if let Err(e) = link.set_remote_description(answer).await {
            warn!("Failed to apply answer: {}", e);
            self.notify(SessionNotice::call_failed(&CallError::from(e)));
            return;
        }

        self.pending_local_offer = None;
        self.remote_description_set = true;
        self.ignoring_remote_offer = false;
        drain_candidates(&**link, &mut self.ice_buffer).await;
        self.negotiating = false;
        self.record_remote_streams(streams);

        if self.phase == Phase::OfferSent {
            self.phase = Phase::Connected;
            info!("Call connected");
            self.notify(SessionNotice::CallConnected);
        }
        self.send_follow_up_offer().await;
    }

    async fn on_remote_candidate(
        &mut self,
        candidate: IceCandidate,
        from: Option<ParticipantId>,
    ) {
        if let (Some(from), Some(remote)) = (from, self.roster.remote_id())
            && from != remote
        {
            debug!("Dropping candidate from {}: not the remote participant", from);
            return;
        }
        if self.phase == Phase::Ended {
            debug!("Dropping candidate that arrived after the call ended");
            return;
        }
        if self.ignoring_remote_offer {
            debug!("Dropping candidate that belongs to an ignored offer");
            return;
        }

        match self.link.as_ref() {
            Some(link) if self.remote_description_set => {
                if let Err(e) = link.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate: {}", e);
                }
            }
            _ => {
                self.ice_buffer.push_back(candidate);
                debug!(buffered = self.ice_buffer.len(), "Buffering early ICE candidate");
            }
        }
    }

    fn on_remote_track(&mut self, stream_id: String, kind: TrackKind) {
        if !self.announced_streams.insert(stream_id.clone()) {
            return;
        }
        let label = self
            .remote_labels
            .get(&stream_id)
            .copied()
            .unwrap_or_else(|| {
                debug!(%stream_id, "Unlabelled remote stream, treating as camera");
                StreamLabel::Camera
            });

        info!(%stream_id, ?label, ?kind, "Remote stream available");
        self.remote_streams.push((stream_id.clone(), label));
        self.notify(SessionNotice::RemoteStream { stream_id, label });
    }

    async fn on_negotiation_needed(&mut self) {
        match self.phase {
            Phase::Connected | Phase::AnswerExchanged => {
                if self.negotiating {
                    debug!("Negotiation in flight, coalescing");
                    self.renegotiation_requested = true;
                    return;
                }
                if let Err(e) = self.send_offer().await {
                    warn!("Renegotiation failed: {}", e);
                }
            }
            Phase::RoleAssigned => self.maybe_auto_offer().await,
            phase => debug!(?phase, "Ignoring negotiation-needed"),
        }
    }

    fn on_link_state(&mut self, state: LinkState) {
        self.notify(SessionNotice::LinkState(state));
        match state {
            LinkState::Connected if self.phase == Phase::AnswerExchanged => {
                self.phase = Phase::Connected;
                info!("Call connected");
                self.notify(SessionNotice::CallConnected);
            }
            LinkState::Failed => warn!("Peer link failed"),
            _ => {}
        }
    }

    async fn send_follow_up_offer(&mut self) {
        if !self.renegotiation_requested || self.negotiating {
            return;
        }
        self.renegotiation_requested = false;
        debug!("Sending coalesced renegotiation offer");
        if let Err(e) = self.send_offer().await {
            warn!("Renegotiation failed: {}", e);
        }
    }

    async fn send_offer(&mut self) -> Result<(), CallError> {
        let remote = self.roster.remote_id().ok_or(CallError::NoRemoteParticipant)?;
        let link = self.link.as_ref().ok_or(PeerLinkError::Closed)?;

        self.negotiating = true;
        let offer = match link.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                self.negotiating = false;
                return Err(e.into());
            }
        };
        self.pending_local_offer = Some(offer.clone());
        if self.phase == Phase::RoleAssigned {
            self.phase = Phase::OfferSent;
        }

        info!("Sending offer to {}", remote);
        self.signaling
            .send(ClientEvent::SendOffer {
                offer,
                to: remote,
                display_name: self.display_name.clone(),
                streams: self.local_tags(),
            })
            .await;
        Ok(())
    }

    /// Applies a remote offer, flushes buffered candidates and sends the answer.
    async fn accept_offer(
        &mut self,
        offer: SessionDescription,
        to: ParticipantId,
    ) -> Result<(), CallError> {
        let link = self.link.as_ref().ok_or(PeerLinkError::Closed)?;

        match link.set_remote_description(offer.clone()).await {
            Ok(()) => {}
            Err(PeerLinkError::InvalidSignalingState(reason)) if self.role != Role::Initiator => {
                debug!(%reason, "Rolling back before applying remote offer");
                link.rollback().await?;
                self.pending_local_offer = None;
                self.negotiating = false;
                link.set_remote_description(offer).await?;
            }
            Err(e) => return Err(e.into()),
        }
        self.remote_description_set = true;
        self.ignoring_remote_offer = false;
        drain_candidates(&**link, &mut self.ice_buffer).await;

        let answer = link.create_answer().await?;
        info!("Sending answer to {}", to);
        self.signaling
            .send(ClientEvent::SendAnswer {
                answer,
                to,
                streams: self.local_tags(),
            })
            .await;
        Ok(())
    }

    async fn ensure_link(&mut self) -> Result<(), CallError> {
        if self.link.is_some() {
            return Ok(());
        }
        self.link_epoch += 1;
        let events = LinkEvents::new(self.link_epoch, self.wiring.link_events.clone());
        let link = self.link_factory.create(events).await.inspect_err(|e| {
            warn!("Failed to create peer link: {}", e);
        })?;
        info!(epoch = self.link_epoch, "Peer link created");
        self.link = Some(link);
        Ok(())
    }

    async fn attach_local_media(&mut self) -> Result<(), CallError> {
        if self.media_attached {
            return Ok(());
        }
        let (Some(link), Some(stream)) = (self.link.as_ref(), self.local_stream.as_ref()) else {
            return Ok(());
        };
        let added = link.attach_local_tracks(stream).await?;
        debug!(added, "Local tracks attached");
        self.media_attached = true;
        Ok(())
    }

    /// Releases everything tied to the current call. Safe to repeat.
    async fn teardown(&mut self) {
        let was_live = self.phase != Phase::Ended || self.link.is_some();

        if let Some(stream) = self.local_stream.take() {
            stream.stop();
        }
        if let Some(stream) = self.screen_stream.take() {
            stream.stop();
        }
        if let Some(link) = self.link.take()
            && let Err(e) = link.close().await
        {
            warn!("Error closing peer link: {}", e);
        }

        self.pending_local_offer = None;
        self.pending_remote_offer = None;
        self.remote_description_set = false;
        self.ice_buffer.clear();
        self.negotiating = false;
        self.renegotiation_requested = false;
        self.ignoring_remote_offer = false;
        self.media_attached = false;
        self.camera_requested = false;
        self.screen_requested = false;
        self.remote_labels.clear();
        self.remote_streams.clear();
        self.announced_streams.clear();

        if was_live {
            self.generation += 1;
            info!(generation = self.generation, "Call torn down");
        }
        self.phase = Phase::Ended;
    }

    fn rearm(&mut self) {
        self.ice_buffer.clear();
        self.phase = match self.role {
            Role::Undetermined => Phase::AwaitingRemote,
            _ => Phase::RoleAssigned,
        };
        debug!(phase = ?self.phase, "Ready for a new call");
        if self.wants_media {
            self.request_local_media();
        }
    }

    fn spawn_acquisition(&self, purpose: MediaPurpose) {
        let device = self.media_device.clone();
        let results = self.wiring.media_results.clone();
        let constraints = self.constraints;
        let generation = self.generation;

        tokio::spawn(async move {
            let result = match purpose {
                MediaPurpose::Camera => device.acquire(constraints).await,
                MediaPurpose::Screen => device.acquire_display().await,
            };
            let _ = results.send(MediaOutcome {
                generation,
                purpose,
                result,
            });
        });
    }

    fn record_remote_streams(&mut self, streams: Vec<StreamTag>) {
        for tag in streams {
            self.remote_labels.insert(tag.stream_id, tag.label);
        }
    }

    fn local_tags(&self) -> Vec<StreamTag> {
        self.local_stream
            .iter()
            .chain(self.screen_stream.iter())
            .map(LocalStream::tag)
            .collect()
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.wiring.notices.send(notice);
    }
}

async fn drain_candidates(link: &dyn PeerLink, buffer: &mut VecDeque<IceCandidate>) {
    if !buffer.is_empty() {
        debug!(count = buffer.len(), "Flushing buffered ICE candidates");
    }
    while let Some(candidate) = buffer.pop_front() {
        if let Err(e) = link.add_ice_candidate(candidate).await {
            warn!("Failed to add buffered ICE candidate: {}", e);
        }
    }
}
