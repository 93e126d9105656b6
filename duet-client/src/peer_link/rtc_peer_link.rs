use crate::error::PeerLinkError;
use crate::media::{LocalStream, TrackKind};
use crate::peer_link::{LinkEvents, LinkState, PeerLink, PeerLinkEvent, PeerLinkFactory, RtcConfig};
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{IceCandidate, SdpKind, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Builds webrtc-rs peer connections.
#[derive(Debug, Clone, Default)]
pub struct RtcPeerLinkFactory {
    config: RtcConfig,
}

impl RtcPeerLinkFactory {
    pub fn new(config: RtcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerLinkFactory for RtcPeerLinkFactory {
    async fn create(&self, events: LinkEvents) -> Result<Box<dyn PeerLink>, PeerLinkError> {
        let link = RtcPeerLink::new(&self.config, events).await?;
        Ok(Box::new(link))
    }
}

/// [`PeerLink`] over a webrtc-rs `RTCPeerConnection`.
///
/// Local tracks are exposed as sample tracks; the capture pipeline writes
/// into them via [`RtcPeerLink::sample_track`].
pub struct RtcPeerLink {
    peer_connection: Arc<RTCPeerConnection>,
    attached: DashMap<String, Arc<TrackLocalStaticSample>>,
    closed: AtomicBool,
}

impl RtcPeerLink {
    pub async fn new(config: &RtcConfig, events: LinkEvents) -> Result<Self, PeerLinkError> {
        let platform = |e: webrtc::Error| PeerLinkError::MediaPlatform(e.to_string());

        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(platform)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine).map_err(platform)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(
            api.new_peer_connection(config.to_rtc_configuration())
                .await
                .map_err(platform)?,
        );

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!(epoch = events.epoch(), state = ?s, "peer connection state changed");
                    events.emit(PeerLinkEvent::ConnectionStateChanged(link_state(s)));
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(PeerLinkEvent::IceCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }));
            })
        }));

        let negotiation_events = events.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let events = negotiation_events.clone();
            Box::pin(async move {
                events.emit(PeerLinkEvent::NegotiationNeeded);
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        _ => TrackKind::Video,
                    };
                    let stream_id = track.stream_id();
                    debug!(%stream_id, ?kind, "remote track received");
                    events.emit(PeerLinkEvent::Track { stream_id, kind });
                })
            },
        ));

        Ok(Self {
            peer_connection,
            attached: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Sample sink for a bound local track.
    pub fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.attached.get(track_id).map(|entry| entry.value().clone())
    }

    fn ensure_open(&self) -> Result<(), PeerLinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PeerLinkError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerLink for RtcPeerLink {
    async fn attach_local_tracks(&self, stream: &LocalStream) -> Result<usize, PeerLinkError> {
        self.ensure_open()?;

        let mut added = 0;
        for track in stream.tracks() {
            if self.attached.contains_key(track.id()) {
                continue;
            }

            let mime_type = match track.kind() {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let sample_track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_owned(),
                stream.id().to_owned(),
            ));

            self.peer_connection
                .add_track(Arc::clone(&sample_track) as Arc<dyn TrackLocal + Send + Sync>)
                .await?;
            self.attached.insert(track.id().to_owned(), sample_track);
            added += 1;
        }

        Ok(added)
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerLinkError> {
        self.ensure_open()?;
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerLinkError> {
        self.ensure_open()?;
        let state = self.peer_connection.signaling_state();
        if state != RTCSignalingState::HaveRemoteOffer {
            return Err(PeerLinkError::InvalidSignalingState(format!(
                "cannot answer in {state:?}"
            )));
        }

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), PeerLinkError> {
        self.ensure_open()?;
        let state = self.peer_connection.signaling_state();

        let rtc_desc = match desc.kind {
            SdpKind::Offer => {
                if state == RTCSignalingState::HaveLocalOffer {
                    return Err(PeerLinkError::InvalidSignalingState(
                        "remote offer while a local offer is pending".to_owned(),
                    ));
                }
                RTCSessionDescription::offer(desc.sdp)?
            }
            SdpKind::Answer => {
                if state != RTCSignalingState::HaveLocalOffer {
                    return Err(PeerLinkError::InvalidSignalingState(format!(
                        "remote answer in {state:?}"
                    )));
                }
                RTCSessionDescription::answer(desc.sdp)?
            }
            SdpKind::Rollback => return self.rollback().await,
        };

        self.peer_connection.set_remote_description(rtc_desc).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), PeerLinkError> {
        self.ensure_open()?;
        // An empty SDP is only accepted for offers and answers.
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Err(PeerLinkError::InvalidSignalingState(format!(
                "nothing to roll back in {:?}",
                self.peer_connection.signaling_state()
            )));
        };

        let mut rollback = RTCSessionDescription::default();
        rollback.sdp_type = RTCSdpType::Rollback;
        rollback.sdp = pending.sdp;
        self.peer_connection.set_local_description(rollback).await?;
        debug!("local offer rolled back");
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerLinkError> {
        self.ensure_open()?;
        if self.peer_connection.remote_description().await.is_none() {
            return Err(PeerLinkError::InvalidSignalingState(
                "candidate before remote description".to_owned(),
            ));
        }

        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerLinkError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.attached.clear();
        if let Err(e) = self.peer_connection.close().await {
            warn!("Error while closing peer connection: {}", e);
        }
        Ok(())
    }
}

fn link_state(state: RTCPeerConnectionState) -> LinkState {
    match state {
        RTCPeerConnectionState::Connecting => LinkState::Connecting,
        RTCPeerConnectionState::Connected => LinkState::Connected,
        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
        RTCPeerConnectionState::Failed => LinkState::Failed,
        RTCPeerConnectionState::Closed => LinkState::Closed,
        _ => LinkState::New,
    }
}
