//! Local media handles and the capture collaborator interface.
//!
//! Capture and rendering live outside this crate. A [`MediaDevice`] hands out
//! [`LocalStream`]s whose tracks carry shared `enabled`/`stopped` flags; the
//! capture pipeline reads those flags, the session only flips them.

use crate::error::MediaError;
use async_trait::async_trait;
use duet_core::{StreamLabel, StreamTag};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind)
    }

    pub fn with_id(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stops the track. Returns `false` if it was already stopped.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct LocalStream {
    id: String,
    label: StreamLabel,
    tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn new(label: StreamLabel, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label,
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> StreamLabel {
        self.label
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &LocalTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    /// Stops every track. Safe to call on an already stopped stream.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn tag(&self) -> StreamTag {
        StreamTag {
            stream_id: self.id.clone(),
            label: self.label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn any(&self) -> bool {
        self.audio || self.video
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Camera/microphone and display capture.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError>;

    async fn acquire_display(&self) -> Result<LocalStream, MediaError>;
}
