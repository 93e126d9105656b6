use crate::media::{LocalStream, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for CapabilityState {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Toggled { enabled: bool },
    /// No local stream (or no track of that kind) yet.
    NoEffect,
}

/// Local audio/video enabled flags.
///
/// Toggling flips `enabled` on tracks that are already attached; it never
/// adds or removes tracks and so never causes renegotiation.
#[derive(Debug, Default)]
pub struct CapabilityTracker {
    state: CapabilityState,
}

impl CapabilityTracker {
    pub fn state(&self) -> CapabilityState {
        self.state
    }

    pub fn toggle_audio(&mut self, stream: Option<&LocalStream>) -> ToggleOutcome {
        let outcome = Self::toggle(stream, TrackKind::Audio, self.state.audio_enabled);
        if let ToggleOutcome::Toggled { enabled } = outcome {
            self.state.audio_enabled = enabled;
        }
        outcome
    }

    pub fn toggle_video(&mut self, stream: Option<&LocalStream>) -> ToggleOutcome {
        let outcome = Self::toggle(stream, TrackKind::Video, self.state.video_enabled);
        if let ToggleOutcome::Toggled { enabled } = outcome {
            self.state.video_enabled = enabled;
        }
        outcome
    }

    /// Applies the current flags to a freshly acquired stream.
    pub fn apply(&self, stream: &LocalStream) {
        for track in stream.tracks_of(TrackKind::Audio) {
            track.set_enabled(self.state.audio_enabled);
        }
        for track in stream.tracks_of(TrackKind::Video) {
            track.set_enabled(self.state.video_enabled);
        }
    }

    fn toggle(stream: Option<&LocalStream>, kind: TrackKind, current: bool) -> ToggleOutcome {
        let Some(stream) = stream else {
            return ToggleOutcome::NoEffect;
        };
        if !stream.has_track(kind) {
            return ToggleOutcome::NoEffect;
        }

        let enabled = !current;
        for track in stream.tracks_of(kind) {
            track.set_enabled(enabled);
        }
        ToggleOutcome::Toggled { enabled }
    }
}
