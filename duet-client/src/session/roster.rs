use duet_core::{Participant, ParticipantId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("remote slot already held by {current}")]
    Occupied { current: ParticipantId },
}

/// The single remote participant slot.
#[derive(Debug, Default)]
pub struct Roster {
    remote: Option<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(&self) -> Option<&Participant> {
        self.remote.as_ref()
    }

    pub fn remote_id(&self) -> Option<ParticipantId> {
        self.remote.as_ref().map(|p| p.participant_id)
    }

    /// Fills the slot. The same participant may be admitted again (its display
    /// name is refreshed); a different one is rejected while the slot is held.
    /// Returns `true` when the participant is new.
    pub fn admit(&mut self, participant: Participant) -> Result<bool, RosterError> {
        match &mut self.remote {
            None => {
                self.remote = Some(participant);
                Ok(true)
            }
            Some(current) if current.participant_id == participant.participant_id => {
                current.display_name = participant.display_name;
                Ok(false)
            }
            Some(current) => Err(RosterError::Occupied {
                current: current.participant_id,
            }),
        }
    }

    /// Empties the slot if it holds `id`.
    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        if self.remote_id() == Some(id) {
            return self.remote.take();
        }
        None
    }
}
