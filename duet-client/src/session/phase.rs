/// Call lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingRemote,
    RoleAssigned,
    OfferSent,
    OfferReceived,
    AnswerExchanged,
    Connected,
    Ended,
}

impl Phase {
    /// Phases in which a call attempt is underway.
    pub fn is_in_call(&self) -> bool {
        matches!(
            self,
            Phase::OfferSent | Phase::OfferReceived | Phase::AnswerExchanged | Phase::Connected
        )
    }
}

/// Negotiation role, assigned by the relay's role hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Undetermined,
    Initiator,
    Responder,
}
