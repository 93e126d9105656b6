mod call_session;
mod capabilities;
mod chat;
mod driver;
mod notice;
mod phase;
mod roster;

pub use call_session::{CallSession, MediaOutcome, MediaPurpose, SessionWiring};
pub use capabilities::{CapabilityState, CapabilityTracker, ToggleOutcome};
pub use chat::{ChatEntry, ChatLog, ChatOutcome, ChatRelay};
pub use driver::{SessionCommand, SessionDriver, SessionHandle};
pub use notice::{SessionNotice, SessionSnapshot};
pub use phase::{Phase, Role};
pub use roster::{Roster, RosterError};
