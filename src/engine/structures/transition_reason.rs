use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

/// Reason code attached to every standing transition.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransitionReason {
    TournamentCompletion = 0,
    Decay = 1,
    ManualCorrection = 2
}

impl TryFrom<i32> for TransitionReason {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TransitionReason::TournamentCompletion),
            1 => Ok(TransitionReason::Decay),
            2 => Ok(TransitionReason::ManualCorrection),
            _ => Err(())
        }
    }
}
